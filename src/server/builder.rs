//! ServerBuilder for fluent API to build HTTP servers

use super::host::ServerHost;
use super::router::RestExposure;
use crate::config::SchemaConfig;
use crate::core::identity::{HeaderIdentityProvider, IdentityProvider};
use crate::core::registry::SchemaRegistry;
use crate::core::store::RecordStore;
use crate::storage::InMemoryRecordStore;
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

/// Builder for the schemagate HTTP server
///
/// The schema comes from a [`SchemaConfig`] or a ready [`SchemaRegistry`].
/// Without an explicit store, rows live in an [`InMemoryRecordStore`];
/// without an explicit identity provider, identities are read from the
/// gateway headers by [`HeaderIdentityProvider`].
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_config_file("schema.yaml")?
///     .build()?;
/// ```
#[derive(Default)]
pub struct ServerBuilder {
    config: Option<SchemaConfig>,
    registry: Option<Arc<SchemaRegistry>>,
    store: Option<Arc<dyn RecordStore>>,
    identity_provider: Option<Arc<dyn IdentityProvider>>,
    custom_routes: Vec<Router>,
    cors: Option<CorsLayer>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a parsed schema configuration
    pub fn with_config(mut self, config: SchemaConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load the schema configuration from a YAML file
    pub fn with_config_file(self, path: &str) -> Result<Self> {
        let config = SchemaConfig::from_yaml_file(path)
            .with_context(|| format!("loading schema from {}", path))?;
        Ok(self.with_config(config))
    }

    /// Use an already validated registry (takes precedence over a config)
    pub fn with_registry(mut self, registry: Arc<SchemaRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the storage engine
    pub fn with_store(mut self, store: impl RecordStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Set the identity provider
    pub fn with_identity_provider(mut self, provider: impl IdentityProvider + 'static) -> Self {
        self.identity_provider = Some(Arc::new(provider));
        self
    }

    /// Add custom routes to the server
    ///
    /// Use this for endpoints outside the generic model surface, such as
    /// login flows or webhooks.
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Wrap the router in a CORS layer
    pub fn with_cors(mut self, cors: CorsLayer) -> Self {
        self.cors = Some(cors);
        self
    }

    /// Build the transport-agnostic host
    pub fn build_host(&mut self) -> Result<ServerHost> {
        let registry = match (self.registry.take(), self.config.take()) {
            (Some(registry), _) => registry,
            (None, Some(config)) => Arc::new(SchemaRegistry::from_config(&config)?),
            (None, None) => anyhow::bail!(
                "A schema is required. Call .with_config(), .with_config_file() or .with_registry()"
            ),
        };

        let store: Arc<dyn RecordStore> = match self.store.take() {
            Some(store) => store,
            None => Arc::new(InMemoryRecordStore::new(registry.clone())),
        };
        let identity_provider: Arc<dyn IdentityProvider> = match self.identity_provider.take() {
            Some(provider) => provider,
            None => Arc::new(HeaderIdentityProvider::new()),
        };

        Ok(ServerHost::new(registry, store, identity_provider))
    }

    /// Build the REST router
    pub fn build(mut self) -> Result<Router> {
        let host = Arc::new(self.build_host()?);
        RestExposure::build_router(host, self.custom_routes, self.cors)
    }

    /// Serve the application with graceful shutdown
    ///
    /// Binds to `addr` and serves until SIGTERM or Ctrl+C.
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {}", addr))?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Resolve on Ctrl+C or SIGTERM
///
/// A signal handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::AnonymousProvider;

    const SCHEMA: &str = r#"
apps:
  - name: core
    models:
      - name: note
        availability: public
        fields:
          title: char
"#;

    #[test]
    fn test_build_requires_schema() {
        let err = ServerBuilder::new().build().unwrap_err();
        assert!(err.to_string().contains("schema is required"));
    }

    #[test]
    fn test_build_host_from_config() {
        let config = SchemaConfig::from_yaml_str(SCHEMA).unwrap();
        let host = ServerBuilder::new()
            .with_config(config)
            .with_identity_provider(AnonymousProvider)
            .build_host()
            .unwrap();
        assert!(host.registry.lookup("core", "note").is_some());
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let config = SchemaConfig::from_yaml_str(
            r#"
apps:
  - name: core
    models:
      - name: note
        fields:
          owner: { type: foreign_key, to: nowhere }
"#,
        )
        .unwrap();
        assert!(ServerBuilder::new().with_config(config).build().is_err());
    }

    #[test]
    fn test_registry_wins_over_config() {
        let registry = Arc::new(
            SchemaRegistry::from_config(&SchemaConfig::from_yaml_str(SCHEMA).unwrap()).unwrap(),
        );
        let host = ServerBuilder::new()
            .with_config(SchemaConfig::default())
            .with_registry(registry.clone())
            .build_host()
            .unwrap();
        assert!(Arc::ptr_eq(&host.registry, &registry));
    }
}
