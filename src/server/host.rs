//! Server host for transport-agnostic API exposure
//!
//! `ServerHost` holds the state every request handler needs: the schema
//! registry, the storage engine and the identity provider. It knows nothing
//! about HTTP routing, so other exposures could be built on the same host.

use crate::core::error::{EntityError, GateError};
use crate::core::identity::{Identity, IdentityProvider};
use crate::core::registry::SchemaRegistry;
use crate::core::schema::ModelMetadata;
use crate::core::store::RecordStore;
use axum::http::HeaderMap;
use std::sync::Arc;

/// Shared handler state
pub type AppState = Arc<ServerHost>;

/// Host context containing all engine state
pub struct ServerHost {
    /// Validated schema registry
    pub registry: Arc<SchemaRegistry>,

    /// Storage engine executing query plans
    pub store: Arc<dyn RecordStore>,

    /// Source of requester identities
    pub identity_provider: Arc<dyn IdentityProvider>,
}

impl ServerHost {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn RecordStore>,
        identity_provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            registry,
            store,
            identity_provider,
        }
    }

    /// Metadata of `app.model`, or `UnknownModel`
    pub fn metadata(&self, app: &str, model: &str) -> Result<&ModelMetadata, GateError> {
        self.registry.lookup(app, model).ok_or_else(|| {
            EntityError::UnknownModel {
                app: app.to_string(),
                model: model.to_string(),
            }
            .into()
        })
    }

    /// Identity of the requester
    pub async fn identify(&self, headers: &HeaderMap) -> Result<Identity, GateError> {
        self.identity_provider.identify(headers).await
    }

    /// Registered models as `app.model` strings
    pub fn model_names(&self) -> Vec<String> {
        self.registry.models().map(|m| m.key.to_string()).collect()
    }
}
