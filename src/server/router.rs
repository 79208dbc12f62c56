//! REST exposure: routes for every registered model
//!
//! The exposure consumes a `ServerHost` and produces an Axum `Router`. All
//! models share one set of generic routes:
//!
//! - `GET /{app}/{model}` - list visible rows
//! - `POST /{app}/{model}/create` - create a row
//! - `GET /{app}/{model}/{pk}` - fetch one row
//! - `PUT|PATCH /{app}/{model}/update/{pk}` - update a row
//! - `DELETE /{app}/{model}/delete/{pk}` - delete a row
//! - `PATCH /{app}/{model}/{pk}/{field}/delete/{item_model}/{item_pk}` - remove
//!   one item from a many-to-many field

use super::handlers::{
    create_item, delete_item, get_item, list_items, patch_item, replace_item, unlink_item, whoami,
};
use super::host::ServerHost;
use anyhow::Result;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// REST API exposure
pub struct RestExposure;

impl RestExposure {
    /// Build the REST router from a host
    ///
    /// Custom routes are merged before the generic model routes, so they win
    /// over `/{app}/{model}` for the paths they declare.
    pub fn build_router(
        host: Arc<ServerHost>,
        custom_routes: Vec<Router>,
        cors: Option<CorsLayer>,
    ) -> Result<Router> {
        tracing::info!(
            models = host.registry.len(),
            "Exposing {} over REST",
            host.model_names().join(", ")
        );

        let mut app = Self::health_routes();
        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }
        app = app.merge(Self::model_routes(host));

        if let Some(cors) = cors {
            app = app.layer(cors);
        }
        Ok(app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http())))
    }

    /// Generic CRUD routes shared by every model
    fn model_routes(host: Arc<ServerHost>) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .route("/{app}/{model}", get(list_items))
            .route("/{app}/{model}/create", post(create_item))
            .route("/{app}/{model}/{pk}", get(get_item))
            .route(
                "/{app}/{model}/update/{pk}",
                put(replace_item).patch(patch_item),
            )
            .route("/{app}/{model}/delete/{pk}", delete(delete_item))
            .route(
                "/{app}/{model}/{pk}/{field}/delete/{item_model}/{item_pk}",
                patch(unlink_item),
            )
            .with_state(host)
    }

    /// Build health check routes
    fn health_routes() -> Router {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
    }

    /// Health check endpoint handler
    async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": "schemagate"
        }))
    }
}
