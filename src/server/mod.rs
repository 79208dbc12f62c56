//! Server module for building the HTTP server
//!
//! `ServerBuilder` assembles a `ServerHost` from the schema, the record store
//! and the identity provider, then exposes it over REST with:
//! - health routes
//! - `whoami`
//! - generic list/detail/create/update/delete routes for every model

pub mod audit;
pub mod builder;
pub mod handlers;
pub mod host;
pub mod router;

pub use builder::ServerBuilder;
pub use host::{AppState, ServerHost};
pub use router::RestExposure;
