//! # schemagate
//!
//! Schema-driven row-level access policies and query-string filters behind one
//! generic REST surface.
//!
//! ## Features
//!
//! - **Availability tiers**: each model declares who may see which rows
//!   (`public`, `logged_in`, `private`, `public_or_user`, `project`,
//!   `project_or_user`, `public_or_project`)
//! - **Filter grammar**: `name=abc*`, `age=>=5`, `status=draft,final`,
//!   `status=!draft`, `published=<=2020` and friends, compiled against declared
//!   field types
//! - **Relation paths**: `project__owner__id=3`, with join semantics for
//!   many-to-many relations
//! - **Configuration-Based**: models are declared in YAML and validated at
//!   startup
//! - **Pluggable collaborators**: identity provider and record store are traits
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use schemagate::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     ServerBuilder::new()
//!         .with_config_file("schema.yaml")?
//!         .serve("127.0.0.1:3000")
//!         .await
//! }
//! ```

pub mod access;
pub mod config;
pub mod core;
pub mod filter;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Access ===
    pub use crate::access::{Availability, membership_predicate, resolve_access};

    // === Core ===
    pub use crate::core::{
        error::{AccessError, GateError, GateResult},
        field::{FieldKind, FieldValue},
        identity::{AnonymousProvider, HeaderIdentityProvider, Identity, IdentityProvider},
        predicate::{Condition, Lookup, Predicate, PredicateList},
        query::{PaginatedResponse, PaginationMeta, QueryParams, SortKey},
        registry::SchemaRegistry,
        schema::{FieldSpec, ModelKey, ModelMetadata},
        store::{Page, Record, RecordStore, Window},
    };

    // === Filters ===
    pub use crate::filter::{Constraint, FilterMode, QueryPlan, combine, compile, jump_offset};

    // === Storage ===
    pub use crate::storage::InMemoryRecordStore;

    // === Config ===
    pub use crate::config::{SchemaConfig, Settings};

    // === Server ===
    pub use crate::server::{ServerBuilder, ServerHost};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};

    // === Axum ===
    pub use axum::{
        Router,
        extract::{Path, State},
        http::HeaderMap,
        routing::{delete, get, patch, post, put},
    };
}
