//! Core module containing the fundamental types of the engine

pub mod error;
pub mod field;
pub mod identity;
pub mod predicate;
pub mod query;
pub mod registry;
pub mod schema;
pub mod store;

pub use error::{GateError, GateResult};
pub use field::{FieldKind, FieldValue};
pub use identity::{Identity, IdentityProvider};
pub use predicate::{Condition, Lookup, Predicate, PredicateList};
pub use registry::SchemaRegistry;
pub use schema::{FieldSpec, ModelKey, ModelMetadata};
pub use store::{Record, RecordStore};
