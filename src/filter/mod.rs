//! Query-string filtering: grammar, relation type resolution, compilation
//! and combination with the access predicate

pub mod combiner;
pub mod compiler;
pub mod grammar;
pub mod related;

pub use combiner::{Constraint, QueryPlan, combine, jump_offset};
pub use compiler::{FilterMode, compile};
pub use grammar::compile_value;
pub use related::{filter_key_kind, related_field_kind};
