//! Filter expression compiler: query parameters to predicate lists

use super::grammar::compile_value;
use super::related::filter_key_kind;
use crate::core::field::FieldKind;
use crate::core::predicate::{PATH_SEPARATOR, Predicate, PredicateList};
use crate::core::query::QueryParams;
use crate::core::registry::SchemaRegistry;
use crate::core::schema::ModelMetadata;
use serde::Serialize;

/// Marker prefixing values meant for exclusion
pub const NEGATION_MARKER: char = '!';
/// Separator of OR-ed alternatives within one value
pub const DISJUNCTION_MARKER: char = ',';

/// Which side of the query a compilation feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Rows must match
    Filter,
    /// Rows must not match; only `!`-prefixed values are compiled
    Exclude,
}

/// Compile every filter parameter of `params` for `metadata`
///
/// Unresolvable keys and values that do not belong to `mode` are skipped
/// without error.
pub fn compile(
    params: &QueryParams,
    registry: &SchemaRegistry,
    metadata: &ModelMetadata,
    mode: FilterMode,
) -> PredicateList {
    let mut list = PredicateList::new();

    for (key, values) in params.filter_fields() {
        let kind = filter_key_kind(registry, metadata, key);
        if kind.is_none() {
            continue;
        }
        let root = key.split(PATH_SEPARATOR).next().unwrap_or(key);
        let many_to_many = metadata
            .field(root)
            .is_some_and(|f| f.kind == FieldKind::ManyToMany);

        for (index, value) in values.iter().enumerate() {
            if value.contains(DISJUNCTION_MARKER) {
                if mode == FilterMode::Filter {
                    let alternatives: Vec<Predicate> = value
                        .split(DISJUNCTION_MARKER)
                        .filter(|part| !part.is_empty())
                        .filter_map(|part| compile_value(kind, key, part))
                        .collect();
                    if !alternatives.is_empty() {
                        list.primary.and_with(Predicate::mk_or(alternatives));
                    }
                }
                continue;
            }

            let leaf = match (mode, value.strip_prefix(NEGATION_MARKER)) {
                (FilterMode::Exclude, Some(negated)) => compile_value(kind, key, negated),
                (FilterMode::Filter, None) => compile_value(kind, key, value),
                _ => None,
            };
            let Some(leaf) = leaf else {
                continue;
            };

            if many_to_many && index > 0 {
                list.auxiliary.push(leaf);
            } else {
                list.primary.and_with(leaf);
            }
        }
    }

    tracing::debug!(
        model = %metadata.key,
        ?mode,
        primary = %list.primary,
        auxiliary = list.auxiliary.len(),
        "Compiled query parameters"
    );
    list
}
