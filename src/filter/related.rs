//! Type resolution for relation paths such as `project__owner__id`

use crate::core::field::FieldKind;
use crate::core::predicate::PATH_SEPARATOR;
use crate::core::registry::SchemaRegistry;
use crate::core::schema::ModelMetadata;

/// Semantic type of the field a relation path ends on
///
/// The first segment must be a relation of `metadata`; the second is looked
/// up on its target. When that is a relation too, resolution continues on
/// the target with the rest of the path. Paths shorter than two segments,
/// unknown segments and paths ending on a relation resolve to `None`.
pub fn related_field_kind(
    registry: &SchemaRegistry,
    metadata: &ModelMetadata,
    path: &str,
) -> Option<FieldKind> {
    let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
    if segments.len() < 2 {
        return None;
    }

    let target = metadata.field(segments[0])?.target.as_ref()?;
    let next = registry.searchable_kind(target, segments[1])?;
    if !next.kind.is_relation() {
        return Some(next.kind);
    }

    let target_metadata = registry.get(target)?;
    related_field_kind(registry, target_metadata, &segments[1..].join(PATH_SEPARATOR))
}

/// Semantic type of a filter key on `metadata`
///
/// Plain names are looked up directly, paths whose first segment is a
/// relation go through [`related_field_kind`]. A bare relation name resolves
/// to `None`: filters must name a field through the relation.
pub fn filter_key_kind(
    registry: &SchemaRegistry,
    metadata: &ModelMetadata,
    key: &str,
) -> Option<FieldKind> {
    let root = key.split(PATH_SEPARATOR).next().unwrap_or(key);
    let root_kind = metadata.field(root)?.kind;

    if root_kind.is_relation() {
        related_field_kind(registry, metadata, key)
    } else if root == key {
        Some(root_kind)
    } else {
        None
    }
}
