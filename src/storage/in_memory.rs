//! In-memory implementation of RecordStore for testing and development

use crate::core::error::StorageError;
use crate::core::field::{FieldKind, FieldValue};
use crate::core::predicate::{Condition, Lookup, PATH_SEPARATOR, Predicate};
use crate::core::query::SortKey;
use crate::core::registry::SchemaRegistry;
use crate::core::schema::{ModelKey, ModelMetadata};
use crate::core::store::{Page, Record, RecordStore, Window, record_id};
use crate::filter::{Constraint, QueryPlan};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

type Table = BTreeMap<i64, Record>;
type Tables = HashMap<ModelKey, Table>;

/// In-memory record store
///
/// Holds one table per registered model. Uses RwLock for thread-safe access.
#[derive(Clone)]
pub struct InMemoryRecordStore {
    registry: Arc<SchemaRegistry>,
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryRecordStore {
    /// Create a store with an empty table for every model of `registry`
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        let tables = registry
            .models()
            .map(|m| (m.key.clone(), Table::new()))
            .collect();
        Self {
            registry,
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StorageError> {
        self.tables.read().map_err(|e| StorageError::LockPoisoned {
            message: format!("Failed to acquire read lock: {}", e),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StorageError> {
        self.tables.write().map_err(|e| StorageError::LockPoisoned {
            message: format!("Failed to acquire write lock: {}", e),
        })
    }

    fn metadata(&self, model: &ModelKey) -> Result<&ModelMetadata, StorageError> {
        self.registry
            .get(model)
            .ok_or_else(|| StorageError::UnknownTable {
                model: model.to_string(),
            })
    }

    fn matching_rows(
        &self,
        tables: &Tables,
        model: &ModelKey,
        plan: &QueryPlan,
    ) -> Result<Vec<Record>, StorageError> {
        let metadata = self.metadata(model)?;
        let table = tables.get(model).ok_or_else(|| StorageError::UnknownTable {
            model: model.to_string(),
        })?;

        let evaluator = Evaluator {
            registry: &self.registry,
            tables,
        };
        // evaluation never yields a row twice, so `plan.distinct` holds as is
        let mut rows: Vec<Record> = table
            .values()
            .filter(|row| {
                plan.constraints
                    .iter()
                    .all(|constraint| evaluator.satisfies(metadata, row, constraint))
            })
            .cloned()
            .collect();

        sort_rows(&mut rows, &plan.sort);
        Ok(rows)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn select(
        &self,
        model: &ModelKey,
        plan: &QueryPlan,
        window: Window,
    ) -> Result<Page, StorageError> {
        let tables = self.read()?;
        let rows = self.matching_rows(&tables, model, plan)?;
        let count = rows.len();
        let rows = rows
            .into_iter()
            .skip(window.offset)
            .take(window.limit.unwrap_or(usize::MAX))
            .collect();

        Ok(Page { rows, count })
    }

    async fn ordered_ids(
        &self,
        model: &ModelKey,
        plan: &QueryPlan,
    ) -> Result<Vec<i64>, StorageError> {
        let tables = self.read()?;
        let rows = self.matching_rows(&tables, model, plan)?;
        Ok(rows.iter().filter_map(record_id).collect())
    }

    async fn get(&self, model: &ModelKey, id: i64) -> Result<Option<Record>, StorageError> {
        let tables = self.read()?;
        let table = tables.get(model).ok_or_else(|| StorageError::UnknownTable {
            model: model.to_string(),
        })?;
        Ok(table.get(&id).cloned())
    }

    async fn insert(&self, model: &ModelKey, mut record: Record) -> Result<Record, StorageError> {
        let mut tables = self.write()?;
        let table = tables
            .get_mut(model)
            .ok_or_else(|| StorageError::UnknownTable {
                model: model.to_string(),
            })?;

        let id = match record.get("id") {
            None | Some(Value::Null) => table.keys().next_back().map_or(1, |last| last + 1),
            Some(value) => value.as_i64().ok_or_else(|| StorageError::QueryError {
                message: format!("id {} is not an integer", value),
            })?,
        };
        if table.contains_key(&id) {
            return Err(StorageError::QueryError {
                message: format!("{} already has a row with id {}", model, id),
            });
        }

        record.insert("id".to_string(), Value::from(id));
        table.insert(id, record.clone());
        tracing::debug!(model = %model, id, "Inserted row");
        Ok(record)
    }

    async fn update(
        &self,
        model: &ModelKey,
        id: i64,
        mut record: Record,
    ) -> Result<Option<Record>, StorageError> {
        let mut tables = self.write()?;
        let table = tables
            .get_mut(model)
            .ok_or_else(|| StorageError::UnknownTable {
                model: model.to_string(),
            })?;

        if !table.contains_key(&id) {
            return Ok(None);
        }
        record.insert("id".to_string(), Value::from(id));
        table.insert(id, record.clone());
        Ok(Some(record))
    }

    async fn delete(&self, model: &ModelKey, id: i64) -> Result<bool, StorageError> {
        let mut tables = self.write()?;
        let table = tables
            .get_mut(model)
            .ok_or_else(|| StorageError::UnknownTable {
                model: model.to_string(),
            })?;
        Ok(table.remove(&id).is_some())
    }
}

/// Related row chosen for each many-to-many root within one step
type Bindings = HashMap<String, Option<Value>>;

struct Evaluator<'a> {
    registry: &'a SchemaRegistry,
    tables: &'a Tables,
}

impl Evaluator<'_> {
    fn satisfies(&self, metadata: &ModelMetadata, row: &Record, constraint: &Constraint) -> bool {
        match constraint {
            Constraint::Include(p) => self.step(metadata, row, p),
            Constraint::Exclude(p) => !self.step(metadata, row, p),
        }
    }

    /// Evaluate one step
    ///
    /// Every non-negated leaf on the same many-to-many root must be met by
    /// the same related row, so the step holds if some choice of one related
    /// row per joined root satisfies the whole predicate. Negated leaves look
    /// at all related rows.
    fn step(&self, metadata: &ModelMetadata, row: &Record, predicate: &Predicate) -> bool {
        let roots = joined_roots(metadata, predicate);

        let choices: Vec<Vec<Option<Value>>> = roots
            .iter()
            .map(|root| {
                let ids = related_ids(row.get(*root).unwrap_or(&Value::Null));
                if ids.is_empty() {
                    vec![None]
                } else {
                    ids.into_iter().map(Some).collect()
                }
            })
            .collect();

        let mut bindings = Bindings::new();
        self.any_binding(metadata, row, predicate, &roots, &choices, &mut bindings)
    }

    fn any_binding(
        &self,
        metadata: &ModelMetadata,
        row: &Record,
        predicate: &Predicate,
        roots: &[&str],
        choices: &[Vec<Option<Value>>],
        bindings: &mut Bindings,
    ) -> bool {
        let (Some((root, rest_roots)), Some((options, rest_choices))) =
            (roots.split_first(), choices.split_first())
        else {
            return self.eval(metadata, row, predicate, Some(&*bindings));
        };

        options.iter().any(|option| {
            bindings.insert(root.to_string(), option.clone());
            self.any_binding(metadata, row, predicate, rest_roots, rest_choices, bindings)
        })
    }

    fn eval(
        &self,
        metadata: &ModelMetadata,
        row: &Record,
        predicate: &Predicate,
        bindings: Option<&Bindings>,
    ) -> bool {
        match predicate {
            Predicate::Always => true,
            Predicate::Leaf(condition) => self.leaf(metadata, row, condition, bindings),
            Predicate::And(parts) => parts.iter().all(|p| self.eval(metadata, row, p, bindings)),
            Predicate::Or(parts) => parts.iter().any(|p| self.eval(metadata, row, p, bindings)),
            Predicate::Not(inner) => !self.eval(metadata, row, inner, None),
        }
    }

    fn leaf(
        &self,
        metadata: &ModelMetadata,
        row: &Record,
        condition: &Condition,
        bindings: Option<&Bindings>,
    ) -> bool {
        let segments: Vec<&str> = condition.field.split(PATH_SEPARATOR).collect();
        let mut values = Vec::new();
        self.collect_values(metadata, row, &segments, bindings, &mut values);
        if values.is_empty() {
            values.push(Value::Null);
        }
        values.iter().any(|stored| compare(condition, stored))
    }

    /// Values reached by following `segments` from `row`
    fn collect_values(
        &self,
        metadata: &ModelMetadata,
        row: &Record,
        segments: &[&str],
        bindings: Option<&Bindings>,
        out: &mut Vec<Value>,
    ) {
        let Some((first, rest)) = segments.split_first() else {
            return;
        };
        let stored = row.get(*first).cloned().unwrap_or(Value::Null);

        let spec = match metadata.field(first) {
            Some(spec) if spec.kind.is_relation() => spec,
            _ => {
                if rest.is_empty() {
                    out.push(stored);
                }
                return;
            }
        };

        let bound = bindings.and_then(|b| b.get(*first));
        let ids = match (spec.kind, bound) {
            (FieldKind::ManyToMany, Some(choice)) => choice.iter().cloned().collect(),
            _ => related_ids(&stored),
        };
        if rest.is_empty() {
            out.extend(ids);
            return;
        }
        let Some(target) = &spec.target else {
            return;
        };

        if self.registry.is_identity_model(target) {
            if rest == ["id"] {
                out.extend(ids);
            }
            return;
        }

        let (Some(target_metadata), Some(table)) = (self.registry.get(target), self.tables.get(target))
        else {
            return;
        };
        for id in ids.iter().filter_map(Value::as_i64) {
            if let Some(related) = table.get(&id) {
                self.collect_values(target_metadata, related, rest, None, out);
            }
        }
    }
}

/// Many-to-many roots carrying more than one non-negated leaf
///
/// Only these need a shared related row. A root with a single leaf is
/// already existential when left unbound, which keeps the binding search
/// from multiplying over roots that cannot disagree.
fn joined_roots<'p>(metadata: &ModelMetadata, predicate: &'p Predicate) -> Vec<&'p str> {
    let mut roots = Vec::new();
    positive_roots(predicate, false, &mut roots);
    roots.retain(|root| {
        metadata
            .field(root)
            .is_some_and(|f| f.kind == FieldKind::ManyToMany)
    });
    roots.sort_unstable();

    let mut joined: Vec<&str> = Vec::new();
    for pair in roots.windows(2) {
        if pair[0] == pair[1] && joined.last() != Some(&pair[0]) {
            joined.push(pair[0]);
        }
    }
    joined
}

/// Roots of the leaves not beneath a NOT
fn positive_roots<'p>(predicate: &'p Predicate, negated: bool, out: &mut Vec<&'p str>) {
    match predicate {
        Predicate::Always => {}
        Predicate::Leaf(condition) => {
            if !negated {
                out.push(condition.root());
            }
        }
        Predicate::And(parts) | Predicate::Or(parts) => {
            for part in parts {
                positive_roots(part, negated, out);
            }
        }
        Predicate::Not(inner) => positive_roots(inner, true, out),
    }
}

fn related_ids(stored: &Value) -> Vec<Value> {
    match stored {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().filter(|v| !v.is_null()).cloned().collect(),
        other => vec![other.clone()],
    }
}

fn stored_text(stored: &Value) -> Option<String> {
    match stored {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn operand_text(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::String(s) => Some(s.clone()),
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Date(d) => Some(d.to_string()),
        _ => None,
    }
}

fn compare(condition: &Condition, stored: &Value) -> bool {
    let value = &condition.value;
    let text_op = |op: fn(&str, &str) -> bool, fold: bool| {
        let (Some(stored), Some(operand)) = (stored_text(stored), operand_text(value)) else {
            return false;
        };
        if fold {
            op(&stored.to_lowercase(), &operand.to_lowercase())
        } else {
            op(&stored, &operand)
        }
    };

    match condition.lookup {
        Lookup::Exact => value.matches(stored),
        Lookup::IExact => text_op(|s, o| s == o, true),
        Lookup::StartsWith => text_op(|s, o| s.starts_with(o), false),
        Lookup::IStartsWith => text_op(|s, o| s.starts_with(o), true),
        Lookup::EndsWith => text_op(|s, o| s.ends_with(o), false),
        Lookup::IEndsWith => text_op(|s, o| s.ends_with(o), true),
        Lookup::Contains => text_op(|s, o| s.contains(o), false),
        Lookup::IContains => text_op(|s, o| s.contains(o), true),
        Lookup::Gt => value.compare(stored) == Some(Ordering::Greater),
        Lookup::Gte => matches!(
            value.compare(stored),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Lookup::Lt => value.compare(stored) == Some(Ordering::Less),
        Lookup::Lte => matches!(
            value.compare(stored),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Lookup::LenEq | Lookup::LenGt => {
            let (Some(items), Some(length)) = (stored.as_array(), value.as_integer()) else {
                return false;
            };
            let actual = items.len() as i64;
            if condition.lookup == Lookup::LenEq {
                actual == length
            } else {
                actual > length
            }
        }
        Lookup::ArrayContains => match (value, stored) {
            (FieldValue::List(wanted), Value::Array(items)) => wanted
                .iter()
                .all(|w| items.iter().any(|item| w.matches(item))),
            _ => false,
        },
    }
}

fn value_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => value_rank(a).cmp(&value_rank(b)),
    }
}

/// Sort by the given keys, then by id
fn sort_rows(rows: &mut [Record], sort: &[SortKey]) {
    rows.sort_by(|a, b| {
        for key in sort {
            let left = a.get(&key.field).unwrap_or(&Value::Null);
            let right = b.get(&key.field).unwrap_or(&Value::Null);
            let ordering = compare_values(left, right);
            let ordering = if key.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        record_id(a).cmp(&record_id(b))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Availability;
    use crate::config::Settings;
    use crate::core::schema::FieldSpec;
    use crate::filter::combine;
    use crate::core::predicate::PredicateList;
    use serde_json::json;

    fn registry() -> Arc<SchemaRegistry> {
        let user = ModelKey::new("auth", "user");
        let tag = ModelMetadata::new(ModelKey::new("core", "tag"), Availability::Public)
            .with_field("name", FieldSpec::scalar(FieldKind::Char))
            .with_field("lang", FieldSpec::scalar(FieldKind::Char));
        let mut project = ModelMetadata::new(ModelKey::new("core", "project"), Availability::Public)
            .with_field("name", FieldSpec::scalar(FieldKind::Char))
            .with_field("owner", FieldSpec::relation(FieldKind::ForeignKey, user.clone()))
            .with_field(
                "editors",
                FieldSpec::relation(FieldKind::ManyToMany, user.clone()),
            );
        project.user_fields = vec!["owner".to_string(), "editors".to_string()];
        let note = ModelMetadata::new(ModelKey::new("core", "note"), Availability::Public)
            .with_field("title", FieldSpec::scalar(FieldKind::Text))
            .with_field("age", FieldSpec::scalar(FieldKind::Integer))
            .with_field("born", FieldSpec::scalar(FieldKind::Date))
            .with_field("public", FieldSpec::scalar(FieldKind::NullBoolean))
            .with_field("keywords", FieldSpec::scalar(FieldKind::Array))
            .with_field(
                "project",
                FieldSpec::relation(FieldKind::ForeignKey, ModelKey::new("core", "project")),
            )
            .with_field(
                "tags",
                FieldSpec::relation(FieldKind::ManyToMany, ModelKey::new("core", "tag")),
            )
            .with_field("user", FieldSpec::relation(FieldKind::ForeignKey, user));

        Arc::new(
            SchemaRegistry::new(Settings::default())
                .and_then(|r| r.with_model(tag))
                .and_then(|r| r.with_model(project))
                .and_then(|r| r.with_model(note))
                .expect("valid registry"),
        )
    }

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("Expected object, got {}", other),
        }
    }

    fn key(model: &str) -> ModelKey {
        ModelKey::new("core", model)
    }

    async fn seeded() -> InMemoryRecordStore {
        let store = InMemoryRecordStore::new(registry());
        for row in [
            json!({"id": 1, "name": "latin", "lang": "la"}),
            json!({"id": 2, "name": "greek", "lang": "grc"}),
            json!({"id": 3, "name": "latin", "lang": "grc"}),
        ] {
            store.insert(&key("tag"), record(row)).await.expect("insert tag");
        }
        for row in [
            json!({"id": 10, "name": "Alpha", "owner": 1, "editors": [2, 3]}),
            json!({"id": 11, "name": "Beta", "owner": 2, "editors": []}),
        ] {
            store.insert(&key("project"), record(row)).await.expect("insert project");
        }
        for row in [
            json!({"id": 1, "title": "Abc manuscript", "age": 3, "born": "1450-06-01", "public": true,
                   "keywords": ["a", "b"], "project": 10, "tags": [1, 2], "user": 1}),
            json!({"id": 2, "title": "second", "age": 7, "born": "1520-01-01", "public": null,
                   "keywords": [], "project": 11, "tags": [3], "user": 2}),
            json!({"id": 3, "title": "third ABC", "age": 12, "born": "1500-12-31", "public": false,
                   "keywords": ["b"], "project": null, "tags": [], "user": 1}),
        ] {
            store.insert(&key("note"), record(row)).await.expect("insert note");
        }
        store
    }

    async fn ids(store: &InMemoryRecordStore, plan: QueryPlan) -> Vec<i64> {
        store.ordered_ids(&key("note"), &plan).await.expect("query")
    }

    fn leaf(field: &str, lookup: Lookup, value: impl Into<FieldValue>) -> Predicate {
        Predicate::leaf(field, lookup, value)
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let store = InMemoryRecordStore::new(registry());
        let first = store
            .insert(&key("tag"), record(json!({"name": "a"})))
            .await
            .expect("insert");
        let second = store
            .insert(&key("tag"), record(json!({"name": "b"})))
            .await
            .expect("insert");
        assert_eq!(record_id(&first), Some(1));
        assert_eq!(record_id(&second), Some(2));

        let err = store
            .insert(&key("tag"), record(json!({"id": 1})))
            .await
            .expect_err("duplicate id");
        assert!(matches!(err, StorageError::QueryError { .. }));
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let store = InMemoryRecordStore::new(registry());
        let err = store
            .get(&key("missing"), 1)
            .await
            .expect_err("unknown table");
        assert!(matches!(err, StorageError::UnknownTable { .. }));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = seeded().await;
        let updated = store
            .update(&key("tag"), 1, record(json!({"name": "latina"})))
            .await
            .expect("update");
        assert_eq!(updated.and_then(|r| r.get("id").cloned()), Some(json!(1)));
        assert!(store
            .update(&key("tag"), 99, Record::new())
            .await
            .expect("update")
            .is_none());

        assert!(store.delete(&key("tag"), 1).await.expect("delete"));
        assert!(!store.delete(&key("tag"), 1).await.expect("delete"));
        assert!(store.get(&key("tag"), 1).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_text_lookups() {
        let store = seeded().await;
        assert_eq!(
            ids(&store, QueryPlan::matching(leaf("title", Lookup::StartsWith, "Abc"))).await,
            vec![1]
        );
        assert_eq!(
            ids(&store, QueryPlan::matching(leaf("title", Lookup::IContains, "abc"))).await,
            vec![1, 3]
        );
        assert_eq!(
            ids(&store, QueryPlan::matching(leaf("title", Lookup::IExact, "SECOND"))).await,
            vec![2]
        );
        assert_eq!(
            ids(&store, QueryPlan::matching(leaf("title", Lookup::EndsWith, "ABC"))).await,
            vec![3]
        );
    }

    #[tokio::test]
    async fn test_numeric_and_date_lookups() {
        let store = seeded().await;
        assert_eq!(
            ids(&store, QueryPlan::matching(leaf("age", Lookup::Gte, 7))).await,
            vec![2, 3]
        );
        assert_eq!(
            ids(&store, QueryPlan::matching(Predicate::eq("age", "3"))).await,
            vec![1]
        );
        let dec31 = chrono::NaiveDate::from_ymd_opt(1500, 12, 31).expect("valid date");
        assert_eq!(
            ids(&store, QueryPlan::matching(leaf("born", Lookup::Lte, dec31))).await,
            vec![1, 3]
        );
    }

    #[tokio::test]
    async fn test_null_boolean_false_is_null() {
        let store = seeded().await;
        assert_eq!(
            ids(&store, QueryPlan::matching(Predicate::eq("public", FieldValue::Null))).await,
            vec![2]
        );
    }

    #[tokio::test]
    async fn test_array_lookups() {
        let store = seeded().await;
        assert_eq!(
            ids(&store, QueryPlan::matching(leaf("keywords", Lookup::LenEq, 0))).await,
            vec![2]
        );
        assert_eq!(
            ids(&store, QueryPlan::matching(leaf("keywords", Lookup::LenGt, 0))).await,
            vec![1, 3]
        );
        assert_eq!(
            ids(
                &store,
                QueryPlan::matching(leaf(
                    "keywords",
                    Lookup::ArrayContains,
                    FieldValue::List(vec![FieldValue::from("b")])
                ))
            )
            .await,
            vec![1, 3]
        );
    }

    #[tokio::test]
    async fn test_relation_paths() {
        let store = seeded().await;
        assert_eq!(
            ids(&store, QueryPlan::matching(Predicate::eq("project__name", "Beta"))).await,
            vec![2]
        );
        assert_eq!(
            ids(&store, QueryPlan::matching(Predicate::eq("project__id", "10"))).await,
            vec![1]
        );
        assert_eq!(
            ids(&store, QueryPlan::matching(Predicate::eq("user__id", "1"))).await,
            vec![1, 3]
        );
    }

    #[tokio::test]
    async fn test_membership_through_many_to_many_users() {
        let store = seeded().await;
        let members = Predicate::mk_or(vec![
            Predicate::eq("project__owner", 3),
            Predicate::eq("project__editors", 3),
        ]);
        assert_eq!(ids(&store, QueryPlan::matching(members)).await, vec![1]);
    }

    #[tokio::test]
    async fn test_many_to_many_join_binding_within_one_step() {
        let store = seeded().await;
        // one tag must be both latin and grc: only tag 3, on note 2
        let same_row = Predicate::mk_and(vec![
            Predicate::eq("tags__name", "latin"),
            Predicate::eq("tags__lang", "grc"),
        ]);
        assert_eq!(ids(&store, QueryPlan::matching(same_row)).await, vec![2]);
    }

    #[test]
    fn test_only_repeated_many_to_many_roots_are_joined() {
        let registry = registry();
        let note = registry.get(&key("note")).expect("note model");
        let predicate = Predicate::mk_and(vec![
            Predicate::eq("tags__name", "latin"),
            Predicate::eq("tags__lang", "grc"),
            Predicate::eq("project__name", "Alpha"),
            Predicate::eq("project__editors", 2),
            Predicate::mk_not(Predicate::eq("tags__name", "greek")),
        ]);
        assert_eq!(joined_roots(note, &predicate), vec!["tags"]);

        let single = Predicate::eq("tags__name", "latin");
        assert!(joined_roots(note, &single).is_empty());
    }

    #[tokio::test]
    async fn test_single_leaf_many_to_many_stays_existential() {
        let store = seeded().await;
        let predicate = Predicate::mk_and(vec![
            Predicate::eq("tags__name", "greek"),
            Predicate::eq("title", "Abc manuscript"),
        ]);
        assert_eq!(ids(&store, QueryPlan::matching(predicate)).await, vec![1]);
    }

    #[tokio::test]
    async fn test_many_to_many_auxiliary_steps_match_different_rows() {
        let store = seeded().await;
        let filter = PredicateList {
            primary: Predicate::eq("tags__name", "latin"),
            auxiliary: vec![Predicate::eq("tags__name", "greek")],
        };
        let plan = combine(Predicate::Always, filter, PredicateList::new());
        assert_eq!(ids(&store, plan).await, vec![1]);

        let both_in_one_step = Predicate::mk_and(vec![
            Predicate::eq("tags__name", "latin"),
            Predicate::eq("tags__name", "greek"),
        ]);
        assert!(ids(&store, QueryPlan::matching(both_in_one_step)).await.is_empty());
    }

    #[tokio::test]
    async fn test_exclude_steps() {
        let store = seeded().await;
        let exclude = PredicateList {
            primary: Predicate::eq("tags__name", "greek"),
            auxiliary: vec![Predicate::eq("user", 2)],
        };
        let plan = combine(Predicate::Always, PredicateList::new(), exclude);
        assert_eq!(ids(&store, plan).await, vec![3]);
    }

    #[tokio::test]
    async fn test_sort_and_window() {
        let store = seeded().await;
        let plan = QueryPlan::all().with_sort(vec![SortKey::parse("-age")]);
        assert_eq!(ids(&store, plan.clone()).await, vec![3, 2, 1]);

        let page = store
            .select(&key("note"), &plan, Window::new(1, Some(1)))
            .await
            .expect("select");
        assert_eq!(page.count, 3);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(record_id(&page.rows[0]), Some(2));
    }

    #[tokio::test]
    async fn test_empty_or_matches_nothing() {
        let store = seeded().await;
        assert!(ids(&store, QueryPlan::matching(Predicate::Or(vec![]))).await.is_empty());
    }
}
