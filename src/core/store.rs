//! Storage engine abstraction

use super::error::StorageError;
use super::schema::ModelKey;
use crate::filter::QueryPlan;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One stored row: field name to JSON value
///
/// Foreign keys hold the target's id, many-to-many fields an array of ids.
pub type Record = Map<String, Value>;

/// Slice of an ordered result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub offset: usize,
    /// `None` returns everything from `offset` on
    pub limit: Option<usize>,
}

impl Window {
    pub fn new(offset: usize, limit: Option<usize>) -> Self {
        Self { offset, limit }
    }
}

/// Rows of one window plus the size of the whole result set
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub rows: Vec<Record>,
    pub count: usize,
}

/// Id of a stored row, if it has an integer `id`
pub fn record_id(record: &Record) -> Option<i64> {
    record.get("id").and_then(Value::as_i64)
}

/// Backend executing query plans and row writes
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Rows matching `plan`, ordered and windowed, with the total match count
    async fn select(
        &self,
        model: &ModelKey,
        plan: &QueryPlan,
        window: Window,
    ) -> Result<Page, StorageError>;

    /// Ids of every row matching `plan`, in plan order
    async fn ordered_ids(&self, model: &ModelKey, plan: &QueryPlan)
    -> Result<Vec<i64>, StorageError>;

    async fn get(&self, model: &ModelKey, id: i64) -> Result<Option<Record>, StorageError>;

    /// Store a new row, assigning an `id` when the record has none
    async fn insert(&self, model: &ModelKey, record: Record) -> Result<Record, StorageError>;

    /// Replace the row `id`; `Ok(None)` when it does not exist
    async fn update(
        &self,
        model: &ModelKey,
        id: i64,
        record: Record,
    ) -> Result<Option<Record>, StorageError>;

    /// Remove the row `id`, reporting whether it existed
    async fn delete(&self, model: &ModelKey, id: i64) -> Result<bool, StorageError>;
}
