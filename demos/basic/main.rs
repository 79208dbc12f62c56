//! Basic schemagate server
//!
//! Loads `demos/basic/schema.yaml` (or the path in `SCHEMAGATE_SCHEMA`), seeds
//! a few rows and serves them on `127.0.0.1:3000`.
//!
//! Identities come from gateway headers:
//!
//! ```text
//! curl 'localhost:3000/transcriptions/transcription'
//! curl -H 'x-user-id: 1' 'localhost:3000/transcriptions/transcription?project__id=1'
//! curl -H 'x-user-id: 1' 'localhost:3000/transcriptions/transcription?project__id=1&name=interview*|i'
//! curl -H 'x-user-id: 2' -H 'x-user-groups: transcriptions_superusers' \
//!      'localhost:3000/transcriptions/transcription?tags__name=!draft'
//! ```

use schemagate::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

async fn seed(store: &InMemoryRecordStore, app: &str, model: &str, rows: Vec<Value>) -> Result<()> {
    let key = ModelKey::new(app, model);
    for row in rows {
        if let Value::Object(record) = row {
            store.insert(&key, record).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,schemagate=debug")),
        )
        .init();

    let path = std::env::var("SCHEMAGATE_SCHEMA")
        .unwrap_or_else(|_| "demos/basic/schema.yaml".to_string());
    let config = SchemaConfig::from_yaml_file(&path)?;
    let registry = Arc::new(SchemaRegistry::from_config(&config)?);
    let store = InMemoryRecordStore::new(registry.clone());

    seed(
        &store,
        "core",
        "project",
        vec![
            json!({"name": "Oral histories", "owner": 1, "editors": [3]}),
            json!({"name": "Council records", "owner": 2, "editors": []}),
        ],
    )
    .await?;
    seed(
        &store,
        "transcriptions",
        "tag",
        vec![json!({"name": "draft"}), json!({"name": "reviewed"})],
    )
    .await?;
    seed(
        &store,
        "transcriptions",
        "transcription",
        vec![
            json!({"name": "Interview 1", "public": true, "pages": 12, "recorded": "2019-04-02", "project": 1, "user": 1, "tags": [2], "version_number": 1}),
            json!({"name": "Interview 2", "public": false, "pages": 30, "recorded": "2020-08-17", "project": 1, "user": 3, "tags": [1], "version_number": 1}),
            json!({"name": "Minutes March", "public": false, "pages": 4, "recorded": "2021-03-01", "project": 2, "user": 2, "tags": [1, 2], "version_number": 1}),
        ],
    )
    .await?;
    seed(
        &store,
        "transcriptions",
        "note",
        vec![json!({"text": "Check speaker names", "user": 1})],
    )
    .await?;

    ServerBuilder::new()
        .with_registry(registry)
        .with_store(store)
        .serve("127.0.0.1:3000")
        .await
}
