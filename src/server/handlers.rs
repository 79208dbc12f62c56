//! HTTP handlers for the generic model endpoints
//!
//! Every model in the registry is served by the same handlers; the model is
//! addressed by the `{app}/{model}` path segments.

use super::audit;
use super::host::AppState;
use crate::access::resolve_access;
use crate::core::error::{AccessError, EntityError, GateError, RequestError, ValidationError};
use crate::core::field::FieldKind;
use crate::core::identity::Identity;
use crate::core::predicate::Predicate;
use crate::core::query::{PaginatedResponse, PaginationMeta, QueryParams};
use crate::core::schema::ModelMetadata;
use crate::core::store::{Record, Window, record_id};
use crate::filter::{FilterMode, QueryPlan, combine, compile, jump_offset};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::{Map, Value};

/// Models with this name prefix need the `view` permission to be read
pub const PRIVATE_MODEL_PREFIX: &str = "private";

/// Current identity; 401 when anonymous
pub async fn whoami(
    State(host): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Identity>, GateError> {
    let identity = host.identify(&headers).await?;
    if !identity.is_authenticated() {
        return Err(AccessError::AuthenticationRequired.into());
    }
    Ok(Json(identity))
}

/// List the rows of a model visible to the requester
pub async fn list_items(
    State(host): State<AppState>,
    Path((app, model)): Path<(String, String)>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<PaginatedResponse<Value>>, GateError> {
    let metadata = host.metadata(&app, &model)?;
    let identity = host.identify(&headers).await?;
    check_read_permission(&identity, metadata)?;

    let params = QueryParams::from_pairs(pairs);
    let access = resolve_access(&host.registry, metadata, &identity, &params)?;
    let filter = compile(&params, &host.registry, metadata, FilterMode::Filter);
    let exclude = compile(&params, &host.registry, metadata, FilterMode::Exclude);
    let plan = combine(access, filter, exclude).with_sort(params.sort());

    let page_size = host.registry.settings().page_size(params.limit());
    let offset = match (page_size, params.show()) {
        (Some(size), Some(target)) => {
            let ids = host.store.ordered_ids(&metadata.key, &plan).await?;
            let target = target.parse::<i64>().ok();
            jump_offset(&ids, target.as_ref(), size)
        }
        (Some(_), None) => params.offset().unwrap_or(0),
        (None, _) => 0,
    };

    let page = host
        .store
        .select(&metadata.key, &plan, Window::new(offset, page_size))
        .await?;

    let fields = selected_fields(&host, metadata, &params);
    let results = page.rows.iter().map(|row| project(row, &fields)).collect();

    Ok(Json(PaginatedResponse {
        results,
        pagination: PaginationMeta::new(offset, page_size, page.count),
    }))
}

/// Fetch one row, with its version as `ETag`
pub async fn get_item(
    State(host): State<AppState>,
    Path((app, model, pk)): Path<(String, String, String)>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, GateError> {
    let metadata = host.metadata(&app, &model)?;
    let (id, _) = existing_row(&host, metadata, &pk).await?;

    let identity = host.identify(&headers).await?;
    check_read_permission(&identity, metadata)?;

    let params = QueryParams::from_pairs(pairs);
    let access = resolve_access(&host.registry, metadata, &identity, &params)?;
    let plan = QueryPlan::matching(Predicate::mk_and(vec![access, Predicate::eq("id", id)]));
    let row = host
        .store
        .select(&metadata.key, &plan, Window::default())
        .await?
        .rows
        .into_iter()
        .next()
        .ok_or_else(|| not_found(metadata, &pk))?;

    let fields = selected_fields(&host, metadata, &params);
    Ok((
        [(header::ETAG, etag(audit::version_of(&row)))],
        Json(project(&row, &fields)),
    )
        .into_response())
}

pub async fn create_item(
    State(host): State<AppState>,
    Path((app, model)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, GateError> {
    let metadata = host.metadata(&app, &model)?;
    let identity = host.identify(&headers).await?;
    require_permission(&identity, metadata, "add")?;

    let mut record = writable_body(metadata, body)?;
    check_required(metadata, &record)?;
    audit::stamp_created(&mut record, &identity, Utc::now());

    let stored = host.store.insert(&metadata.key, record).await?;
    tracing::info!(model = %metadata.key, id = ?record_id(&stored), "Created row");

    Ok((
        StatusCode::CREATED,
        [(header::ETAG, etag(audit::version_of(&stored)))],
        Json(Value::Object(stored)),
    )
        .into_response())
}

/// Full update (PUT)
pub async fn replace_item(
    State(host): State<AppState>,
    Path((app, model, pk)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, GateError> {
    update_item(host, &app, &model, &pk, &headers, body, false).await
}

/// Partial update (PATCH)
pub async fn patch_item(
    State(host): State<AppState>,
    Path((app, model, pk)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, GateError> {
    update_item(host, &app, &model, &pk, &headers, body, true).await
}

async fn update_item(
    host: AppState,
    app: &str,
    model: &str,
    pk: &str,
    headers: &HeaderMap,
    body: Value,
    partial: bool,
) -> Result<Response, GateError> {
    let metadata = host.metadata(app, model)?;
    let (id, stored) = existing_row(&host, metadata, pk).await?;

    let identity = host.identify(headers).await?;
    require_permission(&identity, metadata, "change")?;
    check_if_match(headers, audit::version_of(&stored))?;

    let changes = writable_body(metadata, body)?;
    let mut record = if partial {
        let mut merged = stored.clone();
        merged.extend(changes);
        merged
    } else {
        check_required(metadata, &changes)?;
        let mut replaced = changes;
        audit::carry_over(&mut replaced, &stored);
        replaced
    };

    // PUT of an unchanged representation keeps the previous modification stamp
    if partial || audit::content_changed(&stored, &record) {
        audit::stamp_modified(&mut record, &identity, Utc::now());
    }
    let version = audit::bump_version(&mut record);

    let updated = host
        .store
        .update(&metadata.key, id, record)
        .await?
        .ok_or_else(|| not_found(metadata, pk))?;
    tracing::info!(model = %metadata.key, id, version, "Updated row");

    Ok((
        [(header::ETAG, etag(version))],
        Json(Value::Object(updated)),
    )
        .into_response())
}

pub async fn delete_item(
    State(host): State<AppState>,
    Path((app, model, pk)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, GateError> {
    let metadata = host.metadata(&app, &model)?;
    let (id, _) = existing_row(&host, metadata, &pk).await?;

    let identity = host.identify(&headers).await?;
    require_permission(&identity, metadata, "delete")?;

    if !host.store.delete(&metadata.key, id).await? {
        return Err(not_found(metadata, &pk));
    }
    tracing::info!(model = %metadata.key, id, "Deleted row");
    Ok(StatusCode::NO_CONTENT)
}

/// Remove one item from a many-to-many field of a row
pub async fn unlink_item(
    State(host): State<AppState>,
    Path((app, model, pk, field, item_model, item_pk)): Path<(
        String,
        String,
        String,
        String,
        String,
        String,
    )>,
    headers: HeaderMap,
) -> Result<StatusCode, GateError> {
    let metadata = host.metadata(&app, &model)?;
    let (id, mut record) = existing_row(&host, metadata, &pk).await?;

    let identity = host.identify(&headers).await?;
    require_permission(&identity, metadata, "change")?;

    let spec = metadata
        .field(&field)
        .filter(|spec| spec.kind == FieldKind::ManyToMany)
        .ok_or_else(|| EntityError::NotManyToMany {
            model: metadata.key.to_string(),
            field: field.clone(),
        })?;
    if spec.target.as_ref().is_some_and(|t| t.model != item_model) {
        return Err(ValidationError::InvalidValue {
            field,
            message: format!("does not hold {} items", item_model),
        }
        .into());
    }
    let item_id = item_pk.parse::<i64>().map_err(|_| EntityError::NotFound {
        model: item_model.clone(),
        id: item_pk.clone(),
    })?;

    if let Some(Value::Array(items)) = record.get_mut(&field) {
        items.retain(|v| v.as_i64() != Some(item_id));
    }
    audit::stamp_modified(&mut record, &identity, Utc::now());
    audit::bump_version(&mut record);

    host.store
        .update(&metadata.key, id, record)
        .await?
        .ok_or_else(|| not_found(metadata, &pk))?;
    tracing::info!(model = %metadata.key, id, field = %field, item = item_id, "Unlinked item");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Helpers
// =============================================================================

fn not_found(metadata: &ModelMetadata, pk: &str) -> GateError {
    EntityError::NotFound {
        model: metadata.key.to_string(),
        id: pk.to_string(),
    }
    .into()
}

/// Parse `pk` and load the row; 404 when either fails
async fn existing_row(
    host: &AppState,
    metadata: &ModelMetadata,
    pk: &str,
) -> Result<(i64, Record), GateError> {
    let id = pk.parse::<i64>().map_err(|_| not_found(metadata, pk))?;
    let row = host
        .store
        .get(&metadata.key, id)
        .await?
        .ok_or_else(|| not_found(metadata, pk))?;
    Ok((id, row))
}

fn check_read_permission(identity: &Identity, metadata: &ModelMetadata) -> Result<(), GateError> {
    if metadata.key.model.starts_with(PRIVATE_MODEL_PREFIX) {
        require_permission(identity, metadata, "view")?;
    }
    Ok(())
}

fn require_permission(
    identity: &Identity,
    metadata: &ModelMetadata,
    action: &str,
) -> Result<(), GateError> {
    let key = &metadata.key;
    if !identity.is_authenticated() {
        return Err(AccessError::AuthenticationRequired.into());
    }
    if identity.has_model_permission(&key.app, action, &key.model) {
        return Ok(());
    }
    Err(RequestError::Forbidden {
        message: format!("missing permission {}.{}_{}", key.app, action, key.model),
    }
    .into())
}

/// `If-Match` must name the current version (or `*`) when present
fn check_if_match(headers: &HeaderMap, current: i64) -> Result<(), GateError> {
    let Some(raw) = headers.get(header::IF_MATCH) else {
        return Ok(());
    };
    let raw = raw.to_str().map_err(|e| RequestError::InvalidHeader {
        header: header::IF_MATCH.to_string(),
        message: e.to_string(),
    })?;

    let current_tag = current.to_string();
    let matched = raw
        .split(',')
        .map(|tag| tag.trim().trim_start_matches("W/").trim_matches('"'))
        .any(|tag| tag == "*" || tag == current_tag);
    if matched {
        Ok(())
    } else {
        Err(RequestError::PreconditionFailed {
            expected: raw.trim().to_string(),
            actual: current_tag,
        }
        .into())
    }
}

fn etag(version: i64) -> String {
    format!("\"{}\"", version)
}

/// Keep the declared, client-writable fields of a request body
fn writable_body(metadata: &ModelMetadata, body: Value) -> Result<Record, GateError> {
    let Value::Object(fields) = body else {
        return Err(ValidationError::NotAnObject.into());
    };

    let mut record = Record::new();
    for (field, value) in fields {
        let Some(spec) = metadata.field(&field) else {
            return Err(ValidationError::UnknownField { field }.into());
        };
        if audit::is_server_managed(&field) {
            continue;
        }
        check_relation_value(&field, spec.kind, &value)?;
        record.insert(field, value);
    }
    Ok(record)
}

/// Relations store ids: an integer (or null) for foreign keys, an id array
/// for many-to-many fields
fn check_relation_value(field: &str, kind: FieldKind, value: &Value) -> Result<(), GateError> {
    let valid = match kind {
        FieldKind::ForeignKey => value.is_null() || value.is_i64(),
        FieldKind::ManyToMany => value
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_i64)),
        _ => true,
    };
    if valid {
        return Ok(());
    }
    Err(ValidationError::InvalidValue {
        field: field.to_string(),
        message: format!("expected {} id(s), got {}", kind, value),
    }
    .into())
}

fn check_required(metadata: &ModelMetadata, record: &Record) -> Result<(), GateError> {
    let missing: Vec<String> = metadata
        .required_fields
        .iter()
        .filter(|f| record.get(f.as_str()).is_none_or(Value::is_null))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingRequired { fields: missing }.into())
    }
}

fn selected_fields(host: &AppState, metadata: &ModelMetadata, params: &QueryParams) -> Vec<String> {
    let requested = params
        .fields()
        .map(|fields| fields.into_iter().filter(|f| metadata.has_field(f)).collect());
    host.registry.serialization_fields(metadata, requested)
}

/// Serialise `row` with only `fields`, in that order
fn project(row: &Record, fields: &[String]) -> Value {
    let projected: Map<String, Value> = fields
        .iter()
        .map(|f| (f.clone(), row.get(f).cloned().unwrap_or(Value::Null)))
        .collect();
    Value::Object(projected)
}
