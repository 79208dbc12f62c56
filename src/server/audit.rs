//! Audit field stamping for writes

use crate::core::identity::Identity;
use crate::core::store::Record;
use chrono::{DateTime, Utc};
use serde_json::Value;

pub const CREATED_TIME: &str = "created_time";
pub const CREATED_BY: &str = "created_by";
pub const LAST_MODIFIED_TIME: &str = "last_modified_time";
pub const LAST_MODIFIED_BY: &str = "last_modified_by";
pub const VERSION_NUMBER: &str = "version_number";

/// Fields maintained by the server, never taken from a request body
pub const SERVER_MANAGED: [&str; 6] = [
    "id",
    CREATED_TIME,
    CREATED_BY,
    LAST_MODIFIED_TIME,
    LAST_MODIFIED_BY,
    VERSION_NUMBER,
];

pub fn is_server_managed(field: &str) -> bool {
    SERVER_MANAGED.contains(&field)
}

fn by_value(identity: &Identity) -> Value {
    identity
        .audit_name()
        .map_or(Value::Null, Value::from)
}

/// Stamp a new row and start its version at 1
pub fn stamp_created(record: &mut Record, identity: &Identity, now: DateTime<Utc>) {
    record.insert(CREATED_TIME.to_string(), Value::from(now.to_rfc3339()));
    record.insert(CREATED_BY.to_string(), by_value(identity));
    record.insert(VERSION_NUMBER.to_string(), Value::from(1));
}

pub fn stamp_modified(record: &mut Record, identity: &Identity, now: DateTime<Utc>) {
    record.insert(LAST_MODIFIED_TIME.to_string(), Value::from(now.to_rfc3339()));
    record.insert(LAST_MODIFIED_BY.to_string(), by_value(identity));
}

/// Current version of a row, 0 when it was never stamped
pub fn version_of(record: &Record) -> i64 {
    record
        .get(VERSION_NUMBER)
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

/// Increment the version, returning the new value
pub fn bump_version(record: &mut Record) -> i64 {
    let next = version_of(record) + 1;
    record.insert(VERSION_NUMBER.to_string(), Value::from(next));
    next
}

/// Copy the audit fields of `stored` onto `record`
pub fn carry_over(record: &mut Record, stored: &Record) {
    for field in SERVER_MANAGED {
        match stored.get(field) {
            Some(value) => record.insert(field.to_string(), value.clone()),
            None => record.remove(field),
        };
    }
}

/// Whether two rows differ outside the server-managed fields
pub fn content_changed(before: &Record, after: &Record) -> bool {
    let user_keys = |r: &Record| {
        r.iter()
            .filter(|(k, _)| !is_server_managed(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<std::collections::BTreeMap<_, _>>()
    };
    user_keys(before) != user_keys(after)
}
