//! Semantic field types and predicate values

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Semantic type of a model field
///
/// The kind decides which part of the filter grammar applies to a field.
/// `ForeignKey` and `ManyToMany` are relation kinds: they are never matched
/// directly and always carry a target model in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Char,
    Text,
    Json,
    Integer,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    Boolean,
    NullBoolean,
    Array,
    Auto,
    ForeignKey,
    ManyToMany,
}

impl FieldKind {
    /// Check if this kind points at another model
    pub fn is_relation(self) -> bool {
        matches!(self, FieldKind::ForeignKey | FieldKind::ManyToMany)
    }

    /// Check if this kind accepts the text operators (`*`, `|i`)
    pub fn is_text_like(self) -> bool {
        matches!(self, FieldKind::Char | FieldKind::Text | FieldKind::Json)
    }

    /// Check if this kind holds a boolean flag
    pub fn is_boolean(self) -> bool {
        matches!(self, FieldKind::Boolean | FieldKind::NullBoolean)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Char => "char",
            FieldKind::Text => "text",
            FieldKind::Json => "json",
            FieldKind::Integer => "integer",
            FieldKind::Date => "date",
            FieldKind::DateTime => "datetime",
            FieldKind::Boolean => "boolean",
            FieldKind::NullBoolean => "null_boolean",
            FieldKind::Array => "array",
            FieldKind::Auto => "auto",
            FieldKind::ForeignKey => "foreign_key",
            FieldKind::ManyToMany => "many_to_many",
        };
        f.write_str(name)
    }
}

/// A typed value carried by a predicate leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Date(NaiveDate),
    String(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Get the value as a string if possible
    pub fn as_string(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer if possible
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Compare with a stored JSON value for equality
    ///
    /// Request values arrive as text, so a string compares equal to a stored
    /// number or boolean with the same rendering (`"5"` matches `5`).
    pub fn matches(&self, stored: &Value) -> bool {
        match (self, stored) {
            (FieldValue::Null, Value::Null) => true,
            (FieldValue::Null, _) | (_, Value::Null) => false,
            (FieldValue::Boolean(a), Value::Bool(b)) => a == b,
            (FieldValue::Integer(a), Value::Number(n)) => n.as_i64() == Some(*a),
            (FieldValue::Date(d), Value::String(s)) => {
                parse_stored_date(s).is_some_and(|stored| stored == *d)
            }
            (FieldValue::String(a), Value::String(b)) => a == b,
            (FieldValue::String(a), Value::Number(n)) => a == &n.to_string(),
            (FieldValue::String(a), Value::Bool(b)) => a == &b.to_string(),
            (FieldValue::List(items), Value::Array(stored)) => {
                items.len() == stored.len() && items.iter().zip(stored).all(|(a, b)| a.matches(b))
            }
            _ => false,
        }
    }

    /// Order a stored JSON value relative to this value
    ///
    /// Returns `None` when the two are not comparable.
    pub fn compare(&self, stored: &Value) -> Option<Ordering> {
        match (self, stored) {
            (FieldValue::Integer(a), Value::Number(n)) => n.as_i64().map(|b| b.cmp(a)),
            (FieldValue::Date(d), Value::String(s)) => parse_stored_date(s).map(|b| b.cmp(d)),
            (FieldValue::String(a), Value::String(b)) => Some(b.as_str().cmp(a.as_str())),
            (FieldValue::String(a), Value::Number(n)) => {
                let a: f64 = a.parse().ok()?;
                n.as_f64()?.partial_cmp(&a)
            }
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Date(d) => write!(f, "{}", d),
            FieldValue::String(s) => write!(f, "{:?}", s),
            FieldValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Dates are stored as ISO strings; datetimes compare on their date part.
fn parse_stored_date(s: &str) -> Option<NaiveDate> {
    let date_part = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_kind_relation() {
        assert!(FieldKind::ForeignKey.is_relation());
        assert!(FieldKind::ManyToMany.is_relation());
        assert!(!FieldKind::Char.is_relation());
        assert!(!FieldKind::Auto.is_relation());
    }

    #[test]
    fn test_field_kind_deserialize_snake_case() {
        let kind: FieldKind = serde_yaml::from_str("null_boolean").expect("valid kind");
        assert_eq!(kind, FieldKind::NullBoolean);
        let kind: FieldKind = serde_yaml::from_str("datetime").expect("valid kind");
        assert_eq!(kind, FieldKind::DateTime);
        assert!(serde_yaml::from_str::<FieldKind>("varchar").is_err());
    }

    #[test]
    fn test_field_kind_display_matches_serde() {
        for kind in [FieldKind::ManyToMany, FieldKind::DateTime, FieldKind::Json] {
            let yaml = serde_yaml::to_string(&kind).expect("serialize");
            assert_eq!(yaml.trim(), kind.to_string());
        }
    }

    #[test]
    fn test_field_value_accessors() {
        let value = FieldValue::from("abc");
        assert_eq!(value.as_string(), Some("abc"));
        assert_eq!(value.as_integer(), None);
        assert!(!value.is_null());
        assert_eq!(FieldValue::from(7).as_integer(), Some(7));
        assert!(FieldValue::Null.is_null());
    }

    #[test]
    fn test_matches_text_against_number() {
        assert!(FieldValue::from("5").matches(&json!(5)));
        assert!(!FieldValue::from("5").matches(&json!(6)));
        assert!(FieldValue::from("true").matches(&json!(true)));
    }

    #[test]
    fn test_matches_null() {
        assert!(FieldValue::Null.matches(&json!(null)));
        assert!(!FieldValue::Null.matches(&json!(false)));
        assert!(!FieldValue::Boolean(false).matches(&json!(null)));
    }

    #[test]
    fn test_matches_date_against_datetime_string() {
        let date = NaiveDate::from_ymd_opt(2020, 12, 31).expect("valid date");
        assert!(FieldValue::Date(date).matches(&json!("2020-12-31")));
        assert!(FieldValue::Date(date).matches(&json!("2020-12-31T10:00:00Z")));
    }

    #[test]
    fn test_compare_integer() {
        let five = FieldValue::Integer(5);
        assert_eq!(five.compare(&json!(7)), Some(Ordering::Greater));
        assert_eq!(five.compare(&json!(5)), Some(Ordering::Equal));
        assert_eq!(five.compare(&json!("x")), None);
    }

    #[test]
    fn test_compare_date() {
        let date = NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date");
        let value = FieldValue::Date(date);
        assert_eq!(value.compare(&json!("1999-06-01")), Some(Ordering::Less));
        assert_eq!(value.compare(&json!("not a date")), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldValue::from("a").to_string(), "\"a\"");
        assert_eq!(
            FieldValue::List(vec![FieldValue::from("x")]).to_string(),
            "[\"x\"]"
        );
        assert_eq!(FieldValue::Null.to_string(), "null");
    }
}
