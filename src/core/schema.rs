//! Model metadata: the read-only description of every exposed model

use super::error::ConfigError;
use super::field::FieldKind;
use crate::access::Availability;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Audit fields every model carries, with their kinds
pub const AUDIT_FIELDS: [(&str, FieldKind); 5] = [
    ("created_time", FieldKind::DateTime),
    ("created_by", FieldKind::Text),
    ("last_modified_time", FieldKind::DateTime),
    ("last_modified_by", FieldKind::Text),
    ("version_number", FieldKind::Integer),
];

/// Identifier of a model: the app that owns it and its name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelKey {
    pub app: String,
    pub model: String,
}

impl ModelKey {
    pub fn new(app: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            model: model.into(),
        }
    }

    /// Parse `app.model`, or a bare `model` resolved against `default_app`
    pub fn parse(value: &str, default_app: &str) -> Result<Self, ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidModelRef {
            value: value.to_string(),
            message: message.to_string(),
        };

        match value.split_once('.') {
            Some((app, model)) => {
                if app.is_empty() || model.is_empty() || model.contains('.') {
                    return Err(invalid("expected 'app.model'"));
                }
                Ok(Self::new(app, model))
            }
            None if value.is_empty() => Err(invalid("empty model reference")),
            None => Ok(Self::new(default_app, value)),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app, self.model)
    }
}

/// A field's semantic type, plus the target model for relations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub target: Option<ModelKey>,
}

impl FieldSpec {
    pub fn scalar(kind: FieldKind) -> Self {
        Self { kind, target: None }
    }

    pub fn relation(kind: FieldKind, target: ModelKey) -> Self {
        Self {
            kind,
            target: Some(target),
        }
    }
}

/// Everything the engine knows about one model
#[derive(Debug, Clone)]
pub struct ModelMetadata {
    pub key: ModelKey,
    pub availability: Availability,
    pub fields: IndexMap<String, FieldSpec>,
    pub required_fields: Vec<String>,
    /// App supplying the project model, when it is not the model's own app
    pub project_app: Option<String>,
    /// Field holding the owning user's id
    pub owner_field: String,
    /// User-identifying relations (only meaningful on project models)
    pub user_fields: Vec<String>,
    /// Fields serialised when the request does not ask for `_fields`
    pub serialization_fields: Option<Vec<String>>,
}

impl ModelMetadata {
    /// Create metadata with the audit fields and an `id` already declared
    pub fn new(key: ModelKey, availability: Availability) -> Self {
        let mut fields = IndexMap::new();
        fields.insert("id".to_string(), FieldSpec::scalar(FieldKind::Auto));
        for (name, kind) in AUDIT_FIELDS {
            fields.insert(name.to_string(), FieldSpec::scalar(kind));
        }

        Self {
            key,
            availability,
            fields,
            required_fields: Vec::new(),
            project_app: None,
            owner_field: "user".to_string(),
            user_fields: Vec::new(),
            serialization_fields: None,
        }
    }

    /// Builder-style field declaration
    pub fn with_field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Check if `name` is declared with a boolean kind
    pub fn has_boolean_field(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.kind.is_boolean())
    }

    /// Check if `name` is declared as a relation
    pub fn has_relation(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.kind.is_relation())
    }

    /// Key of the model providing this model's project concept
    pub fn project_model_key(&self) -> ModelKey {
        let app = self.project_app.as_deref().unwrap_or(&self.key.app);
        ModelKey::new(app, "project")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_key_parse_qualified() {
        let key = ModelKey::parse("auth.user", "core").expect("valid ref");
        assert_eq!(key, ModelKey::new("auth", "user"));
    }

    #[test]
    fn test_model_key_parse_bare_uses_default_app() {
        let key = ModelKey::parse("project", "core").expect("valid ref");
        assert_eq!(key, ModelKey::new("core", "project"));
    }

    #[test]
    fn test_model_key_parse_rejects_malformed() {
        assert!(ModelKey::parse("", "core").is_err());
        assert!(ModelKey::parse(".user", "core").is_err());
        assert!(ModelKey::parse("a.b.c", "core").is_err());
    }

    #[test]
    fn test_metadata_declares_id_and_audit_fields() {
        let meta = ModelMetadata::new(ModelKey::new("core", "note"), Availability::Private);
        assert_eq!(meta.field("id").map(|f| f.kind), Some(FieldKind::Auto));
        assert_eq!(
            meta.field("version_number").map(|f| f.kind),
            Some(FieldKind::Integer)
        );
        assert_eq!(meta.owner_field, "user");
    }

    #[test]
    fn test_field_predicates() {
        let meta = ModelMetadata::new(ModelKey::new("core", "note"), Availability::Private)
            .with_field("public", FieldSpec::scalar(FieldKind::NullBoolean))
            .with_field(
                "project",
                FieldSpec::relation(FieldKind::ForeignKey, ModelKey::new("core", "project")),
            );
        assert!(meta.has_boolean_field("public"));
        assert!(!meta.has_boolean_field("project"));
        assert!(meta.has_relation("project"));
        assert!(!meta.has_relation("public"));
    }

    #[test]
    fn test_project_model_key_override() {
        let mut meta = ModelMetadata::new(ModelKey::new("notes", "note"), Availability::Project);
        assert_eq!(meta.project_model_key(), ModelKey::new("notes", "project"));
        meta.project_app = Some("core".to_string());
        assert_eq!(meta.project_model_key(), ModelKey::new("core", "project"));
    }
}
