//! Static registry of model metadata, built and validated once at startup

use super::error::ConfigError;
use super::field::FieldKind;
use super::schema::{FieldSpec, ModelKey, ModelMetadata};
use crate::access::Availability;
use crate::config::{SchemaConfig, Settings};
use indexmap::IndexMap;

/// Lookup of [`ModelMetadata`] by `(app, model)`
///
/// Shared read-only behind an `Arc` once [`validate`](Self::validate) passed.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    models: IndexMap<ModelKey, ModelMetadata>,
    settings: Settings,
    identity_model: ModelKey,
}

impl SchemaRegistry {
    pub fn new(settings: Settings) -> Result<Self, ConfigError> {
        let identity_model = ModelKey::parse(&settings.identity_model, "auth")?;
        Ok(Self {
            models: IndexMap::new(),
            settings,
            identity_model,
        })
    }

    /// Build and validate a registry from a parsed configuration
    pub fn from_config(config: &SchemaConfig) -> Result<Self, ConfigError> {
        let mut registry = Self::new(config.settings.clone())?;
        for app in &config.apps {
            for model in &app.models {
                registry.register(model.to_metadata(&app.name)?)?;
            }
        }
        registry.validate()?;

        tracing::info!(models = registry.len(), "Schema registry ready");
        Ok(registry)
    }

    /// Add a model, rejecting duplicates
    pub fn register(&mut self, metadata: ModelMetadata) -> Result<(), ConfigError> {
        if self.models.contains_key(&metadata.key) {
            return Err(ConfigError::DuplicateModel {
                model: metadata.key.to_string(),
            });
        }
        self.models.insert(metadata.key.clone(), metadata);
        Ok(())
    }

    /// Builder-style [`register`](Self::register)
    pub fn with_model(mut self, metadata: ModelMetadata) -> Result<Self, ConfigError> {
        self.register(metadata)?;
        Ok(self)
    }

    pub fn get(&self, key: &ModelKey) -> Option<&ModelMetadata> {
        self.models.get(key)
    }

    pub fn lookup(&self, app: &str, model: &str) -> Option<&ModelMetadata> {
        self.get(&ModelKey::new(app, model))
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelMetadata> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn identity_model(&self) -> &ModelKey {
        &self.identity_model
    }

    pub fn is_identity_model(&self, key: &ModelKey) -> bool {
        *key == self.identity_model
    }

    /// Field kinds searchable on `key`
    ///
    /// The identity model only exposes `id`, whether or not it is declared.
    pub fn searchable_kind(&self, key: &ModelKey, field: &str) -> Option<&FieldSpec> {
        static IDENTITY_ID: FieldSpec = FieldSpec {
            kind: FieldKind::Auto,
            target: None,
        };

        if self.is_identity_model(key) {
            return (field == "id").then_some(&IDENTITY_ID);
        }
        self.get(key)?.field(field)
    }

    /// Fields serialised for a row: `_fields` if given, else the model's list,
    /// else every declared field
    pub fn serialization_fields(
        &self,
        metadata: &ModelMetadata,
        requested: Option<Vec<String>>,
    ) -> Vec<String> {
        requested
            .or_else(|| metadata.serialization_fields.clone())
            .unwrap_or_else(|| metadata.fields.keys().cloned().collect())
    }

    /// Check cross-model consistency of every registered model
    pub fn validate(&self) -> Result<(), ConfigError> {
        for metadata in self.models.values() {
            self.validate_model(metadata)?;
        }
        Ok(())
    }

    fn validate_model(&self, metadata: &ModelMetadata) -> Result<(), ConfigError> {
        let model = metadata.key.to_string();
        let unknown_field = |field: &str, context: &str| ConfigError::UnknownField {
            model: model.clone(),
            field: field.to_string(),
            context: context.to_string(),
        };

        for (name, spec) in &metadata.fields {
            match (&spec.target, spec.kind.is_relation()) {
                (Some(target), true) => {
                    if !self.models.contains_key(target) && !self.is_identity_model(target) {
                        return Err(ConfigError::UnknownRelationTarget {
                            model: model.clone(),
                            field: name.clone(),
                            target: target.to_string(),
                        });
                    }
                }
                (None, true) => {
                    return Err(ConfigError::MissingRelationTarget {
                        model: model.clone(),
                        field: name.clone(),
                    });
                }
                _ => {}
            }
        }

        for field in &metadata.required_fields {
            if !metadata.has_field(field) {
                return Err(unknown_field(field, "required_fields"));
            }
        }
        for field in metadata.serialization_fields.iter().flatten() {
            if !metadata.has_field(field) {
                return Err(unknown_field(field, "serialization_fields"));
            }
        }
        for field in &metadata.user_fields {
            if !metadata.has_relation(field) {
                return Err(unknown_field(field, "user_fields"));
            }
        }
        if matches!(
            metadata.availability,
            Availability::Private | Availability::PublicOrUser | Availability::ProjectOrUser
        ) && !metadata.has_field(&metadata.owner_field)
        {
            return Err(unknown_field(&metadata.owner_field, "owner_field"));
        }

        metadata
            .availability
            .check_prerequisites(self, metadata)
            .map_err(|source| ConfigError::Availability {
                model: model.clone(),
                source,
            })?;

        if metadata.availability.needs_project() {
            let project_key = metadata.project_model_key();
            let project = self.get(&project_key).ok_or_else(|| ConfigError::ProjectModel {
                model: model.clone(),
                project: project_key.to_string(),
                problem: "is not declared".to_string(),
            })?;
            if project.user_fields.is_empty() {
                return Err(ConfigError::ProjectModel {
                    model: model.clone(),
                    project: project_key.to_string(),
                    problem: "declares no user_fields".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_fk() -> FieldSpec {
        FieldSpec::relation(FieldKind::ForeignKey, ModelKey::new("auth", "user"))
    }

    fn project_model() -> ModelMetadata {
        let mut project = ModelMetadata::new(ModelKey::new("core", "project"), Availability::LoggedIn)
            .with_field("name", FieldSpec::scalar(FieldKind::Char))
            .with_field("owner", user_fk());
        project.user_fields = vec!["owner".to_string()];
        project
    }

    fn note_model(availability: Availability) -> ModelMetadata {
        ModelMetadata::new(ModelKey::new("core", "note"), availability)
            .with_field("public", FieldSpec::scalar(FieldKind::Boolean))
            .with_field(
                "project",
                FieldSpec::relation(FieldKind::ForeignKey, ModelKey::new("core", "project")),
            )
            .with_field("user", user_fk())
    }

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new(Settings::default()).expect("valid settings")
    }

    #[test]
    fn test_valid_registry() {
        let registry = registry()
            .with_model(project_model())
            .and_then(|r| r.with_model(note_model(Availability::ProjectOrUser)))
            .expect("register");
        registry.validate().expect("valid registry");
        assert_eq!(registry.len(), 2);
        assert!(registry.lookup("core", "note").is_some());
    }

    #[test]
    fn test_duplicate_model() {
        let err = registry()
            .with_model(project_model())
            .and_then(|r| r.with_model(project_model()))
            .expect_err("duplicate");
        assert!(matches!(err, ConfigError::DuplicateModel { .. }));
    }

    #[test]
    fn test_unknown_relation_target() {
        let note = ModelMetadata::new(ModelKey::new("core", "note"), Availability::Public).with_field(
            "book",
            FieldSpec::relation(FieldKind::ForeignKey, ModelKey::new("core", "book")),
        );
        let registry = registry().with_model(note).expect("register");
        assert!(matches!(
            registry.validate(),
            Err(ConfigError::UnknownRelationTarget { .. })
        ));
    }

    #[test]
    fn test_project_tier_without_project_model() {
        let registry = registry()
            .with_model(note_model(Availability::Project))
            .expect("register");
        let err = registry.validate().expect_err("project model missing");
        // the dangling `project` relation is reported first
        assert!(matches!(err, ConfigError::UnknownRelationTarget { .. }));
    }

    #[test]
    fn test_project_model_without_user_fields() {
        let mut project = project_model();
        project.user_fields.clear();
        let registry = registry()
            .with_model(project)
            .and_then(|r| r.with_model(note_model(Availability::Project)))
            .expect("register");
        assert!(matches!(
            registry.validate(),
            Err(ConfigError::ProjectModel { .. })
        ));
    }

    #[test]
    fn test_public_or_user_without_public_field() {
        let note = ModelMetadata::new(ModelKey::new("core", "note"), Availability::PublicOrUser)
            .with_field("user", user_fk());
        let registry = registry().with_model(note).expect("register");
        let err = registry.validate().expect_err("public field missing");
        assert!(err.to_string().contains("10004"));
    }

    #[test]
    fn test_private_without_owner_field() {
        let note = ModelMetadata::new(ModelKey::new("core", "note"), Availability::Private);
        let registry = registry().with_model(note).expect("register");
        assert!(matches!(
            registry.validate(),
            Err(ConfigError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_identity_model_exposes_only_id() {
        let registry = registry();
        let user = ModelKey::new("auth", "user");
        assert_eq!(
            registry.searchable_kind(&user, "id").map(|f| f.kind),
            Some(FieldKind::Auto)
        );
        assert!(registry.searchable_kind(&user, "username").is_none());
    }

    #[test]
    fn test_serialization_fields_precedence() {
        let mut note = note_model(Availability::Public);
        let registry = registry();
        assert_eq!(registry.serialization_fields(&note, None).len(), note.fields.len());

        note.serialization_fields = Some(vec!["id".to_string()]);
        assert_eq!(registry.serialization_fields(&note, None), vec!["id"]);
        assert_eq!(
            registry.serialization_fields(&note, Some(vec!["public".to_string()])),
            vec!["public"]
        );
    }
}
