//! Configuration loading and management

use crate::access::Availability;
use crate::core::error::ConfigError;
use crate::core::field::FieldKind;
use crate::core::schema::{FieldSpec, ModelKey, ModelMetadata};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Model whose relations expose only `id` to filters (`app.model`)
    #[serde(default = "default_identity_model")]
    pub identity_model: String,

    /// Let a bare `project` parameter satisfy the project selector requirement
    #[serde(default = "default_true")]
    pub accept_bare_project_selector: bool,

    /// Page size used when a list request gives no `limit`; absent = unpaginated
    #[serde(default)]
    pub default_page_size: Option<usize>,

    /// Upper bound applied to any page size
    #[serde(default)]
    pub max_page_size: Option<usize>,
}

fn default_identity_model() -> String {
    "auth.user".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            identity_model: default_identity_model(),
            accept_bare_project_selector: true,
            default_page_size: None,
            max_page_size: None,
        }
    }
}

impl Settings {
    /// Effective page size for a request
    pub fn page_size(&self, requested: Option<usize>) -> Option<usize> {
        let size = requested.or(self.default_page_size)?;
        Some(match self.max_page_size {
            Some(max) => size.min(max),
            None => size,
        })
    }
}

/// Declaration of one field: a bare kind, or a kind with a relation target
///
/// ```yaml
/// name: char
/// project: { type: foreign_key, to: core.project }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldDecl {
    Kind(FieldKind),
    Detailed {
        #[serde(rename = "type")]
        kind: FieldKind,
        #[serde(default)]
        to: Option<String>,
    },
}

impl FieldDecl {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldDecl::Kind(kind) | FieldDecl::Detailed { kind, .. } => *kind,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            FieldDecl::Kind(_) => None,
            FieldDecl::Detailed { to, .. } => to.as_deref(),
        }
    }
}

/// Configuration for one model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,

    /// Tier name; absent means `private`
    #[serde(default)]
    pub availability: Option<String>,

    #[serde(default)]
    pub fields: IndexMap<String, FieldDecl>,

    #[serde(default)]
    pub required_fields: Vec<String>,

    #[serde(default)]
    pub serialization_fields: Option<Vec<String>>,

    #[serde(default)]
    pub owner_field: Option<String>,

    #[serde(default)]
    pub project_app: Option<String>,

    /// User-identifying relations (project models)
    #[serde(default)]
    pub user_fields: Vec<String>,
}

impl ModelConfig {
    /// Build the metadata of this model, declared inside `app`
    pub fn to_metadata(&self, app: &str) -> Result<ModelMetadata, ConfigError> {
        let key = ModelKey::new(app, &self.name);
        let availability =
            Availability::parse(self.availability.as_deref()).map_err(|source| {
                ConfigError::Availability {
                    model: key.to_string(),
                    source,
                }
            })?;

        let mut metadata = ModelMetadata::new(key.clone(), availability);
        for (name, decl) in &self.fields {
            let spec = match (decl.kind().is_relation(), decl.target()) {
                (true, Some(target)) => {
                    FieldSpec::relation(decl.kind(), ModelKey::parse(target, app)?)
                }
                (true, None) => {
                    return Err(ConfigError::MissingRelationTarget {
                        model: key.to_string(),
                        field: name.clone(),
                    });
                }
                (false, _) => FieldSpec::scalar(decl.kind()),
            };
            metadata.fields.insert(name.clone(), spec);
        }

        metadata.required_fields = self.required_fields.clone();
        metadata.serialization_fields = self.serialization_fields.clone();
        metadata.project_app = self.project_app.clone();
        metadata.user_fields = self.user_fields.clone();
        if let Some(owner) = &self.owner_field {
            metadata.owner_field = owner.clone();
        }

        Ok(metadata)
    }
}

/// Configuration for one app
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,

    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

/// Complete schema configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub settings: Settings,

    pub apps: Vec<AppConfig>,
}

impl SchemaConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.to_string(),
        })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            file: Some(path.to_string()),
            message: e.to_string(),
        })
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Number of declared models across all apps
    pub fn model_count(&self) -> usize {
        self.apps.iter().map(|app| app.models.len()).sum()
    }
}
