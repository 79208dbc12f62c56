//! Typed error handling for schemagate
//!
//! Every failure surfaced to a caller is one of the category enums below,
//! wrapped in [`GateError`]. Each category knows its HTTP status and a stable
//! error code so transports can map it without string matching.
//!
//! # Error Categories
//!
//! - [`AccessError`]: the access policy denied the request
//! - [`EntityError`]: the addressed model or row does not exist
//! - [`ConfigError`]: the schema configuration is invalid
//! - [`ValidationError`]: a write body is not acceptable
//! - [`StorageError`]: the storage engine failed
//! - [`RequestError`]: the HTTP request itself is unusable
//!
//! # Example
//!
//! ```rust,ignore
//! match resolve_access(&registry, &model, &identity, &params) {
//!     Ok(visibility) => run_query(visibility),
//!     Err(AccessError::AuthenticationRequired) => ask_for_login(),
//!     Err(e) => return Err(GateError::from(e)),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Diagnostic code: `public_or_project` without `public` flag or `project` relation
pub const CODE_PUBLIC_OR_PROJECT: u16 = 10002;
/// Diagnostic code: `project`/`project_or_user` without a usable `project` relation
pub const CODE_PROJECT: u16 = 10003;
/// Diagnostic code: `public_or_user` without `public` flag
pub const CODE_PUBLIC_OR_USER: u16 = 10004;
/// Diagnostic code: availability value is not a known tier
pub const CODE_UNKNOWN_TIER: u16 = 10005;

/// The main error type for schemagate
#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Request(#[from] RequestError),

    /// Internal errors (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl GateError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::Access(e) => e.status_code(),
            GateError::Entity(e) => e.status_code(),
            GateError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Validation(_) => StatusCode::BAD_REQUEST,
            GateError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Request(e) => e.status_code(),
            GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            GateError::Access(e) => e.error_code(),
            GateError::Entity(e) => e.error_code(),
            GateError::Config(_) => "CONFIG_ERROR",
            GateError::Validation(_) => "VALIDATION_ERROR",
            GateError::Storage(_) => "STORAGE_ERROR",
            GateError::Request(e) => e.error_code(),
            GateError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            GateError::Access(AccessError::SchemaConfiguration { code }) => {
                Some(serde_json::json!({ "diagnostic": code }))
            }
            GateError::Access(AccessError::UnknownAvailabilityTier { value }) => {
                Some(serde_json::json!({ "diagnostic": CODE_UNKNOWN_TIER, "availability": value }))
            }
            GateError::Entity(EntityError::NotFound { model, id }) => {
                Some(serde_json::json!({ "model": model, "id": id }))
            }
            GateError::Validation(ValidationError::MissingRequired { fields }) => {
                Some(serde_json::json!({ "fields": fields }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{}", self);
        }
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Access Errors
// =============================================================================

/// Outcomes of the access policy that deny a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Query not complete - Project must be specified")]
    ProjectSelectorRequired,

    /// The model's tier needs a field or model the schema does not declare
    #[error("Internal server error - model configuration incompatible with API (code {code})")]
    SchemaConfiguration { code: u16 },

    #[error("Internal server error - model availability incompatible with API (code 10005)")]
    UnknownAvailabilityTier { value: String },
}

impl AccessError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AccessError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            AccessError::ProjectSelectorRequired => StatusCode::BAD_REQUEST,
            AccessError::SchemaConfiguration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AccessError::UnknownAvailabilityTier { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AccessError::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            AccessError::ProjectSelectorRequired => "PROJECT_SELECTOR_REQUIRED",
            AccessError::SchemaConfiguration { .. } => "SCHEMA_CONFIGURATION_ERROR",
            AccessError::UnknownAvailabilityTier { .. } => "UNKNOWN_AVAILABILITY_TIER",
        }
    }
}

// =============================================================================
// Entity Errors
// =============================================================================

/// Errors about the addressed model or row
#[derive(Debug, Error)]
pub enum EntityError {
    #[error("Item does not exist")]
    NotFound { model: String, id: String },

    #[error("Unknown model: {app}/{model}")]
    UnknownModel { app: String, model: String },

    #[error("Field '{field}' of {model} is not a many-to-many relation")]
    NotManyToMany { model: String, field: String },
}

impl EntityError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EntityError::NotFound { .. } => StatusCode::NOT_FOUND,
            EntityError::UnknownModel { .. } => StatusCode::NOT_FOUND,
            EntityError::NotManyToMany { .. } => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            EntityError::NotFound { .. } => "ITEM_NOT_FOUND",
            EntityError::UnknownModel { .. } => "UNKNOWN_MODEL",
            EntityError::NotManyToMany { .. } => "NOT_MANY_TO_MANY",
        }
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors found while loading or validating the schema configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config{}: {message}", .file.as_ref().map(|f| format!(" file '{}'", f)).unwrap_or_default())]
    ParseError {
        file: Option<String>,
        message: String,
    },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid model reference '{value}': {message}")]
    InvalidModelRef { value: String, message: String },

    #[error("Model {model} is declared twice")]
    DuplicateModel { model: String },

    #[error("Field '{field}' of {model} targets unknown model {target}")]
    UnknownRelationTarget {
        model: String,
        field: String,
        target: String,
    },

    #[error("Field '{field}' of {model} is a relation without a target")]
    MissingRelationTarget { model: String, field: String },

    #[error("{context} of {model} names undeclared field '{field}'")]
    UnknownField {
        model: String,
        field: String,
        context: String,
    },

    #[error("Model {model}: {source}")]
    Availability {
        model: String,
        #[source]
        source: AccessError,
    },

    #[error("Model {model} needs project model {project}, which {problem}")]
    ProjectModel {
        model: String,
        project: String,
        problem: String,
    },
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors in a write body
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Request body must be a JSON object")]
    NotAnObject,

    #[error("Unknown field '{field}'")]
    UnknownField { field: String },

    #[error("Missing required fields: {}", .fields.join(", "))]
    MissingRequired { fields: Vec<String> },

    #[error("Invalid value for field '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors raised by a storage engine
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage lock poisoned: {message}")]
    LockPoisoned { message: String },

    #[error("No table for model {model}")]
    UnknownTable { model: String },

    #[error("Query error: {message}")]
    QueryError { message: String },
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors related to HTTP requests
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Invalid header '{header}': {message}")]
    InvalidHeader { header: String, message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Precondition failed: expected version {expected}, found {actual}")]
    PreconditionFailed { expected: String, actual: String },
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::InvalidHeader { .. } => StatusCode::BAD_REQUEST,
            RequestError::Forbidden { .. } => StatusCode::FORBIDDEN,
            RequestError::PreconditionFailed { .. } => StatusCode::PRECONDITION_FAILED,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::InvalidHeader { .. } => "INVALID_HEADER",
            RequestError::Forbidden { .. } => "FORBIDDEN",
            RequestError::PreconditionFailed { .. } => "PRECONDITION_FAILED",
        }
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        }
    }
}

/// A specialized Result type for schemagate operations
pub type GateResult<T> = Result<T, GateError>;
