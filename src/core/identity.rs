//! Requester identity for schemagate
//!
//! The engine never authenticates anyone: an [`IdentityProvider`] hands it an
//! [`Identity`] that already carries the principal's groups and permissions.

use super::error::{GateError, RequestError};
use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::Serialize;

/// Header carrying the authenticated user's numeric id
pub const HEADER_USER_ID: &str = "x-user-id";
/// Header carrying the username
pub const HEADER_USERNAME: &str = "x-username";
/// Header carrying the display identifier used for audit stamps
pub const HEADER_USER_IDENTIFIER: &str = "x-user-identifier";
/// Header carrying comma-separated group names
pub const HEADER_USER_GROUPS: &str = "x-user-groups";
/// Header carrying comma-separated `app.action_model` permissions
pub const HEADER_USER_PERMISSIONS: &str = "x-user-permissions";

/// Who is making a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    /// No authentication
    Anonymous,

    /// Authenticated principal
    User {
        id: i64,
        username: String,
        /// Preferred name for audit fields, when set
        identifier: Option<String>,
        groups: Vec<String>,
        permissions: Vec<String>,
    },
}

impl Identity {
    /// Authenticated user with no groups or permissions
    pub fn user(id: i64, username: impl Into<String>) -> Self {
        Identity::User {
            id,
            username: username.into(),
            identifier: None,
            groups: Vec::new(),
            permissions: Vec::new(),
        }
    }

    /// Add a group membership (builder style)
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        if let Identity::User { groups, .. } = &mut self {
            groups.push(group.into());
        }
        self
    }

    /// Add a model permission (builder style)
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        if let Identity::User { permissions, .. } = &mut self {
            permissions.push(permission.into());
        }
        self
    }

    /// Set the display identifier used for audit fields (builder style)
    pub fn with_identifier(mut self, value: impl Into<String>) -> Self {
        if let Identity::User { identifier, .. } = &mut self {
            *identifier = Some(value.into());
        }
        self
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::User { .. })
    }

    /// The owner value compared against ownership fields
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Identity::User { id, .. } => Some(*id),
            Identity::Anonymous => None,
        }
    }

    pub fn in_group(&self, name: &str) -> bool {
        match self {
            Identity::User { groups, .. } => groups.iter().any(|g| g == name),
            Identity::Anonymous => false,
        }
    }

    /// Check membership of the `{app}_superusers` group
    pub fn is_superuser_of(&self, app: &str) -> bool {
        self.in_group(&format!("{}_superusers", app))
    }

    /// Check a model permission such as `core.change_project`
    ///
    /// Superusers of the app hold every permission on it.
    pub fn has_model_permission(&self, app: &str, action: &str, model: &str) -> bool {
        match self {
            Identity::User { permissions, .. } => {
                let wanted = format!("{}.{}_{}", app, action, model);
                self.is_superuser_of(app) || permissions.iter().any(|p| *p == wanted)
            }
            Identity::Anonymous => false,
        }
    }

    /// Name written into `created_by` / `last_modified_by`
    pub fn audit_name(&self) -> Option<&str> {
        match self {
            Identity::User {
                identifier,
                username,
                ..
            } => Some(
                identifier
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .unwrap_or(username),
            ),
            Identity::Anonymous => None,
        }
    }
}

/// Source of requester identities
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Build the identity for a request from its headers
    async fn identify(&self, headers: &HeaderMap) -> Result<Identity, GateError>;
}

/// Provider treating every request as anonymous (for development)
pub struct AnonymousProvider;

#[async_trait]
impl IdentityProvider for AnonymousProvider {
    async fn identify(&self, _headers: &HeaderMap) -> Result<Identity, GateError> {
        Ok(Identity::Anonymous)
    }
}

/// Provider trusting identity headers set by an authenticating gateway
///
/// A request without `x-user-id` is anonymous.
#[derive(Debug, Default, Clone)]
pub struct HeaderIdentityProvider;

impl HeaderIdentityProvider {
    pub fn new() -> Self {
        Self
    }

    fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, GateError> {
        match headers.get(name) {
            None => Ok(None),
            Some(value) => value.to_str().map(|s| Some(s.trim())).map_err(|e| {
                RequestError::InvalidHeader {
                    header: name.to_string(),
                    message: e.to_string(),
                }
                .into()
            }),
        }
    }

    fn list(headers: &HeaderMap, name: &str) -> Result<Vec<String>, GateError> {
        Ok(Self::header(headers, name)?
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl IdentityProvider for HeaderIdentityProvider {
    async fn identify(&self, headers: &HeaderMap) -> Result<Identity, GateError> {
        let Some(raw_id) = Self::header(headers, HEADER_USER_ID)? else {
            return Ok(Identity::Anonymous);
        };

        let id: i64 = raw_id.parse().map_err(|_| RequestError::InvalidHeader {
            header: HEADER_USER_ID.to_string(),
            message: format!("'{}' is not a numeric user id", raw_id),
        })?;

        let username = Self::header(headers, HEADER_USERNAME)?
            .map(String::from)
            .unwrap_or_else(|| id.to_string());

        Ok(Identity::User {
            id,
            username,
            identifier: Self::header(headers, HEADER_USER_IDENTIFIER)?.map(String::from),
            groups: Self::list(headers, HEADER_USER_GROUPS)?,
            permissions: Self::list(headers, HEADER_USER_PERMISSIONS)?,
        })
    }
}
