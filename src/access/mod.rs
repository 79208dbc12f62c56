//! Row visibility: availability tiers and the access policy resolver

pub mod policy;

pub use policy::{membership_predicate, resolve_access};

use crate::core::error::{
    AccessError, CODE_PROJECT, CODE_PUBLIC_OR_PROJECT, CODE_PUBLIC_OR_USER,
};
use crate::core::registry::SchemaRegistry;
use crate::core::schema::ModelMetadata;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Visibility tier of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Anyone reads everything
    Public,
    /// Any authenticated requester reads everything
    LoggedIn,
    /// Public rows for everyone, plus project rows for members
    PublicOrProject,
    /// Members of the selected project only
    Project,
    /// Owned rows plus rows of the requester's projects
    ProjectOrUser,
    /// Public rows for everyone, plus owned rows
    PublicOrUser,
    /// Owned rows only
    #[default]
    Private,
}

impl Availability {
    pub const ALL: [Availability; 7] = [
        Availability::Public,
        Availability::LoggedIn,
        Availability::PublicOrProject,
        Availability::Project,
        Availability::ProjectOrUser,
        Availability::PublicOrUser,
        Availability::Private,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Availability::Public => "public",
            Availability::LoggedIn => "logged_in",
            Availability::PublicOrProject => "public_or_project",
            Availability::Project => "project",
            Availability::ProjectOrUser => "project_or_user",
            Availability::PublicOrUser => "public_or_user",
            Availability::Private => "private",
        }
    }

    /// Parse a declared tier; an undeclared tier is `private`
    pub fn parse(value: Option<&str>) -> Result<Self, AccessError> {
        match value {
            None => Ok(Availability::Private),
            Some(raw) => raw.parse(),
        }
    }

    /// Check if the tier filters through the project model
    pub fn needs_project(self) -> bool {
        matches!(
            self,
            Availability::PublicOrProject | Availability::Project | Availability::ProjectOrUser
        )
    }

    /// Verify the model declares what this tier reads
    pub fn check_prerequisites(
        self,
        registry: &SchemaRegistry,
        metadata: &ModelMetadata,
    ) -> Result<(), AccessError> {
        let project_model_known = || registry.get(&metadata.project_model_key()).is_some();

        match self {
            Availability::PublicOrProject => {
                if !metadata.has_boolean_field("public")
                    || !metadata.has_relation("project")
                    || !project_model_known()
                {
                    return Err(AccessError::SchemaConfiguration {
                        code: CODE_PUBLIC_OR_PROJECT,
                    });
                }
            }
            Availability::Project | Availability::ProjectOrUser => {
                if !metadata.has_relation("project") || !project_model_known() {
                    return Err(AccessError::SchemaConfiguration { code: CODE_PROJECT });
                }
            }
            Availability::PublicOrUser => {
                if !metadata.has_boolean_field("public") {
                    return Err(AccessError::SchemaConfiguration {
                        code: CODE_PUBLIC_OR_USER,
                    });
                }
            }
            Availability::Public | Availability::LoggedIn | Availability::Private => {}
        }
        Ok(())
    }
}

impl FromStr for Availability {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Availability::ALL
            .into_iter()
            .find(|tier| tier.as_str() == s)
            .ok_or_else(|| AccessError::UnknownAvailabilityTier {
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undeclared_tier_is_private() {
        assert_eq!(Availability::parse(None), Ok(Availability::Private));
        assert_eq!(Availability::default(), Availability::Private);
    }

    #[test]
    fn test_parse_every_tier() {
        for tier in Availability::ALL {
            assert_eq!(Availability::parse(Some(tier.as_str())), Ok(tier));
        }
    }

    #[test]
    fn test_legacy_tiers_are_unknown() {
        for legacy in ["open", "restricted", "Public", ""] {
            assert_eq!(
                Availability::parse(Some(legacy)),
                Err(AccessError::UnknownAvailabilityTier {
                    value: legacy.to_string()
                })
            );
        }
    }

    #[test]
    fn test_needs_project() {
        assert!(Availability::Project.needs_project());
        assert!(Availability::PublicOrProject.needs_project());
        assert!(!Availability::PublicOrUser.needs_project());
    }
}
