//! Access policy resolver
//!
//! Turns a model's availability tier, the requester identity and the request
//! parameters into either a denial or a visibility predicate. The predicate
//! is always ANDed with whatever the requester filters on.

use super::Availability;
use crate::core::error::{AccessError, CODE_PROJECT, CODE_PUBLIC_OR_PROJECT};
use crate::core::identity::Identity;
use crate::core::predicate::{PATH_SEPARATOR, Predicate};
use crate::core::query::QueryParams;
use crate::core::registry::SchemaRegistry;
use crate::core::schema::ModelMetadata;

/// Resolve the rows of `metadata` visible to `identity`
///
/// Returns [`Predicate::Always`] for unrestricted access.
pub fn resolve_access(
    registry: &SchemaRegistry,
    metadata: &ModelMetadata,
    identity: &Identity,
    params: &QueryParams,
) -> Result<Predicate, AccessError> {
    let tier = metadata.availability;
    let app = metadata.key.app.as_str();
    let superuser = identity.is_superuser_of(app);

    let visibility = match tier {
        Availability::Public => Predicate::Always,

        Availability::LoggedIn => {
            require_login(identity)?;
            Predicate::Always
        }

        Availability::PublicOrProject => {
            tier.check_prerequisites(registry, metadata)?;
            match identity.user_id() {
                None => public_only(),
                Some(_) if superuser => Predicate::Always,
                Some(_) if !has_selector(registry, params) => public_only(),
                Some(user_id) => {
                    let project = project_model(registry, metadata, CODE_PUBLIC_OR_PROJECT)?;
                    Predicate::mk_or(vec![public_only(), membership_predicate(project, user_id)])
                }
            }
        }

        Availability::Project | Availability::ProjectOrUser => {
            let user_id = require_login(identity)?;
            tier.check_prerequisites(registry, metadata)?;
            if !has_selector(registry, params) {
                return Err(AccessError::ProjectSelectorRequired);
            }
            if superuser {
                Predicate::Always
            } else {
                let project = project_model(registry, metadata, CODE_PROJECT)?;
                let members = membership_predicate(project, user_id);
                if tier == Availability::ProjectOrUser {
                    Predicate::mk_or(vec![owned_by(metadata, user_id), members])
                } else {
                    members
                }
            }
        }

        Availability::PublicOrUser => {
            tier.check_prerequisites(registry, metadata)?;
            match identity.user_id() {
                None => public_only(),
                Some(_) if superuser => Predicate::Always,
                Some(user_id) => Predicate::mk_or(vec![public_only(), owned_by(metadata, user_id)]),
            }
        }

        Availability::Private => {
            let user_id = require_login(identity)?;
            if superuser {
                Predicate::Always
            } else {
                owned_by(metadata, user_id)
            }
        }
    };

    tracing::debug!(
        model = %metadata.key,
        availability = %tier,
        superuser,
        visibility = %visibility,
        "Resolved access"
    );
    Ok(visibility)
}

/// Rows of the requester's projects: OR of `project__{field} = user_id` over
/// the project model's user fields
pub fn membership_predicate(project: &ModelMetadata, user_id: i64) -> Predicate {
    Predicate::mk_or(
        project
            .user_fields
            .iter()
            .map(|field| Predicate::eq(format!("project{}{}", PATH_SEPARATOR, field), user_id))
            .collect(),
    )
}

fn require_login(identity: &Identity) -> Result<i64, AccessError> {
    identity.user_id().ok_or(AccessError::AuthenticationRequired)
}

fn public_only() -> Predicate {
    Predicate::eq("public", true)
}

fn owned_by(metadata: &ModelMetadata, user_id: i64) -> Predicate {
    Predicate::eq(metadata.owner_field.clone(), user_id)
}

fn has_selector(registry: &SchemaRegistry, params: &QueryParams) -> bool {
    if params.has_project_selector() {
        return true;
    }
    if params.has_bare_project_selector() && registry.settings().accept_bare_project_selector {
        tracing::warn!("Bare 'project' parameter used as project selector; use 'project__id'");
        return true;
    }
    false
}

fn project_model<'a>(
    registry: &'a SchemaRegistry,
    metadata: &ModelMetadata,
    code: u16,
) -> Result<&'a ModelMetadata, AccessError> {
    registry
        .get(&metadata.project_model_key())
        .ok_or(AccessError::SchemaConfiguration { code })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::core::error::CODE_PUBLIC_OR_USER;
    use crate::core::field::FieldKind;
    use crate::core::schema::{FieldSpec, ModelKey};

    fn user_fk() -> FieldSpec {
        FieldSpec::relation(FieldKind::ForeignKey, ModelKey::new("auth", "user"))
    }

    fn registry_with(note: ModelMetadata, settings: Settings) -> SchemaRegistry {
        let mut project = ModelMetadata::new(ModelKey::new("core", "project"), Availability::LoggedIn)
            .with_field("owner", user_fk())
            .with_field(
                "editors",
                FieldSpec::relation(FieldKind::ManyToMany, ModelKey::new("auth", "user")),
            );
        project.user_fields = vec!["owner".to_string(), "editors".to_string()];

        SchemaRegistry::new(settings)
            .and_then(|r| r.with_model(project))
            .and_then(|r| r.with_model(note))
            .expect("valid registry")
    }

    fn note(availability: Availability) -> ModelMetadata {
        ModelMetadata::new(ModelKey::new("core", "note"), availability)
            .with_field("public", FieldSpec::scalar(FieldKind::Boolean))
            .with_field(
                "project",
                FieldSpec::relation(FieldKind::ForeignKey, ModelKey::new("core", "project")),
            )
            .with_field("user", user_fk())
    }

    fn resolve(
        availability: Availability,
        identity: &Identity,
        params: &[(&str, &str)],
    ) -> Result<Predicate, AccessError> {
        let registry = registry_with(note(availability), Settings::default());
        let metadata = registry.lookup("core", "note").expect("note registered").clone();
        resolve_access(&registry, &metadata, identity, &QueryParams::from_pairs(params.iter().copied()))
    }

    fn members(user_id: i64) -> Predicate {
        Predicate::mk_or(vec![
            Predicate::eq("project__owner", user_id),
            Predicate::eq("project__editors", user_id),
        ])
    }

    #[test]
    fn test_public_is_unrestricted_for_everyone() {
        assert_eq!(resolve(Availability::Public, &Identity::Anonymous, &[]), Ok(Predicate::Always));
        assert_eq!(
            resolve(Availability::Public, &Identity::user(1, "ann"), &[]),
            Ok(Predicate::Always)
        );
    }

    #[test]
    fn test_logged_in() {
        assert_eq!(
            resolve(Availability::LoggedIn, &Identity::Anonymous, &[]),
            Err(AccessError::AuthenticationRequired)
        );
        assert_eq!(
            resolve(Availability::LoggedIn, &Identity::user(1, "ann"), &[]),
            Ok(Predicate::Always)
        );
    }

    #[test]
    fn test_private() {
        assert_eq!(
            resolve(Availability::Private, &Identity::Anonymous, &[]),
            Err(AccessError::AuthenticationRequired)
        );
        assert_eq!(
            resolve(Availability::Private, &Identity::user(7, "ann"), &[]),
            Ok(Predicate::eq("user", 7))
        );
        let admin = Identity::user(7, "ann").with_group("core_superusers");
        assert_eq!(resolve(Availability::Private, &admin, &[]), Ok(Predicate::Always));
    }

    #[test]
    fn test_private_uses_owner_field() {
        let mut metadata = note(Availability::Private).with_field("author", user_fk());
        metadata.owner_field = "author".to_string();
        let registry = registry_with(metadata, Settings::default());
        let metadata = registry.lookup("core", "note").expect("note registered");
        assert_eq!(
            resolve_access(&registry, metadata, &Identity::user(3, "ann"), &QueryParams::new()),
            Ok(Predicate::eq("author", 3))
        );
    }

    #[test]
    fn test_public_or_project() {
        assert_eq!(
            resolve(Availability::PublicOrProject, &Identity::Anonymous, &[("project__id", "1")]),
            Ok(Predicate::eq("public", true))
        );
        assert_eq!(
            resolve(Availability::PublicOrProject, &Identity::user(2, "ann"), &[]),
            Ok(Predicate::eq("public", true))
        );
        assert_eq!(
            resolve(
                Availability::PublicOrProject,
                &Identity::user(2, "ann"),
                &[("project__id", "1")]
            ),
            Ok(Predicate::mk_or(vec![Predicate::eq("public", true), members(2)]))
        );
        let admin = Identity::user(2, "ann").with_group("core_superusers");
        assert_eq!(
            resolve(Availability::PublicOrProject, &admin, &[]),
            Ok(Predicate::Always)
        );
    }

    #[test]
    fn test_project_requires_selector() {
        assert_eq!(
            resolve(Availability::Project, &Identity::Anonymous, &[("project__id", "1")]),
            Err(AccessError::AuthenticationRequired)
        );
        assert_eq!(
            resolve(Availability::Project, &Identity::user(2, "ann"), &[]),
            Err(AccessError::ProjectSelectorRequired)
        );
        assert_eq!(
            resolve(Availability::Project, &Identity::user(2, "ann"), &[("project__id", "1")]),
            Ok(members(2))
        );
    }

    #[test]
    fn test_project_superuser_still_needs_selector() {
        let admin = Identity::user(2, "ann").with_group("core_superusers");
        assert_eq!(
            resolve(Availability::Project, &admin, &[]),
            Err(AccessError::ProjectSelectorRequired)
        );
        assert_eq!(
            resolve(Availability::Project, &admin, &[("project__id", "1")]),
            Ok(Predicate::Always)
        );
    }

    #[test]
    fn test_project_or_user() {
        assert_eq!(
            resolve(Availability::ProjectOrUser, &Identity::user(4, "ann"), &[]),
            Err(AccessError::ProjectSelectorRequired)
        );
        assert_eq!(
            resolve(
                Availability::ProjectOrUser,
                &Identity::user(4, "ann"),
                &[("project__id", "1")]
            ),
            Ok(Predicate::mk_or(vec![Predicate::eq("user", 4), members(4)]))
        );
    }

    #[test]
    fn test_public_or_user() {
        assert_eq!(
            resolve(Availability::PublicOrUser, &Identity::Anonymous, &[]),
            Ok(Predicate::eq("public", true))
        );
        assert_eq!(
            resolve(Availability::PublicOrUser, &Identity::user(5, "ann"), &[]),
            Ok(Predicate::mk_or(vec![
                Predicate::eq("public", true),
                Predicate::eq("user", 5)
            ]))
        );
    }

    #[test]
    fn test_bare_selector_follows_setting() {
        assert_eq!(
            resolve(Availability::Project, &Identity::user(2, "ann"), &[("project", "1")]),
            Ok(members(2))
        );

        let settings = Settings {
            accept_bare_project_selector: false,
            ..Settings::default()
        };
        let registry = registry_with(note(Availability::Project), settings);
        let metadata = registry.lookup("core", "note").expect("note registered");
        assert_eq!(
            resolve_access(
                &registry,
                metadata,
                &Identity::user(2, "ann"),
                &QueryParams::from_pairs([("project", "1")])
            ),
            Err(AccessError::ProjectSelectorRequired)
        );
    }

    #[test]
    fn test_prerequisites_rechecked_at_request_time() {
        let registry = SchemaRegistry::new(Settings::default()).expect("valid settings");
        let metadata = ModelMetadata::new(ModelKey::new("core", "note"), Availability::PublicOrUser);
        assert_eq!(
            resolve_access(&registry, &metadata, &Identity::Anonymous, &QueryParams::new()),
            Err(AccessError::SchemaConfiguration {
                code: CODE_PUBLIC_OR_USER
            })
        );

        let metadata = ModelMetadata::new(ModelKey::new("core", "note"), Availability::Project)
            .with_field(
                "project",
                FieldSpec::relation(FieldKind::ForeignKey, ModelKey::new("core", "project")),
            );
        assert_eq!(
            resolve_access(
                &registry,
                &metadata,
                &Identity::user(1, "ann"),
                &QueryParams::from_pairs([("project__id", "1")])
            ),
            Err(AccessError::SchemaConfiguration { code: CODE_PROJECT })
        );
    }
}
