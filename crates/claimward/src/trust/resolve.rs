//! Identifier resolution and the access check for trust changes.
//!
//! Resolution order for an identifier:
//! 1. With the group-specifier prefix (and groups enabled): a group owned
//!    by the claim's owner. When removing trust, a group the claim still
//!    trusts but that no longer exists resolves to an empty stand-in.
//! 2. Otherwise a user, by UUID or by name, from storage first and then
//!    from the claim world's name cache.

use uuid::Uuid;

use crate::claim::{Claim, ClaimId, ClaimWorld};
use crate::config::UserGroupSettings;
use crate::error::{ClaimError, Result};
use crate::group::{UserGroup, UserGroupStore};
use crate::storage::Gateway;
use crate::user::User;

use super::level::{Privilege, TrustLevel, TrustLevelRegistry};
use super::trustable::Trustable;

/// The user performing a trust change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user: User,
    /// Operators bypass every access check.
    pub elevated: bool,
}

impl Actor {
    pub fn player(user: User) -> Self {
        Self {
            user,
            elevated: false,
        }
    }

    pub fn operator(user: User) -> Self {
        Self {
            user,
            elevated: true,
        }
    }
}

/// Why an identifier is being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Granting or changing a level.
    Trust,
    /// Removing an entry.
    Untrust,
}

/// Turns raw identifiers into trust targets.
pub struct TrustableResolver<'a> {
    gateway: &'a Gateway,
    groups: &'a UserGroupStore,
    settings: &'a UserGroupSettings,
}

impl<'a> TrustableResolver<'a> {
    pub fn new(
        gateway: &'a Gateway,
        groups: &'a UserGroupStore,
        settings: &'a UserGroupSettings,
    ) -> Self {
        Self {
            gateway,
            groups,
            settings,
        }
    }

    /// Resolve `identifier` in the context of `claim`.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::InvalidSyntax` for an empty identifier, or
    /// `ClaimError::NotFound` if it names no known user or usable group.
    pub fn resolve(
        &self,
        identifier: &str,
        claim: &Claim,
        claim_world: &ClaimWorld,
        purpose: Purpose,
    ) -> Result<Trustable> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ClaimError::InvalidSyntax("no user or group given".into()));
        }
        let prefix = self.settings.group_specifier_prefix.as_str();
        if self.settings.enabled && !prefix.is_empty() {
            if let Some(name) = identifier.strip_prefix(prefix) {
                return self.resolve_group(name, claim, purpose).map(Trustable::Group);
            }
        }
        self.resolve_user(identifier, claim_world).map(Trustable::User)
    }

    fn resolve_group(&self, name: &str, claim: &Claim, purpose: Purpose) -> Result<UserGroup> {
        if name.is_empty() {
            return Err(ClaimError::InvalidSyntax("no group name given".into()));
        }
        let owner = claim.owner.ok_or_else(|| {
            ClaimError::NotFound(format!("group {name} (administrator claims have no groups)"))
        })?;
        if let Some(group) = self.groups.group(&owner, name) {
            return Ok(group);
        }
        // A deleted group can still be untrusted from claims that name it.
        if purpose == Purpose::Untrust && claim.trusted_groups.contains_key(name) {
            log::debug!("Resolved deleted group {name} for removal");
            return Ok(UserGroup::new(owner, name));
        }
        Err(ClaimError::NotFound(format!("group {name}")))
    }

    fn resolve_user(&self, identifier: &str, claim_world: &ClaimWorld) -> Result<User> {
        if let Ok(uuid) = Uuid::parse_str(identifier) {
            return self
                .gateway
                .get_user(&uuid)
                .map(|saved| saved.user)
                .or_else(|| claim_world.cached_user(&uuid))
                .ok_or_else(|| ClaimError::NotFound(format!("user {identifier}")));
        }
        self.gateway
            .get_user_by_name(identifier)
            .map(|saved| saved.user)
            .or_else(|| claim_world.find_user_by_name(identifier))
            .ok_or_else(|| ClaimError::NotFound(format!("user {identifier}")))
    }
}

/// Check that `actor` may apply `purpose` (with `level` when trusting) to
/// `target` in claim `id`.
///
/// Allowed when the actor is elevated, owns the claim or an enclosing one,
/// removes or lowers their own entry, or holds an individual level that
/// grants [`Privilege::ManageTrustees`]. A non-owner manager may not grant a
/// level heavier than their own, nor change an entry heavier than their own.
/// Administrator claims are otherwise managed by elevated actors only.
///
/// # Errors
///
/// Returns `ClaimError::PermissionDenied` when none of the above holds, or
/// `ClaimError::NotFound` for an unknown claim.
pub fn check_access(
    actor: &Actor,
    target: &Trustable,
    purpose: Purpose,
    level: Option<&TrustLevel>,
    claim_world: &ClaimWorld,
    id: ClaimId,
    registry: &TrustLevelRegistry,
) -> Result<()> {
    if actor.elevated {
        return Ok(());
    }
    let path = claim_world.path_to(id).unwrap_or_default();
    let Some(claim) = path.last().copied() else {
        return Err(ClaimError::NotFound(format!("claim {id}")));
    };
    let actor_id = &actor.user.uuid;
    let current = claim.trust_level(target, registry);
    if target.as_user().is_some_and(|user| &user.uuid == actor_id) {
        let lowering = match (purpose, level, current) {
            (Purpose::Untrust, _, _) => true,
            (Purpose::Trust, Some(new), Some(old)) => new.weight < old.weight,
            _ => false,
        };
        if lowering {
            return Ok(());
        }
    }

    if path.iter().any(|c| c.is_admin_claim()) {
        return Err(ClaimError::PermissionDenied(
            "administrator claims can only be managed by operators".into(),
        ));
    }
    if claim_world.is_owner(id, actor_id) {
        return Ok(());
    }

    let denied = || {
        ClaimError::PermissionDenied(format!(
            "{} cannot manage trust in claim {id}",
            actor.user.name
        ))
    };
    let own = claim_world
        .individual_trust_level(id, actor_id, registry)
        .filter(|own| own.satisfies(Privilege::ManageTrustees))
        .ok_or_else(denied)?;
    if current.is_some_and(|current| current.weight > own.weight) {
        return Err(ClaimError::PermissionDenied(format!(
            "{} holds a level above {}'s",
            target.trust_identifier(""),
            actor.user.name
        )));
    }
    if level.is_some_and(|level| level.weight > own.weight) {
        return Err(ClaimError::PermissionDenied(format!(
            "{} cannot grant a level above their own",
            actor.user.name
        )));
    }
    Ok(())
}
