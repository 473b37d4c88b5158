//! Trust changes applied to loaded claim worlds.
//!
//! Resolution, the access check, the mutation and the write all happen
//! inside one [`ClaimWorldStore::with_world_mut`] call, so a trust change
//! is atomic with respect to every other edit of the same world.

use std::sync::Arc;

use uuid::Uuid;

use crate::claim::{ClaimId, ClaimWorld, ClaimWorldStore, World};
use crate::config::UserGroupSettings;
use crate::error::{ClaimError, Result};
use crate::group::UserGroupStore;
use crate::storage::Gateway;

use super::level::{OperationType, Privilege, TrustLevel, TrustLevelRegistry};
use super::resolve::{check_access, Actor, Purpose, TrustableResolver};
use super::trustable::Trustable;

/// Applies and answers trust questions for one server's claim worlds.
pub struct TrustManager {
    registry: Arc<TrustLevelRegistry>,
    claim_worlds: Arc<ClaimWorldStore>,
    groups: Arc<UserGroupStore>,
    gateway: Gateway,
    group_settings: UserGroupSettings,
}

impl TrustManager {
    pub fn new(
        registry: Arc<TrustLevelRegistry>,
        claim_worlds: Arc<ClaimWorldStore>,
        groups: Arc<UserGroupStore>,
        gateway: Gateway,
        group_settings: UserGroupSettings,
    ) -> Self {
        Self {
            registry,
            claim_worlds,
            groups,
            gateway,
            group_settings,
        }
    }

    pub fn registry(&self) -> &TrustLevelRegistry {
        &self.registry
    }

    pub fn group_prefix(&self) -> &str {
        &self.group_settings.group_specifier_prefix
    }

    fn resolver(&self) -> TrustableResolver<'_> {
        TrustableResolver::new(&self.gateway, &self.groups, &self.group_settings)
    }

    /// Grant `level` to whatever `identifier` names in claim `id`.
    ///
    /// Setting a level a trustable already holds rewrites the same state
    /// and still persists and notifies.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::InvalidSyntax`, `ClaimError::NotFound`,
    /// `ClaimError::PermissionDenied` or `ClaimError::OwnerNotTrustable`
    /// without changing anything, or `ClaimError::StorageFailure` if the
    /// write fails (the world is then left as it was).
    pub fn set_trust_level(
        &self,
        actor: &Actor,
        identifier: &str,
        world: &World,
        id: ClaimId,
        level: &TrustLevel,
    ) -> Result<Trustable> {
        self.claim_worlds.with_world_mut(world, |claim_world| {
            let target = self.authorize(actor, identifier, claim_world, id, Purpose::Trust, Some(level))?;
            claim_world.set_trust_level(id, &target, level)?;
            log::info!(
                "{} set {} to {} in claim {id}",
                actor.user.name,
                target.trust_identifier(self.group_prefix()),
                level.id
            );
            Ok(target)
        })
    }

    /// Remove whatever `identifier` names from claim `id`.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::NotTrusted` if there was no entry, the
    /// resolution and access errors of [`TrustManager::set_trust_level`],
    /// or `ClaimError::StorageFailure` if the write fails.
    pub fn remove_trust(
        &self,
        actor: &Actor,
        identifier: &str,
        world: &World,
        id: ClaimId,
    ) -> Result<Trustable> {
        self.claim_worlds.with_world_mut(world, |claim_world| {
            let target = self.authorize(actor, identifier, claim_world, id, Purpose::Untrust, None)?;
            claim_world.remove_trust(id, &target, self.group_prefix())?;
            log::info!(
                "{} removed {} from claim {id}",
                actor.user.name,
                target.trust_identifier(self.group_prefix())
            );
            Ok(target)
        })
    }

    fn authorize(
        &self,
        actor: &Actor,
        identifier: &str,
        claim_world: &ClaimWorld,
        id: ClaimId,
        purpose: Purpose,
        level: Option<&TrustLevel>,
    ) -> Result<Trustable> {
        let claim = claim_world
            .claim(id)
            .ok_or_else(|| ClaimError::NotFound(format!("claim {id}")))?;
        let target = self.resolver().resolve(identifier, claim, claim_world, purpose)?;
        check_access(actor, &target, purpose, level, claim_world, id, &self.registry)?;
        Ok(target)
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// The level a trustable holds directly in claim `id`.
    pub fn trust_level(&self, world: &World, id: ClaimId, trustable: &Trustable) -> Option<TrustLevel> {
        self.claim_worlds
            .read(world, |claim_world| {
                claim_world
                    .claim(id)
                    .and_then(|claim| claim.trust_level(trustable, &self.registry))
                    .cloned()
            })
            .flatten()
    }

    /// The level a user effectively holds in claim `id`, through groups,
    /// individual trust, or an inheriting parent.
    pub fn effective_trust_level(&self, world: &World, id: ClaimId, uuid: &Uuid) -> Option<TrustLevel> {
        let groups = self.groups.groups_containing(uuid);
        self.claim_worlds
            .read(world, |claim_world| {
                claim_world
                    .effective_trust_level(id, uuid, &groups, &self.registry)
                    .cloned()
            })
            .flatten()
    }

    pub fn is_operation_allowed(
        &self,
        world: &World,
        id: ClaimId,
        uuid: &Uuid,
        operation: OperationType,
    ) -> bool {
        let groups = self.groups.groups_containing(uuid);
        self.claim_worlds
            .read(world, |claim_world| {
                claim_world.is_operation_allowed(id, uuid, operation, &groups, &self.registry)
            })
            .unwrap_or(false)
    }

    pub fn is_privilege_allowed(
        &self,
        world: &World,
        id: ClaimId,
        uuid: &Uuid,
        privilege: Privilege,
    ) -> bool {
        self.claim_worlds
            .read(world, |claim_world| {
                claim_world.is_privilege_allowed(id, uuid, privilege, &self.registry)
            })
            .unwrap_or(false)
    }
}
