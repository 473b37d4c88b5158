//! Claims — owned regions with per-user and per-group trust.
//!
//! A [`Claim`] holds trust maps keyed by identifier only (user UUID or
//! group name) pointing at a trust level id; it never owns the users or
//! groups it references. Child claims nest inside their parent's region.
//!
//! The claims of one physical world live in a [`ClaimWorld`], and the loaded
//! claim worlds of a server live in a [`ClaimWorldStore`].

pub mod region;
pub mod store;
pub mod world;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ClaimError, Result};
use crate::group::UserGroup;
use crate::trust::{TrustLevel, TrustLevelRegistry, Trustable};

pub use region::{Position, Region};
pub use store::ClaimWorldStore;
pub use world::{ClaimWorld, ServerWorld, World};

/// Identifier of a claim, unique within its claim world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClaimId(pub u64);

impl std::fmt::Display for ClaimId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A claimed region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    /// `None` marks an administrator claim.
    pub owner: Option<Uuid>,
    pub region: Region,
    /// User UUID → trust level id. Never contains the owner.
    #[serde(default)]
    pub trusted_users: HashMap<Uuid, String>,
    /// Group name (owned by the claim owner) → trust level id.
    #[serde(default)]
    pub trusted_groups: HashMap<String, String>,
    #[serde(default)]
    pub children: Vec<Claim>,
    /// Whether a child claim falls back to its parent's trust.
    #[serde(default = "default_true")]
    pub inherit_parent: bool,
}

fn default_true() -> bool {
    true
}

impl Claim {
    pub(crate) fn new(id: ClaimId, owner: Option<Uuid>, region: Region) -> Self {
        Self {
            id,
            owner,
            region,
            trusted_users: HashMap::new(),
            trusted_groups: HashMap::new(),
            children: Vec::new(),
            inherit_parent: true,
        }
    }

    pub fn is_admin_claim(&self) -> bool {
        self.owner.is_none()
    }

    pub fn is_owner(&self, uuid: &Uuid) -> bool {
        self.owner.as_ref() == Some(uuid)
    }

    pub fn contains(&self, position: &Position) -> bool {
        self.region.contains(position)
    }

    /// The most deeply nested claim (this one or a descendant) containing
    /// `position`.
    pub fn innermost_at(&self, position: &Position) -> Option<&Claim> {
        if !self.contains(position) {
            return None;
        }
        self.children
            .iter()
            .find_map(|child| child.innermost_at(position))
            .or(Some(self))
    }

    /// This claim or a descendant with the given id.
    pub fn find(&self, id: ClaimId) -> Option<&Claim> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    pub fn find_mut(&mut self, id: ClaimId) -> Option<&mut Claim> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(id))
    }

    /// Grant `level` to `trustable`, replacing any existing entry.
    ///
    /// Setting the same level again leaves the maps unchanged.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::OwnerNotTrustable` if `trustable` is the owner.
    pub fn set_trust_level(&mut self, trustable: &Trustable, level: &TrustLevel) -> Result<()> {
        match trustable {
            Trustable::User(user) => {
                if self.is_owner(&user.uuid) {
                    return Err(ClaimError::OwnerNotTrustable(user.name.clone()));
                }
                self.trusted_users.insert(user.uuid, level.id.clone());
            }
            Trustable::Group(group) => {
                self.trusted_groups
                    .insert(group.name.clone(), level.id.clone());
            }
        }
        Ok(())
    }

    /// Remove `trustable`'s entry; returns `false` if there was none.
    pub fn remove_trust(&mut self, trustable: &Trustable) -> bool {
        match trustable {
            Trustable::User(user) => self.trusted_users.remove(&user.uuid).is_some(),
            Trustable::Group(group) => self.trusted_groups.remove(&group.name).is_some(),
        }
    }

    /// The trust level id held directly by `trustable` in this claim.
    pub fn trust_level_id(&self, trustable: &Trustable) -> Option<&str> {
        match trustable {
            Trustable::User(user) => self.trusted_users.get(&user.uuid),
            Trustable::Group(group) => self.trusted_groups.get(&group.name),
        }
        .map(String::as_str)
    }

    /// The trust level held directly by `trustable` in this claim.
    ///
    /// Entries naming a level that is no longer configured resolve to `None`.
    pub fn trust_level<'r>(
        &self,
        trustable: &Trustable,
        registry: &'r TrustLevelRegistry,
    ) -> Option<&'r TrustLevel> {
        self.trust_level_id(trustable)
            .and_then(|id| registry.by_id(id))
    }

    /// The level granted to a user individually.
    pub fn user_trust_level<'r>(
        &self,
        uuid: &Uuid,
        registry: &'r TrustLevelRegistry,
    ) -> Option<&'r TrustLevel> {
        self.trusted_users
            .get(uuid)
            .and_then(|id| registry.by_id(id))
    }

    /// The heaviest level granted to a user through a trusted group.
    ///
    /// Only groups owned by this claim's owner count.
    pub fn group_trust_level<'r>(
        &self,
        uuid: &Uuid,
        groups: &[UserGroup],
        registry: &'r TrustLevelRegistry,
    ) -> Option<&'r TrustLevel> {
        let owner = self.owner?;
        groups
            .iter()
            .filter(|group| group.owner == owner && group.contains(uuid))
            .filter_map(|group| self.trusted_groups.get(&group.name))
            .filter_map(|id| registry.by_id(id))
            .max_by_key(|level| level.weight)
    }

    /// The level a user holds here without looking at parents: group trust
    /// first, then individual trust.
    pub fn direct_trust_level<'r>(
        &self,
        uuid: &Uuid,
        groups: &[UserGroup],
        registry: &'r TrustLevelRegistry,
    ) -> Option<&'r TrustLevel> {
        self.group_trust_level(uuid, groups, registry)
            .or_else(|| self.user_trust_level(uuid, registry))
    }
}
