//! Claim worlds — every claim in one physical world, indexed for lookup.
//!
//! Top-level claims are held by id and indexed by the 16×16 chunks they
//! touch, so a point lookup only inspects the handful of claims sharing the
//! point's chunk. The chunk index is derived state: it is not serialized and
//! is rebuilt whenever a world is decoded.
//!
//! Trust resolution that needs a claim's ancestry (parent fallback and
//! ownership of enclosing claims) lives here rather than on [`Claim`],
//! because a child does not know its parent.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ClaimError, Result};
use crate::group::UserGroup;
use crate::trust::{OperationType, Privilege, TrustLevel, TrustLevelRegistry, Trustable};
use crate::user::User;

use super::region::{Position, Region};
use super::{Claim, ClaimId};

// ── World identity ───────────────────────────────────────────────────────────

/// A physical world on a server.
///
/// Equality and hashing use only the UUID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    pub name: String,
    pub uuid: Uuid,
    /// Dimension type, e.g. `normal`, `nether`, `the_end`.
    pub environment: String,
}

impl World {
    pub fn new(name: impl Into<String>, uuid: Uuid, environment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid,
            environment: environment.into(),
        }
    }
}

impl PartialEq for World {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for World {}

impl Hash for World {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

/// A world qualified by the server hosting it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerWorld {
    pub server: String,
    pub world: World,
}

// ── ClaimWorld ───────────────────────────────────────────────────────────────

/// Serialized shape of a [`ClaimWorld`].
#[derive(Clone, Serialize, Deserialize)]
struct StoredClaimWorld {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    claims: Vec<Claim>,
    #[serde(default)]
    user_cache: HashMap<Uuid, String>,
    #[serde(default)]
    next_claim_id: u64,
}

/// The claims of one physical world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredClaimWorld", into = "StoredClaimWorld")]
pub struct ClaimWorld {
    /// Storage id, assigned once by the database.
    id: i64,
    claims: BTreeMap<ClaimId, Claim>,
    /// Last known names of users referenced by this world's claims.
    user_cache: HashMap<Uuid, String>,
    next_claim_id: u64,
    /// Chunk → ids of top-level claims touching it.
    chunk_index: HashMap<(i32, i32), BTreeSet<ClaimId>>,
}

impl From<StoredClaimWorld> for ClaimWorld {
    fn from(stored: StoredClaimWorld) -> Self {
        let mut world = ClaimWorld {
            id: stored.id,
            claims: BTreeMap::new(),
            user_cache: stored.user_cache,
            next_claim_id: stored.next_claim_id,
            chunk_index: HashMap::new(),
        };
        for claim in stored.claims {
            world.index(&claim);
            world.claims.insert(claim.id, claim);
        }
        // Never hand out an id already in use, even if the counter was lost.
        let highest = world.claims.values().map(max_id).max().unwrap_or(0);
        world.next_claim_id = world.next_claim_id.max(highest + 1);
        world
    }
}

impl From<ClaimWorld> for StoredClaimWorld {
    fn from(world: ClaimWorld) -> Self {
        StoredClaimWorld {
            id: world.id,
            claims: world.claims.into_values().collect(),
            user_cache: world.user_cache,
            next_claim_id: world.next_claim_id,
        }
    }
}

fn max_id(claim: &Claim) -> u64 {
    claim
        .children
        .iter()
        .map(max_id)
        .max()
        .unwrap_or(0)
        .max(claim.id.0)
}

impl Default for ClaimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimWorld {
    /// An empty world with no storage id yet.
    pub fn new() -> Self {
        Self {
            id: 0,
            claims: BTreeMap::new(),
            user_cache: HashMap::new(),
            next_claim_id: 1,
            chunk_index: HashMap::new(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn allocate_id(&mut self) -> ClaimId {
        let id = ClaimId(self.next_claim_id);
        self.next_claim_id += 1;
        id
    }

    fn index(&mut self, claim: &Claim) {
        for chunk in claim.region.chunks() {
            self.chunk_index.entry(chunk).or_default().insert(claim.id);
        }
    }

    fn unindex(&mut self, claim: &Claim) {
        for chunk in claim.region.chunks() {
            if let Some(ids) = self.chunk_index.get_mut(&chunk) {
                ids.remove(&claim.id);
                if ids.is_empty() {
                    self.chunk_index.remove(&chunk);
                }
            }
        }
    }

    // ── Claim creation and removal ───────────────────────────────────────────

    /// Create a top-level claim.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::RegionConflict` if the region overlaps an
    /// existing top-level claim.
    pub fn create_claim(&mut self, owner: Option<Uuid>, region: Region) -> Result<ClaimId> {
        if let Some(existing) = self.claims_overlapping(&region).first() {
            return Err(ClaimError::RegionConflict(format!(
                "{region} overlaps claim {}",
                existing.id
            )));
        }
        let claim = Claim::new(self.allocate_id(), owner, region);
        let id = claim.id;
        self.index(&claim);
        self.claims.insert(id, claim);
        Ok(id)
    }

    /// Create a child claim inside `parent`, owned by the parent's owner.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::NotFound` if the parent does not exist, or
    /// `ClaimError::RegionConflict` if the region is not inside the parent
    /// or overlaps one of the parent's other children.
    pub fn create_child_claim(&mut self, parent: ClaimId, region: Region) -> Result<ClaimId> {
        let id = ClaimId(self.next_claim_id);
        let parent_claim = self
            .claim_mut(parent)
            .ok_or_else(|| ClaimError::NotFound(format!("claim {parent}")))?;
        if !parent_claim.region.encloses(&region) {
            return Err(ClaimError::RegionConflict(format!(
                "{region} is not inside parent claim {parent}"
            )));
        }
        if let Some(sibling) = parent_claim
            .children
            .iter()
            .find(|child| child.region.overlaps(&region))
        {
            return Err(ClaimError::RegionConflict(format!(
                "{region} overlaps child claim {}",
                sibling.id
            )));
        }
        let child = Claim::new(id, parent_claim.owner, region);
        parent_claim.children.push(child);
        self.next_claim_id += 1;
        Ok(id)
    }

    /// Remove a claim (and its children) by id.
    pub fn remove_claim(&mut self, id: ClaimId) -> Option<Claim> {
        if let Some(claim) = self.claims.remove(&id) {
            self.unindex(&claim);
            return Some(claim);
        }
        fn remove_from(parent: &mut Claim, id: ClaimId) -> Option<Claim> {
            if let Some(pos) = parent.children.iter().position(|c| c.id == id) {
                return Some(parent.children.remove(pos));
            }
            parent
                .children
                .iter_mut()
                .find_map(|child| remove_from(child, id))
        }
        self.claims
            .values_mut()
            .find_map(|claim| remove_from(claim, id))
    }

    // ── Lookup ───────────────────────────────────────────────────────────────

    /// A claim (top-level or nested) by id.
    pub fn claim(&self, id: ClaimId) -> Option<&Claim> {
        self.claims.values().find_map(|claim| claim.find(id))
    }

    pub fn claim_mut(&mut self, id: ClaimId) -> Option<&mut Claim> {
        self.claims.values_mut().find_map(|claim| claim.find_mut(id))
    }

    /// The most specific claim containing `position`.
    ///
    /// When a parent and a child both contain the point, the child wins.
    pub fn claim_at(&self, position: &Position) -> Option<&Claim> {
        self.chunk_index
            .get(&position.chunk())?
            .iter()
            .filter_map(|id| self.claims.get(id))
            .find_map(|claim| claim.innermost_at(position))
    }

    /// Top-level claims overlapping `region`, ordered by id.
    pub fn claims_overlapping(&self, region: &Region) -> Vec<&Claim> {
        let ids: BTreeSet<ClaimId> = region
            .chunks()
            .filter_map(|chunk| self.chunk_index.get(&chunk))
            .flatten()
            .copied()
            .collect();
        ids.iter()
            .filter_map(|id| self.claims.get(id))
            .filter(|claim| claim.region.overlaps(region))
            .collect()
    }

    /// Top-level claims owned by `owner`.
    pub fn claims_owned_by(&self, owner: &Uuid) -> Vec<&Claim> {
        self.claims
            .values()
            .filter(|claim| claim.is_owner(owner))
            .collect()
    }

    /// Top-level claims, ordered by id.
    pub fn claims(&self) -> impl Iterator<Item = &Claim> {
        self.claims.values()
    }

    pub fn claim_count(&self) -> usize {
        self.claims.len()
    }

    /// The chain of claims from the top-level ancestor down to `id`.
    pub fn path_to(&self, id: ClaimId) -> Option<Vec<&Claim>> {
        fn walk<'a>(claim: &'a Claim, id: ClaimId, path: &mut Vec<&'a Claim>) -> bool {
            path.push(claim);
            if claim.id == id || claim.children.iter().any(|c| walk(c, id, path)) {
                return true;
            }
            path.pop();
            false
        }
        let mut path = Vec::new();
        let found = self
            .claims
            .values()
            .any(|claim| walk(claim, id, &mut path));
        found.then_some(path)
    }

    // ── User name cache ──────────────────────────────────────────────────────

    /// Remember a user's current name.
    pub fn cache_user(&mut self, user: &User) {
        self.user_cache.insert(user.uuid, user.name.clone());
    }

    pub fn user_name(&self, uuid: &Uuid) -> Option<&str> {
        self.user_cache.get(uuid).map(String::as_str)
    }

    pub fn cached_user(&self, uuid: &Uuid) -> Option<User> {
        self.user_name(uuid).map(|name| User::new(*uuid, name))
    }

    /// Find a cached user by name; an exact match beats a case-insensitive one.
    pub fn find_user_by_name(&self, name: &str) -> Option<User> {
        self.user_cache
            .iter()
            .find(|(_, cached)| cached.as_str() == name)
            .or_else(|| {
                self.user_cache
                    .iter()
                    .find(|(_, cached)| cached.eq_ignore_ascii_case(name))
            })
            .map(|(uuid, cached)| User::new(*uuid, cached.clone()))
    }

    // ── Trust ────────────────────────────────────────────────────────────────

    /// Grant `level` to `trustable` in claim `id`.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::NotFound` for an unknown claim, or
    /// `ClaimError::OwnerNotTrustable` when targeting the owner of the claim
    /// or of any claim enclosing it.
    pub fn set_trust_level(
        &mut self,
        id: ClaimId,
        trustable: &Trustable,
        level: &TrustLevel,
    ) -> Result<()> {
        if let Trustable::User(user) = trustable {
            if self.is_owner(id, &user.uuid) {
                return Err(ClaimError::OwnerNotTrustable(user.name.clone()));
            }
            self.cache_user(user);
        }
        self.claim_mut(id)
            .ok_or_else(|| ClaimError::NotFound(format!("claim {id}")))?
            .set_trust_level(trustable, level)
    }

    /// Remove `trustable`'s entry from claim `id`.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::NotFound` for an unknown claim, or
    /// `ClaimError::NotTrusted` if there was no entry to remove.
    pub fn remove_trust(&mut self, id: ClaimId, trustable: &Trustable, group_prefix: &str) -> Result<()> {
        let claim = self
            .claim_mut(id)
            .ok_or_else(|| ClaimError::NotFound(format!("claim {id}")))?;
        if !claim.remove_trust(trustable) {
            return Err(ClaimError::NotTrusted(
                trustable.trust_identifier(group_prefix),
            ));
        }
        Ok(())
    }

    /// Whether `uuid` owns claim `id` or any claim enclosing it.
    pub fn is_owner(&self, id: ClaimId, uuid: &Uuid) -> bool {
        self.path_to(id)
            .map(|path| path.iter().any(|claim| claim.is_owner(uuid)))
            .unwrap_or(false)
    }

    /// The level a user holds in claim `id`, falling back through parents
    /// for children that inherit.
    ///
    /// Owners are not given a level; check [`ClaimWorld::is_owner`] first.
    pub fn effective_trust_level<'r>(
        &self,
        id: ClaimId,
        uuid: &Uuid,
        groups: &[UserGroup],
        registry: &'r TrustLevelRegistry,
    ) -> Option<&'r TrustLevel> {
        self.resolve_up(id, |claim| claim.direct_trust_level(uuid, groups, registry))
    }

    /// The level a user holds individually in claim `id`, falling back
    /// through parents for children that inherit.
    pub fn individual_trust_level<'r>(
        &self,
        id: ClaimId,
        uuid: &Uuid,
        registry: &'r TrustLevelRegistry,
    ) -> Option<&'r TrustLevel> {
        self.resolve_up(id, |claim| claim.user_trust_level(uuid, registry))
    }

    fn resolve_up<'r>(
        &self,
        id: ClaimId,
        lookup: impl Fn(&Claim) -> Option<&'r TrustLevel>,
    ) -> Option<&'r TrustLevel> {
        let path = self.path_to(id)?;
        for claim in path.iter().rev() {
            if let Some(level) = lookup(claim) {
                return Some(level);
            }
            if !claim.inherit_parent {
                break;
            }
        }
        None
    }

    /// Whether a user may perform `operation` inside claim `id`.
    pub fn is_operation_allowed(
        &self,
        id: ClaimId,
        uuid: &Uuid,
        operation: OperationType,
        groups: &[UserGroup],
        registry: &TrustLevelRegistry,
    ) -> bool {
        self.is_owner(id, uuid)
            || self
                .effective_trust_level(id, uuid, groups, registry)
                .is_some_and(|level| level.allows(operation))
    }

    /// Whether a user may exercise `privilege` over claim `id`.
    ///
    /// Management privileges are delegated through individual trust only;
    /// group trust unlocks in-world operations but not privileges.
    pub fn is_privilege_allowed(
        &self,
        id: ClaimId,
        uuid: &Uuid,
        privilege: Privilege,
        registry: &TrustLevelRegistry,
    ) -> bool {
        self.is_owner(id, uuid)
            || self
                .individual_trust_level(id, uuid, registry)
                .is_some_and(|level| level.satisfies(privilege))
    }
}
