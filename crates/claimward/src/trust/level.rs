//! Trust levels — ordered privilege tiers and their registry.
//!
//! Each [`TrustLevel`] carries a weight that orders it against the others,
//! the [`OperationType`]s it lets a trustee perform inside a claim, and the
//! [`Privilege`]s it lets a trustee exercise over the claim itself.
//!
//! The [`TrustLevelRegistry`] is built once from configuration and rejects
//! any set of levels that is ambiguous (duplicate ids or aliases) or not
//! monotonic (a heavier level missing something a lighter one grants).
//! Because of that load-time check, `satisfies` holds for every level at or
//! above the lightest level that satisfies a privilege.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{ClaimError, Result};

/// A management capability over a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    /// Grant, change, or remove other users' trust.
    ManageTrustees,
    /// Create, resize, or delete child claims.
    ManageChildClaims,
    /// Edit which operation groups apply to the claim.
    ManageOperationGroups,
    /// Ban or unban users from the claim.
    ManageBans,
}

impl Privilege {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManageTrustees => "manage_trustees",
            Self::ManageChildClaims => "manage_child_claims",
            Self::ManageOperationGroups => "manage_operation_groups",
            Self::ManageBans => "manage_bans",
        }
    }
}

/// A category of in-world operation that a trust level can allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    BlockBreak,
    BlockPlace,
    BlockInteract,
    ContainerOpen,
    EntityInteract,
    RedstoneInteract,
    FarmBlockInteract,
    PassiveMobDamage,
    EnderPearlTeleport,
}

/// A named privilege tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLevel {
    /// Stable identifier, stored in claim trust maps.
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// Command names that grant this level (e.g. `trust`, `accesstrust`).
    #[serde(default)]
    pub command_aliases: Vec<String>,
    /// Orders levels; heavier levels grant more.
    pub weight: u32,
    #[serde(default)]
    pub privileges: BTreeSet<Privilege>,
    #[serde(default)]
    pub flags: BTreeSet<OperationType>,
}

impl TrustLevel {
    /// Whether this level grants the given management privilege.
    pub fn satisfies(&self, privilege: Privilege) -> bool {
        self.privileges.contains(&privilege)
    }

    /// Whether this level allows the given in-world operation.
    pub fn allows(&self, operation: OperationType) -> bool {
        self.flags.contains(&operation)
    }

    /// The stock set of levels: access < container < build < manage.
    pub fn defaults() -> Vec<TrustLevel> {
        use OperationType::*;
        let access: BTreeSet<_> = [BlockInteract, EntityInteract, RedstoneInteract, EnderPearlTeleport]
            .into_iter()
            .collect();
        let mut container = access.clone();
        container.insert(ContainerOpen);
        let mut build = container.clone();
        build.extend([BlockBreak, BlockPlace, FarmBlockInteract, PassiveMobDamage]);

        vec![
            TrustLevel {
                id: "access".into(),
                display_name: "Access".into(),
                description: "Use doors, buttons, levers and beds".into(),
                command_aliases: vec!["accesstrust".into()],
                weight: 100,
                privileges: BTreeSet::new(),
                flags: access,
            },
            TrustLevel {
                id: "container".into(),
                display_name: "Container".into(),
                description: "Open chests, furnaces and other containers".into(),
                command_aliases: vec!["containertrust".into()],
                weight: 200,
                privileges: BTreeSet::new(),
                flags: container,
            },
            TrustLevel {
                id: "build".into(),
                display_name: "Build".into(),
                description: "Place and break blocks".into(),
                command_aliases: vec!["trust".into()],
                weight: 300,
                privileges: BTreeSet::new(),
                flags: build.clone(),
            },
            TrustLevel {
                id: "manage".into(),
                display_name: "Manage".into(),
                description: "Manage trustees and child claims".into(),
                command_aliases: vec!["permissiontrust".into(), "managetrust".into()],
                weight: 400,
                privileges: [
                    Privilege::ManageTrustees,
                    Privilege::ManageChildClaims,
                    Privilege::ManageOperationGroups,
                    Privilege::ManageBans,
                ]
                .into_iter()
                .collect(),
                flags: build,
            },
        ]
    }
}

impl std::fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name)
    }
}

/// Validated, weight-ordered set of trust levels.
#[derive(Debug, Clone)]
pub struct TrustLevelRegistry {
    /// Ordered lightest first.
    levels: Vec<TrustLevel>,
    by_id: HashMap<String, usize>,
    /// Lower-cased alias → index.
    by_alias: HashMap<String, usize>,
}

impl TrustLevelRegistry {
    /// Build a registry, rejecting ambiguous or non-monotonic level sets.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::Config` if the set is empty, if two levels share
    /// an id, an alias, or a weight, if an alias names another level's id,
    /// or if a heavier level does not grant everything a lighter one does.
    pub fn new(mut levels: Vec<TrustLevel>) -> Result<Self> {
        if levels.is_empty() {
            return Err(ClaimError::Config("no trust levels configured".into()));
        }
        levels.sort_by_key(|level| level.weight);

        let mut by_id = HashMap::new();
        let mut by_alias = HashMap::new();
        for (index, level) in levels.iter().enumerate() {
            if by_id.insert(level.id.clone(), index).is_some() {
                return Err(ClaimError::Config(format!(
                    "duplicate trust level id '{}'",
                    level.id
                )));
            }
            for alias in &level.command_aliases {
                let key = alias.to_lowercase();
                if let Some(existing) = by_alias.insert(key, index) {
                    return Err(ClaimError::Config(format!(
                        "command alias '{alias}' is used by both '{}' and '{}'",
                        levels[existing].id, level.id
                    )));
                }
            }
        }
        // An alias may not shadow another level's id.
        for (index, level) in levels.iter().enumerate() {
            if let Some(&owner) = by_alias.get(&level.id.to_lowercase()) {
                if owner != index {
                    return Err(ClaimError::Config(format!(
                        "command alias '{}' of '{}' shadows the id of '{}'",
                        level.id, levels[owner].id, level.id
                    )));
                }
            }
        }

        for pair in levels.windows(2) {
            let (lower, higher) = (&pair[0], &pair[1]);
            if lower.weight == higher.weight {
                return Err(ClaimError::Config(format!(
                    "trust levels '{}' and '{}' share weight {}",
                    lower.id, higher.id, lower.weight
                )));
            }
            if !higher.privileges.is_superset(&lower.privileges)
                || !higher.flags.is_superset(&lower.flags)
            {
                return Err(ClaimError::Config(format!(
                    "trust level '{}' must grant everything '{}' grants",
                    higher.id, lower.id
                )));
            }
        }

        Ok(Self {
            levels,
            by_id,
            by_alias,
        })
    }

    /// Look up a level by its stable identifier.
    pub fn by_id(&self, id: &str) -> Option<&TrustLevel> {
        self.by_id.get(id).map(|&i| &self.levels[i])
    }

    /// Look up a level by one of its command aliases (case-insensitive).
    pub fn by_alias(&self, alias: &str) -> Option<&TrustLevel> {
        self.by_alias
            .get(&alias.to_lowercase())
            .map(|&i| &self.levels[i])
    }

    /// The lightest level that grants `privilege`, if any does.
    pub fn lowest_satisfying(&self, privilege: Privilege) -> Option<&TrustLevel> {
        self.levels.iter().find(|level| level.satisfies(privilege))
    }

    /// All levels, lightest first.
    pub fn levels(&self) -> &[TrustLevel] {
        &self.levels
    }

    /// The heaviest level.
    pub fn highest(&self) -> &TrustLevel {
        // `new` rejects empty level sets.
        &self.levels[self.levels.len() - 1]
    }
}

impl Default for TrustLevelRegistry {
    fn default() -> Self {
        let levels = TrustLevel::defaults();
        let by_id = levels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.id.clone(), i))
            .collect();
        let by_alias = levels
            .iter()
            .enumerate()
            .flat_map(|(i, l)| l.command_aliases.iter().map(move |a| (a.to_lowercase(), i)))
            .collect();
        Self {
            levels,
            by_id,
            by_alias,
        }
    }
}
