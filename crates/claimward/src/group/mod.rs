//! User groups — named, owner-scoped member lists usable as trust targets.
//!
//! A group is identified by `(owner, name)`. Claims reference groups by name
//! only, and only groups owned by the claim's owner are consulted for that
//! claim.

pub mod store;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ClaimError, Result};
use crate::user::User;

pub use store::UserGroupStore;

/// Longest group name accepted.
pub const MAX_GROUP_NAME_LENGTH: usize = 16;

/// A named set of users owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroup {
    pub owner: Uuid,
    pub name: String,
    /// Members in insertion order, without duplicates.
    pub members: Vec<User>,
}

impl UserGroup {
    /// Create an empty group.
    pub fn new(owner: Uuid, name: impl Into<String>) -> Self {
        Self {
            owner,
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn with_members(owner: Uuid, name: impl Into<String>, members: Vec<User>) -> Self {
        let mut group = Self::new(owner, name);
        for member in members {
            group.add_member(member);
        }
        group
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.members.iter().any(|m| &m.uuid == uuid)
    }

    /// Add a member; returns `false` if they were already present.
    pub fn add_member(&mut self, user: User) -> bool {
        if self.contains(&user.uuid) {
            return false;
        }
        self.members.push(user);
        true
    }

    /// Remove a member; returns `false` if they were not present.
    pub fn remove_member(&mut self, uuid: &Uuid) -> bool {
        let before = self.members.len();
        self.members.retain(|m| &m.uuid != uuid);
        self.members.len() != before
    }

    /// Whether this group is the one identified by `(owner, name)`.
    pub fn is(&self, owner: &Uuid, name: &str) -> bool {
        &self.owner == owner && self.name == name
    }
}

/// Check a group name is usable as an identifier.
///
/// # Errors
///
/// Returns `ClaimError::InvalidSyntax` for empty, over-long, or
/// non-alphanumeric names (underscores and hyphens are allowed).
pub fn validate_group_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ClaimError::InvalidSyntax("group name is empty".into()));
    }
    if name.chars().count() > MAX_GROUP_NAME_LENGTH {
        return Err(ClaimError::InvalidSyntax(format!(
            "group name '{name}' is longer than {MAX_GROUP_NAME_LENGTH} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ClaimError::InvalidSyntax(format!(
            "group name '{name}' may only contain letters, digits, '_' and '-'"
        )));
    }
    Ok(())
}
