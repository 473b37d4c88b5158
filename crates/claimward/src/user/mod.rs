//! Users — stable identities and their persisted records.
//!
//! A [`User`] is identified by its UUID; the display name is carried along
//! for lookups and messages but may change between sessions. A
//! [`SavedUser`] is the persisted record created on first join, which is
//! also where the claim-block balance lives.

pub mod listener;

use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use listener::UserListener;

/// A user identity.
///
/// Equality and hashing use only the UUID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Stable unique identifier.
    pub uuid: Uuid,
    /// Last known display name.
    pub name: String,
}

impl User {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
        }
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// How a user's claim listing is ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimListingSort {
    #[default]
    Size,
    World,
    Name,
}

/// Per-user preferences, persisted as a JSON blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Sort order used when listing the user's claims.
    #[serde(default)]
    pub claim_listing_sort: ClaimListingSort,
    /// Whether the user (an operator) is ignoring claim protections.
    #[serde(default)]
    pub ignoring_claims: bool,
    /// Whether the user is told when someone trusts them.
    #[serde(default = "default_true")]
    pub trust_notifications: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            claim_listing_sort: ClaimListingSort::default(),
            ignoring_claims: false,
            trust_notifications: true,
        }
    }
}

/// The persisted record of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedUser {
    pub user: User,
    pub preferences: Preferences,
    pub last_login: DateTime<Utc>,
    /// Claim-block balance; never negative.
    pub claim_blocks: i64,
    pub hours_played: i32,
}

impl SavedUser {
    /// A fresh record for a first-time user.
    pub fn new(user: User, claim_blocks: i64) -> Self {
        Self {
            user,
            preferences: Preferences::default(),
            last_login: crate::time::now(),
            claim_blocks: claim_blocks.max(0),
            hours_played: 0,
        }
    }
}
