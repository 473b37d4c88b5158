//! Claimward — land-claim authorization for multiplayer servers.
//!
//! Provides tiered, weighted trust levels for claims and their child
//! claims, owner-defined user groups, a per-user claim-block ledger, and
//! SQLite persistence shared by every server in a network, with change
//! notifications so peer servers stay in step.

pub mod actions;
pub mod claim;
pub mod config;
pub mod context;
pub mod error;
pub mod group;
pub mod ledger;
pub mod storage;
pub mod sync;
pub mod task;
pub mod time;
pub mod trust;
pub mod user;

// Re-export primary types
pub use config::Settings;
pub use context::{ClaimContext, ClaimContextBuilder};
pub use error::{ClaimError, Result};

// Re-export claim types
pub use claim::{Claim, ClaimId, ClaimWorld, ClaimWorldStore, Position, Region, ServerWorld, World};

// Re-export trust types
pub use trust::{
    Actor, OperationType, Privilege, Purpose, TrustLevel, TrustLevelRegistry, TrustManager,
    Trustable,
};

// Re-export user, group and ledger types
pub use group::{UserGroup, UserGroupStore};
pub use ledger::ClaimBlockLedger;
pub use user::{Preferences, SavedUser, User, UserListener};

// Re-export storage and sync types
pub use storage::{Database, Gateway, SqliteDatabase};
pub use sync::{Broker, LocalBroker, Publisher, SyncHandler, SyncMessage, SyncPayload};
