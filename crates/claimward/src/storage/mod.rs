//! Storage layer for users, user groups, and claim worlds.
//!
//! # Tables
//!
//! ```text
//! user_data        (uuid PK, username, last_login, claim_blocks, hours_played, preferences)
//! user_group_data  (uuid, name, members, PK(uuid, name))
//! claim_data       (id PK, server_name, world_uuid, world_name, world_environment, data)
//! meta_data        (schema_version)
//! ```
//!
//! # Modules
//!
//! - [`codec`] — JSON encoding of preferences, member lists, and claim worlds.
//! - [`schema`] — table definitions and ordered migrations.
//! - [`sqlite`] — [`SqliteDatabase`], the `rusqlite` engine.
//! - [`gateway`] — [`Gateway`], the boundary that turns engine failures
//!   into logged, safe results.

pub mod codec;
pub mod gateway;
pub mod schema;
pub mod sqlite;

use uuid::Uuid;

use crate::claim::{ClaimWorld, ServerWorld, World};
use crate::config::TableNames;
use crate::error::Result;
use crate::group::UserGroup;
use crate::user::SavedUser;

pub use gateway::Gateway;
pub use sqlite::SqliteDatabase;

/// A storage engine.
///
/// Every write is a single statement or transaction, so a failed write
/// leaves previously persisted state untouched. Engines report failures as
/// errors; [`Gateway`] decides how callers see them.
pub trait Database: Send + Sync {
    /// Table names the engine's statements are formatted with.
    fn table_names(&self) -> &TableNames;

    /// Run a sequence of statements as one transaction.
    fn execute_script(&self, statements: &[String]) -> Result<()>;

    /// Whether the schema has been created.
    fn is_created(&self) -> bool;

    /// The stored schema version, or `None` if no version row exists.
    fn schema_version(&self) -> Result<Option<i32>>;

    /// Record the schema version, inserting the row if it is missing.
    fn set_schema_version(&self, version: i32) -> Result<()>;

    // ── Users ────────────────────────────────────────────────────────────────

    fn get_user(&self, uuid: &Uuid) -> Result<Option<SavedUser>>;

    /// Look a user up by name, exactly as stored.
    fn get_user_by_name(&self, name: &str) -> Result<Option<SavedUser>>;

    /// Users whose last login is at least `days` days before now.
    fn get_inactive_users(&self, days: u32) -> Result<Vec<SavedUser>>;

    fn create_user(&self, user: &SavedUser) -> Result<()>;

    fn update_user(&self, user: &SavedUser) -> Result<()>;

    // ── User groups ──────────────────────────────────────────────────────────

    fn get_user_groups(&self, owner: &Uuid) -> Result<Vec<UserGroup>>;

    fn get_all_user_groups(&self) -> Result<Vec<UserGroup>>;

    fn add_user_group(&self, group: &UserGroup) -> Result<()>;

    /// Replace the group stored as `(owner, name)` with `group`.
    fn update_user_group(&self, owner: &Uuid, name: &str, group: &UserGroup) -> Result<()>;

    fn delete_user_group(&self, owner: &Uuid, name: &str) -> Result<()>;

    // ── Claim worlds ─────────────────────────────────────────────────────────

    fn get_claim_world(&self, id: i64) -> Result<Option<(ServerWorld, ClaimWorld)>>;

    /// Every claim world hosted by `server`.
    fn get_claim_worlds(&self, server: &str) -> Result<Vec<(World, ClaimWorld)>>;

    fn get_all_claim_worlds(&self) -> Result<Vec<(ServerWorld, ClaimWorld)>>;

    /// Persist a new, empty claim world and return it with its storage id.
    fn create_claim_world(&self, server: &str, world: &World) -> Result<ClaimWorld>;

    /// Replace the stored claims of `world` wholesale.
    fn update_claim_world(&self, world: &ClaimWorld) -> Result<()>;

    fn delete_claim_world(&self, id: i64) -> Result<()>;
}
