//! The persistence boundary.
//!
//! [`Gateway`] wraps a [`Database`] engine and applies the failure policy
//! callers rely on:
//!
//! - point reads log and return `None` / an empty collection, except the
//!   claim-world read, which returns the error so a reload can keep the
//!   live world;
//! - listings log and return an empty result on storage failures, but a
//!   blob that no longer decodes is returned as
//!   `ClaimError::SchemaInconsistency`;
//! - writes log and return the error, leaving persisted state unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::claim::{ClaimWorld, ServerWorld, World};
use crate::config::ClaimSettings;
use crate::error::{ClaimError, Result};
use crate::group::UserGroup;
use crate::user::SavedUser;

use super::schema::{create_statements, pending_migrations, CURRENT_SCHEMA_VERSION};
use super::Database;

/// Failure-policy boundary in front of a storage engine.
#[derive(Clone)]
pub struct Gateway {
    db: Arc<dyn Database>,
    claims: ClaimSettings,
}

impl Gateway {
    pub fn new(db: Arc<dyn Database>, claims: ClaimSettings) -> Self {
        Self { db, claims }
    }

    pub fn claim_settings(&self) -> &ClaimSettings {
        &self.claims
    }

    // ── Failure policy ───────────────────────────────────────────────────────

    fn read<T>(&self, what: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                log::error!("Failed to {what}: {e}");
                None
            }
        }
    }

    fn listing<T: Default>(&self, what: &str, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e @ ClaimError::SchemaInconsistency(_)) => {
                log::error!("Failed to {what}: {e}");
                Err(e)
            }
            Err(e) => {
                log::error!("Failed to {what}: {e}");
                Ok(T::default())
            }
        }
    }

    fn write<T>(&self, what: &str, result: Result<T>) -> Result<T> {
        result.map_err(|e| {
            log::error!("Failed to {what}: {e}");
            e
        })
    }

    // ── Schema ───────────────────────────────────────────────────────────────

    pub fn is_created(&self) -> bool {
        self.db.is_created()
    }

    /// The stored schema version; `None` when absent or unreadable.
    pub fn schema_version(&self) -> Option<i32> {
        match self.db.schema_version() {
            Ok(version) => version,
            Err(e) => {
                log::warn!("Failed to read schema version: {e}");
                None
            }
        }
    }

    /// Create the schema, or migrate an existing one to the current version.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::StorageFailure` if a statement fails, or
    /// `ClaimError::SchemaInconsistency` if the database was written by a
    /// newer schema.
    pub fn initialize(&self) -> Result<()> {
        let tables = self.db.table_names();
        if !self.db.is_created() {
            log::info!("Creating database schema at version {CURRENT_SCHEMA_VERSION}");
            self.write(
                "create database schema",
                self.db.execute_script(&create_statements(tables)),
            )?;
            return self.write(
                "record schema version",
                self.db.set_schema_version(CURRENT_SCHEMA_VERSION),
            );
        }

        let current = self.schema_version().unwrap_or_else(|| {
            log::warn!("Database has no schema version; assuming version 1");
            1
        });
        if current > CURRENT_SCHEMA_VERSION {
            return Err(ClaimError::SchemaInconsistency(format!(
                "database schema version {current} is newer than supported version {CURRENT_SCHEMA_VERSION}"
            )));
        }
        for migration in pending_migrations(current) {
            log::info!(
                "Migrating database to schema version {}: {}",
                migration.version,
                migration.description
            );
            self.write(
                "apply migration",
                self.db.execute_script(&migration.statements(tables)),
            )?;
            self.write(
                "record schema version",
                self.db.set_schema_version(migration.version),
            )?;
        }
        Ok(())
    }

    // ── Users ────────────────────────────────────────────────────────────────

    pub fn get_user(&self, uuid: &Uuid) -> Option<SavedUser> {
        self.read("load user", self.db.get_user(uuid)).flatten()
    }

    pub fn get_user_by_name(&self, name: &str) -> Option<SavedUser> {
        self.read("load user by name", self.db.get_user_by_name(name))
            .flatten()
    }

    pub fn get_inactive_users(&self, days: u32) -> Vec<SavedUser> {
        self.read("list inactive users", self.db.get_inactive_users(days))
            .unwrap_or_default()
    }

    pub fn create_user(&self, user: &SavedUser) -> Result<()> {
        self.write("create user", self.db.create_user(user))
    }

    pub fn update_user(&self, user: &SavedUser) -> Result<()> {
        self.write("update user", self.db.update_user(user))
    }

    // ── User groups ──────────────────────────────────────────────────────────

    pub fn get_user_groups(&self, owner: &Uuid) -> Vec<UserGroup> {
        self.read("load user groups", self.db.get_user_groups(owner))
            .unwrap_or_default()
    }

    pub fn get_all_user_groups(&self) -> Vec<UserGroup> {
        self.read("load all user groups", self.db.get_all_user_groups())
            .unwrap_or_default()
    }

    pub fn add_user_group(&self, group: &UserGroup) -> Result<()> {
        self.write("add user group", self.db.add_user_group(group))
    }

    pub fn update_user_group(&self, owner: &Uuid, name: &str, group: &UserGroup) -> Result<()> {
        self.write(
            "update user group",
            self.db.update_user_group(owner, name, group),
        )
    }

    pub fn delete_user_group(&self, owner: &Uuid, name: &str) -> Result<()> {
        self.write("delete user group", self.db.delete_user_group(owner, name))
    }

    // ── Claim worlds ─────────────────────────────────────────────────────────

    /// One stored claim world; `Ok(None)` only when no row has `id`.
    ///
    /// # Errors
    ///
    /// Returns the engine's error unchanged, so callers can tell a failed
    /// read from a deleted world.
    pub fn get_claim_world(&self, id: i64) -> Result<Option<(ServerWorld, ClaimWorld)>> {
        self.write("load claim world", self.db.get_claim_world(id))
    }

    /// Claim worlds hosted by `server`, excluding unclaimable worlds.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::SchemaInconsistency` if a stored world no longer
    /// decodes.
    pub fn get_claim_worlds(&self, server: &str) -> Result<HashMap<World, ClaimWorld>> {
        let worlds = self.listing("list claim worlds", self.db.get_claim_worlds(server))?;
        Ok(worlds
            .into_iter()
            .filter(|(world, _)| {
                let unclaimable = self.claims.is_world_unclaimable(world);
                if unclaimable {
                    log::debug!("Skipping unclaimable world {}", world.name);
                }
                !unclaimable
            })
            .collect())
    }

    /// Every stored claim world, unclaimable ones included.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::SchemaInconsistency` if a stored world no longer
    /// decodes.
    pub fn get_all_claim_worlds(&self) -> Result<Vec<(ServerWorld, ClaimWorld)>> {
        self.listing("list all claim worlds", self.db.get_all_claim_worlds())
    }

    pub fn create_claim_world(&self, server: &str, world: &World) -> Result<ClaimWorld> {
        self.write(
            "create claim world",
            self.db.create_claim_world(server, world),
        )
    }

    pub fn update_claim_world(&self, world: &ClaimWorld) -> Result<()> {
        self.write("update claim world", self.db.update_claim_world(world))
    }

    pub fn delete_claim_world(&self, id: i64) -> Result<()> {
        self.write("delete claim world", self.db.delete_claim_world(id))
    }
}
