//! Loaded claim worlds of one server.
//!
//! Each [`ClaimWorld`] sits behind its own mutex. A mutation works on a
//! copy of the world, writes the copy through the gateway, and only then
//! replaces the live world, all while holding that world's lock. Edits to
//! one world are therefore serialized and a failed write changes nothing;
//! edits to different worlds run in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{ClaimError, Result};
use crate::storage::Gateway;
use crate::sync::{Publisher, SyncPayload};

use super::region::Position;
use super::world::{ClaimWorld, World};
use super::Claim;

type SharedWorld = Arc<Mutex<ClaimWorld>>;

#[derive(Default)]
struct Loaded {
    worlds: HashMap<World, SharedWorld>,
    by_id: HashMap<i64, World>,
}

impl Loaded {
    fn insert(&mut self, world: World, claim_world: ClaimWorld) {
        self.by_id.insert(claim_world.id(), world.clone());
        self.worlds.insert(world, Arc::new(Mutex::new(claim_world)));
    }
}

/// The claim worlds hosted by this server.
pub struct ClaimWorldStore {
    server: String,
    gateway: Gateway,
    publisher: Publisher,
    loaded: RwLock<Loaded>,
}

impl ClaimWorldStore {
    pub fn new(server: impl Into<String>, gateway: Gateway, publisher: Publisher) -> Self {
        Self {
            server: server.into(),
            gateway,
            publisher,
            loaded: RwLock::new(Loaded::default()),
        }
    }

    /// Load every claimable world of this server from storage.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::SchemaInconsistency` if a stored world no longer
    /// decodes; nothing is replaced in that case.
    pub fn load(&self) -> Result<usize> {
        let stored = self.gateway.get_claim_worlds(&self.server)?;
        let mut loaded = Loaded::default();
        for (world, claim_world) in stored {
            loaded.insert(world, claim_world);
        }
        let count = loaded.worlds.len();
        *self.loaded.write() = loaded;
        log::info!("Loaded {count} claim worlds for server {}", self.server);
        Ok(count)
    }

    pub fn worlds(&self) -> Vec<World> {
        self.loaded.read().worlds.keys().cloned().collect()
    }

    pub fn is_loaded(&self, world: &World) -> bool {
        self.loaded.read().worlds.contains_key(world)
    }

    fn shared(&self, world: &World) -> Option<SharedWorld> {
        self.loaded.read().worlds.get(world).cloned()
    }

    /// Allocate storage for a world that has none yet.
    ///
    /// Returns the existing world's storage id if it is already loaded.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::PermissionDenied` for unclaimable worlds, or
    /// `ClaimError::StorageFailure` if the insert fails.
    pub fn create(&self, world: &World) -> Result<i64> {
        if self.gateway.claim_settings().is_world_unclaimable(world) {
            return Err(ClaimError::PermissionDenied(format!(
                "claims are disabled in {}",
                world.name
            )));
        }
        let mut loaded = self.loaded.write();
        if let Some(existing) = loaded.worlds.get(world) {
            return Ok(existing.lock().id());
        }
        let claim_world = self.gateway.create_claim_world(&self.server, world)?;
        let id = claim_world.id();
        log::info!("Created claim world {id} for {}", world.name);
        loaded.insert(world.clone(), claim_world);
        Ok(id)
    }

    /// Run `read` against a loaded world.
    pub fn read<R>(&self, world: &World, read: impl FnOnce(&ClaimWorld) -> R) -> Option<R> {
        let shared = self.shared(world)?;
        let guard = shared.lock();
        Some(read(&guard))
    }

    /// A copy of the most specific claim at `position`.
    pub fn claim_at(&self, world: &World, position: &Position) -> Option<Claim> {
        self.read(world, |claim_world| claim_world.claim_at(position).cloned())
            .flatten()
    }

    /// Apply `edit` to a world and persist the result as one unit.
    ///
    /// The live world only changes if both `edit` and the write succeed.
    /// Peers are told to reload the world afterwards.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::NotFound` if the world is not loaded, any error
    /// from `edit`, or `ClaimError::StorageFailure` if the write fails.
    pub fn with_world_mut<R>(
        &self,
        world: &World,
        edit: impl FnOnce(&mut ClaimWorld) -> Result<R>,
    ) -> Result<R> {
        let shared = self
            .shared(world)
            .ok_or_else(|| ClaimError::NotFound(format!("claim world {}", world.name)))?;
        let mut live = shared.lock();
        let mut draft = live.clone();
        let outcome = edit(&mut draft)?;
        self.gateway.update_claim_world(&draft)?;
        *live = draft;
        let storage_id = live.id();
        drop(live);
        self.publisher
            .publish(SyncPayload::ClaimWorldUpdated { storage_id });
        Ok(outcome)
    }

    /// Re-read a world from storage after a peer changed it.
    ///
    /// Worlds hosted by other servers are ignored; a world that no longer
    /// exists in storage is unloaded. A failed read keeps the live world.
    pub fn reload(&self, storage_id: i64) {
        let (server_world, fresh) = match self.gateway.get_claim_world(storage_id) {
            Ok(Some(found)) => found,
            Ok(None) => {
                let mut loaded = self.loaded.write();
                if let Some(world) = loaded.by_id.remove(&storage_id) {
                    log::info!("Claim world {storage_id} was deleted; unloading {}", world.name);
                    loaded.worlds.remove(&world);
                }
                return;
            }
            Err(e) => {
                log::warn!("Keeping loaded claim world {storage_id}; reload failed: {e}");
                return;
            }
        };
        if server_world.server != self.server {
            return;
        }
        match self.shared(&server_world.world) {
            Some(shared) => *shared.lock() = fresh,
            None => self.loaded.write().insert(server_world.world, fresh),
        }
        log::debug!("Reloaded claim world {storage_id}");
    }

    /// Delete a world and every claim in it.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::NotFound` if the world is not loaded, or
    /// `ClaimError::StorageFailure` if the delete fails.
    pub fn delete(&self, world: &World) -> Result<()> {
        let mut loaded = self.loaded.write();
        let storage_id = loaded
            .worlds
            .get(world)
            .map(|shared| shared.lock().id())
            .ok_or_else(|| ClaimError::NotFound(format!("claim world {}", world.name)))?;
        self.gateway.delete_claim_world(storage_id)?;
        loaded.worlds.remove(world);
        loaded.by_id.remove(&storage_id);
        drop(loaded);
        self.publisher
            .publish(SyncPayload::ClaimWorldUpdated { storage_id });
        Ok(())
    }
}
