//! Claim-block ledger.
//!
//! Balances live on each user's [`SavedUser`] record. Every change to a
//! record goes through [`ClaimBlockLedger::edit_saved_user`], which holds a
//! per-user lock across the read, the edit and the write. Two edits for the
//! same user therefore apply one after the other; edits for different users
//! never contend.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::config::ClaimSettings;
use crate::error::Result;
use crate::storage::Gateway;
use crate::sync::{Publisher, SyncPayload};
use crate::user::{SavedUser, User};

/// Per-user claim-block balances.
pub struct ClaimBlockLedger {
    gateway: Gateway,
    publisher: Publisher,
    starting_blocks: i64,
    hourly_blocks: i64,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ClaimBlockLedger {
    pub fn new(gateway: Gateway, settings: &ClaimSettings, publisher: Publisher) -> Self {
        Self {
            gateway,
            publisher,
            starting_blocks: settings.starting_claim_blocks.max(0),
            hourly_blocks: settings.hourly_claim_blocks,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn starting_blocks(&self) -> i64 {
        self.starting_blocks
    }

    pub fn hourly_blocks(&self) -> i64 {
        self.hourly_blocks
    }

    /// Current balance; the starting balance for users never seen.
    pub fn balance(&self, uuid: &Uuid) -> i64 {
        self.gateway
            .get_user(uuid)
            .map(|saved| saved.claim_blocks)
            .unwrap_or(self.starting_blocks)
    }

    pub fn saved_user(&self, uuid: &Uuid) -> Option<SavedUser> {
        self.gateway.get_user(uuid)
    }

    /// Apply `edit` to a user's record and persist it, under that user's lock.
    ///
    /// A user without a record gets one with the starting balance first.
    /// The balance is clamped at zero after `edit` runs.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::StorageFailure` if the record cannot be created
    /// or written; the stored record is then unchanged.
    pub fn edit_saved_user(
        &self,
        user: &User,
        edit: impl FnOnce(&mut SavedUser),
    ) -> Result<SavedUser> {
        let lock = self.user_lock(&user.uuid);
        let result = {
            let _guard = lock.lock();
            self.apply(user, edit)
        };
        self.release(&user.uuid, lock);
        result
    }

    fn apply(&self, user: &User, edit: impl FnOnce(&mut SavedUser)) -> Result<SavedUser> {
        let mut saved = match self.gateway.get_user(&user.uuid) {
            Some(saved) => saved,
            None => {
                let fresh = SavedUser::new(user.clone(), self.starting_blocks);
                self.gateway.create_user(&fresh)?;
                log::debug!("Created user record for {}", user.name);
                fresh
            }
        };
        edit(&mut saved);
        saved.claim_blocks = saved.claim_blocks.max(0);
        saved.hours_played = saved.hours_played.max(0);
        self.gateway.update_user(&saved)?;
        self.publisher
            .publish(SyncPayload::UserUpdated { uuid: user.uuid });
        Ok(saved)
    }

    /// Replace a balance with `edit(old)`, clamped at zero.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::StorageFailure` if the write fails.
    pub fn edit_balance(&self, user: &User, edit: impl FnOnce(i64) -> i64) -> Result<i64> {
        self.edit_saved_user(user, |saved| saved.claim_blocks = edit(saved.claim_blocks))
            .map(|saved| saved.claim_blocks)
    }

    /// Credit one hour of play: count the hour and add the hourly blocks in
    /// one write.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::StorageFailure` if the write fails; neither the
    /// hour nor the blocks are then recorded.
    pub fn grant_hourly(&self, user: &User) -> Result<i64> {
        let hourly = self.hourly_blocks;
        self.edit_saved_user(user, |saved| {
            saved.hours_played = saved.hours_played.saturating_add(1);
            saved.claim_blocks = saved.claim_blocks.saturating_add(hourly);
        })
        .map(|saved| saved.claim_blocks)
    }

    // ── Per-user locks ───────────────────────────────────────────────────────

    fn user_lock(&self, uuid: &Uuid) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.lock().entry(*uuid).or_default())
    }

    fn release(&self, uuid: &Uuid, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        // One reference in the map, one here: nobody else is waiting.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(uuid);
        }
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.lock().len()
    }
}
