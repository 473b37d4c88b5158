//! Reactions to user session events reported by the host.

use std::sync::Arc;

use crate::error::Result;
use crate::ledger::ClaimBlockLedger;
use crate::task::{Scheduler, TaskHandle};

use super::{SavedUser, User};

/// Keeps user records current as users join, leave, and play.
pub struct UserListener {
    ledger: Arc<ClaimBlockLedger>,
    scheduler: Arc<dyn Scheduler>,
}

impl UserListener {
    pub fn new(ledger: Arc<ClaimBlockLedger>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { ledger, scheduler }
    }

    /// Create the user's record on first join, otherwise refresh their name
    /// and login time.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::StorageFailure` if the record cannot be written.
    pub fn on_join(&self, user: &User) -> Result<SavedUser> {
        let saved = self.ledger.edit_saved_user(user, |saved| {
            saved.user.name = user.name.clone();
            saved.last_login = crate::time::now();
        })?;
        log::debug!("{} joined with {} claim blocks", user.name, saved.claim_blocks);
        Ok(saved)
    }

    /// # Errors
    ///
    /// Returns `ClaimError::StorageFailure` if the record cannot be written.
    pub fn on_quit(&self, user: &User) -> Result<()> {
        self.ledger
            .edit_saved_user(user, |saved| saved.last_login = crate::time::now())?;
        Ok(())
    }

    /// Count another hour played and grant the hourly blocks off the
    /// caller's thread.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::Io` if the task cannot be scheduled.
    pub fn on_play_one_hour(&self, user: &User) -> Result<TaskHandle> {
        let ledger = Arc::clone(&self.ledger);
        let user = user.clone();
        self.scheduler.run_now(Box::new(move || {
            match ledger.grant_hourly(&user) {
                Ok(balance) => log::debug!("{} now has {balance} claim blocks", user.name),
                Err(e) => log::error!("Failed to grant hourly claim blocks to {}: {e}", user.name),
            }
        }))
    }
}
