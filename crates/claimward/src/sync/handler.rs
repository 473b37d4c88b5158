//! Applies peer notifications to this server's in-memory state.

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::claim::ClaimWorldStore;
use crate::error::Result;
use crate::group::UserGroupStore;

use super::{SyncMessage, SyncPayload};

/// Reloads whatever a peer server reports as changed.
///
/// User records are always read through from storage, so `UserUpdated`
/// needs no local action.
pub struct SyncHandler {
    server: String,
    claim_worlds: Arc<ClaimWorldStore>,
    groups: Arc<UserGroupStore>,
}

impl SyncHandler {
    pub fn new(
        server: impl Into<String>,
        claim_worlds: Arc<ClaimWorldStore>,
        groups: Arc<UserGroupStore>,
    ) -> Self {
        Self {
            server: server.into(),
            claim_worlds,
            groups,
        }
    }

    /// Handle one encoded message. Returns the payload acted on, or `None`
    /// for this server's own messages and undecodable input.
    pub fn handle(&self, raw: &str) -> Option<SyncPayload> {
        let message = match SyncMessage::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Ignoring sync message: {e}");
                return None;
            }
        };
        if message.source_server == self.server {
            return None;
        }
        log::debug!(
            "Applying {:?} from {}",
            message.payload,
            message.source_server
        );
        match &message.payload {
            SyncPayload::ClaimWorldUpdated { storage_id } => self.claim_worlds.reload(*storage_id),
            SyncPayload::UserGroupsUpdated { owner } => self.groups.reload_owner(owner),
            SyncPayload::UserUpdated { .. } => {}
        }
        Some(message.payload)
    }

    /// Handle messages from `receiver` on a background thread until the
    /// broker side hangs up.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::Io` if the thread cannot be started.
    pub fn listen(self: Arc<Self>, receiver: Receiver<String>) -> Result<JoinHandle<()>> {
        let thread = std::thread::Builder::new()
            .name(format!("claimward-sync-{}", self.server))
            .spawn(move || {
                for raw in receiver {
                    self.handle(&raw);
                }
                log::debug!("Sync listener for {} stopped", self.server);
            })?;
        Ok(thread)
    }
}
