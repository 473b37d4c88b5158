//! Cross-server synchronization.
//!
//! Servers sharing one database announce their writes so peers can drop or
//! reload the state they hold in memory. Messages carry identifiers only;
//! the receiving server always re-reads the data from storage.
//!
//! Wire format (JSON):
//! ```json
//! { "source_server": "survival", "payload": { "type": "claim_world_updated", "storage_id": 4 } }
//! ```

pub mod handler;

use std::sync::mpsc;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ClaimError, Result};

pub use handler::SyncHandler;

// ── Messages ─────────────────────────────────────────────────────────────────

/// What changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncPayload {
    /// A claim world was rewritten.
    ClaimWorldUpdated { storage_id: i64 },
    /// A user's groups were created, changed, or deleted.
    UserGroupsUpdated { owner: Uuid },
    /// A user's record (balance, preferences) changed.
    UserUpdated { uuid: Uuid },
}

/// A payload stamped with the server that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub source_server: String,
    pub payload: SyncPayload,
}

impl SyncMessage {
    pub fn new(source_server: impl Into<String>, payload: SyncPayload) -> Self {
        Self {
            source_server: source_server.into(),
            payload,
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// # Errors
    ///
    /// Returns `ClaimError::Serialization` for malformed messages.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| ClaimError::Serialization(format!("invalid sync message: {e}")))
    }
}

// ── Brokers ──────────────────────────────────────────────────────────────────

/// Transport that delivers encoded messages to every server.
pub trait Broker: Send + Sync {
    fn publish(&self, message: &str) -> Result<()>;
}

/// In-process broker fanning each message out to all subscribers.
///
/// Used when several logical servers share one process, and in tests.
#[derive(Default)]
pub struct LocalBroker {
    subscribers: Mutex<Vec<mpsc::Sender<String>>>,
}

impl LocalBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every message published from now on.
    pub fn subscribe(&self) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl Broker for LocalBroker {
    fn publish(&self, message: &str) -> Result<()> {
        // Dropped receivers unsubscribe themselves.
        self.subscribers
            .lock()
            .retain(|tx| tx.send(message.to_owned()).is_ok());
        Ok(())
    }
}

// ── Publisher ────────────────────────────────────────────────────────────────

/// Stamps payloads with this server's name and hands them to the broker.
///
/// Publishing never fails from the caller's point of view: a broker error
/// is logged and the local write stands.
#[derive(Clone)]
pub struct Publisher {
    server: String,
    broker: Option<Arc<dyn Broker>>,
}

impl Publisher {
    pub fn new(server: impl Into<String>, broker: Arc<dyn Broker>) -> Self {
        Self {
            server: server.into(),
            broker: Some(broker),
        }
    }

    /// A publisher for a server running alone.
    pub fn disabled(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            broker: None,
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn publish(&self, payload: SyncPayload) {
        let Some(broker) = &self.broker else {
            return;
        };
        let message = SyncMessage::new(self.server.clone(), payload);
        let result = message.encode().and_then(|text| broker.publish(&text));
        if let Err(e) = result {
            log::error!("Failed to publish {:?}: {e}", message.payload);
        }
    }
}
