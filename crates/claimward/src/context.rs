//! Application context.
//!
//! Everything a host needs is built once by [`ClaimContextBuilder`] and held
//! by [`ClaimContext`]. Components receive what they use through their
//! constructors; nothing is reached through global state.

use std::sync::Arc;

use crate::claim::ClaimWorldStore;
use crate::config::Settings;
use crate::error::Result;
use crate::group::UserGroupStore;
use crate::ledger::ClaimBlockLedger;
use crate::storage::{Database, Gateway, SqliteDatabase};
use crate::sync::{Broker, Publisher, SyncHandler};
use crate::task::{Scheduler, ThreadScheduler};
use crate::trust::{TrustLevelRegistry, TrustManager};
use crate::user::UserListener;

/// Builder for a [`ClaimContext`].
pub struct ClaimContextBuilder {
    settings: Settings,
    database: Option<Arc<dyn Database>>,
    broker: Option<Arc<dyn Broker>>,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl ClaimContextBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            database: None,
            broker: None,
            scheduler: None,
        }
    }

    /// Use this engine instead of opening the configured SQLite file.
    pub fn database(mut self, database: Arc<dyn Database>) -> Self {
        self.database = Some(database);
        self
    }

    /// Announce writes to peer servers through `broker`.
    pub fn broker(mut self, broker: Arc<dyn Broker>) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Defaults to [`ThreadScheduler`].
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Validate the settings, open and migrate storage, and load state.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::Config` for an invalid trust level set,
    /// `ClaimError::StorageFailure` if storage cannot be opened or
    /// migrated, or `ClaimError::SchemaInconsistency` if stored claim worlds
    /// no longer decode.
    pub fn build(self) -> Result<ClaimContext> {
        let settings = self.settings;
        let server = settings.server_name.clone();
        let registry = Arc::new(TrustLevelRegistry::new(settings.trust_levels.clone())?);

        let database: Arc<dyn Database> = match self.database {
            Some(database) => database,
            None => Arc::new(SqliteDatabase::open(
                &settings.database.file,
                settings.database.table_names.clone(),
            )?),
        };
        let gateway = Gateway::new(database, settings.claims.clone());
        gateway.initialize()?;

        let publisher = match self.broker {
            Some(broker) => Publisher::new(server.clone(), broker),
            None => Publisher::disabled(server.clone()),
        };
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(ThreadScheduler::new()));

        let groups = Arc::new(UserGroupStore::new(
            gateway.clone(),
            settings.user_groups.clone(),
            publisher.clone(),
        ));
        groups.load();
        let claim_worlds = Arc::new(ClaimWorldStore::new(
            server.clone(),
            gateway.clone(),
            publisher.clone(),
        ));
        claim_worlds.load()?;

        let ledger = Arc::new(ClaimBlockLedger::new(
            gateway.clone(),
            &settings.claims,
            publisher,
        ));
        let trust = TrustManager::new(
            Arc::clone(&registry),
            Arc::clone(&claim_worlds),
            Arc::clone(&groups),
            gateway.clone(),
            settings.user_groups.clone(),
        );
        let listener = UserListener::new(Arc::clone(&ledger), Arc::clone(&scheduler));
        let sync = Arc::new(SyncHandler::new(
            server,
            Arc::clone(&claim_worlds),
            Arc::clone(&groups),
        ));

        log::info!("Claim context ready for server {}", settings.server_name);
        Ok(ClaimContext {
            settings,
            registry,
            gateway,
            ledger,
            groups,
            claim_worlds,
            trust,
            listener,
            sync,
            scheduler,
        })
    }
}

/// Every component of a running server.
pub struct ClaimContext {
    settings: Settings,
    registry: Arc<TrustLevelRegistry>,
    gateway: Gateway,
    ledger: Arc<ClaimBlockLedger>,
    groups: Arc<UserGroupStore>,
    claim_worlds: Arc<ClaimWorldStore>,
    trust: TrustManager,
    listener: UserListener,
    sync: Arc<SyncHandler>,
    scheduler: Arc<dyn Scheduler>,
}

impl ClaimContext {
    pub fn builder(settings: Settings) -> ClaimContextBuilder {
        ClaimContextBuilder::new(settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &TrustLevelRegistry {
        &self.registry
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn ledger(&self) -> &ClaimBlockLedger {
        &self.ledger
    }

    pub fn groups(&self) -> &UserGroupStore {
        &self.groups
    }

    pub fn claim_worlds(&self) -> &ClaimWorldStore {
        &self.claim_worlds
    }

    pub fn trust(&self) -> &TrustManager {
        &self.trust
    }

    pub fn listener(&self) -> &UserListener {
        &self.listener
    }

    pub fn sync(&self) -> &Arc<SyncHandler> {
        &self.sync
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }
}
