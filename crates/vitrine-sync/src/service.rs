//! The explicitly constructed service bundle.
//!
//! Collaborators receive one `KioskService` handle and reach every
//! coordination concern through it, with no ambient globals. The service also
//! owns the two periodic activities (heartbeat, auto-sync) as plain tokio
//! tasks, started on demand and stopped on shutdown, independent of any view
//! lifecycle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::command::CommandChannel;
use crate::connection::ConnectionManager;
use crate::dataset::Dataset;
use crate::device::{ProfileError, ProfileStore};
use crate::presence::{SessionRegistry, DEFAULT_HEARTBEAT_INTERVAL};
use crate::state::{DatasetStore, KioskState};
use crate::sync::{SyncEngine, DEFAULT_AUTO_SYNC_INTERVAL};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub heartbeat_interval: Duration,
    pub auto_sync_interval: Duration,
    /// Override for the device profile location; defaults to
    /// `~/.vitrine/device.toml`.
    pub profile_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            auto_sync_interval: DEFAULT_AUTO_SYNC_INTERVAL,
            profile_path: None,
        }
    }
}

pub struct KioskService {
    config: ServiceConfig,
    connection: Arc<ConnectionManager>,
    sync: Arc<SyncEngine>,
    registry: Arc<SessionRegistry>,
    commands: Arc<CommandChannel>,
    dataset: DatasetStore,
    kiosk: KioskState,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl KioskService {
    pub fn new(config: ServiceConfig) -> Result<Arc<Self>, ProfileError> {
        let store = match &config.profile_path {
            Some(path) => ProfileStore::at(path.clone()),
            None => ProfileStore::at(ProfileStore::default_path()?),
        };
        let connection = Arc::new(ConnectionManager::new(store)?);
        let dataset = DatasetStore::default();
        let kiosk = KioskState::new();

        let sync = Arc::new(SyncEngine::new(Arc::clone(&connection), dataset.clone()));
        let commands = Arc::new(CommandChannel::new(Arc::clone(&connection), kiosk.clone()));
        let registry = Arc::new(SessionRegistry::new(
            Arc::clone(&connection),
            kiosk.clone(),
            Arc::clone(&commands),
        ));

        Ok(Arc::new(Self {
            config,
            connection,
            sync,
            registry,
            commands,
            dataset,
            kiosk,
            tasks: Mutex::new(Vec::new()),
        }))
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn sync(&self) -> &Arc<SyncEngine> {
        &self.sync
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn commands(&self) -> &Arc<CommandChannel> {
        &self.commands
    }

    pub fn dataset(&self) -> &DatasetStore {
        &self.dataset
    }

    pub fn kiosk(&self) -> &KioskState {
        &self.kiosk
    }

    pub fn session_id(&self) -> String {
        self.connection.session_id()
    }

    /// Mutate the local dataset and notify the sync engine in one step. With
    /// auto-sync on and a provider connected, the change is pushed
    /// immediately; single-flight coalescing absorbs bursts of edits.
    pub fn update_dataset<R>(&self, f: impl FnOnce(&mut Dataset) -> R) -> R {
        let result = self.dataset.with_mut(f);
        self.sync.note_mutation();
        if self.connection.auto_sync() && self.connection.is_connected() {
            let engine = Arc::clone(&self.sync);
            tokio::spawn(async move {
                engine.push().await;
            });
        }
        result
    }

    /// Start the periodic activities. Idempotent: calling twice does not
    /// double the tickers.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return;
        }
        info!(
            heartbeat = ?self.config.heartbeat_interval,
            auto_sync = ?self.config.auto_sync_interval,
            "starting kiosk service tickers"
        );
        tasks.push(Arc::clone(&self.registry).spawn_heartbeat(self.config.heartbeat_interval));
        tasks.push(Arc::clone(&self.sync).spawn_auto_sync(self.config.auto_sync_interval));
    }

    /// Stop the periodic activities. In-flight adapter calls are cancelled;
    /// local state is never left half-updated because results are applied
    /// only after an operation completes.
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock();
        for task in tasks.drain(..) {
            task.abort();
        }
        info!("kiosk service tickers stopped");
    }
}

impl Drop for KioskService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
