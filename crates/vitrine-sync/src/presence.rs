//! Heartbeat-based presence over the shared dataset.
//!
//! Every instance overwrites its own session record on a fixed tick through
//! the active adapter's read-modify-write cycle; nobody ever deletes a peer.
//! Liveness is derived at read time from heartbeat age. Two instances
//! ticking at once can lose one another's update; the next tick repairs it,
//! so no lock is taken (accepted tradeoff, see `ConflictPolicy`).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::command::CommandChannel;
use crate::connection::ConnectionManager;
use crate::dataset::{epoch_millis, Dataset, KioskSession, RemoteCommand};
use crate::error::StorageError;
use crate::state::KioskState;

/// Heartbeats older than this classify a session as offline.
pub const LIVENESS_THRESHOLD: Duration = Duration::from_secs(10);

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);

/// Staleness check, no hysteresis: strictly younger than the threshold is
/// online, everything else is offline.
pub fn is_online_at(session: &KioskSession, now_ms: u64) -> bool {
    now_ms.saturating_sub(session.last_heartbeat) < LIVENESS_THRESHOLD.as_millis() as u64
}

pub fn is_online(session: &KioskSession) -> bool {
    is_online_at(session, epoch_millis())
}

pub struct SessionRegistry {
    session_id: String,
    connection: Arc<ConnectionManager>,
    kiosk: KioskState,
    commands: Arc<CommandChannel>,
    sessions_tx: watch::Sender<Vec<KioskSession>>,
}

impl SessionRegistry {
    pub fn new(
        connection: Arc<ConnectionManager>,
        kiosk: KioskState,
        commands: Arc<CommandChannel>,
    ) -> Self {
        let session_id = connection.session_id();
        let (sessions_tx, _) = watch::channel(Vec::new());
        Self {
            session_id,
            connection,
            kiosk,
            commands,
            sessions_tx,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Read stream of the session table as of the latest heartbeat read.
    pub fn subscribe(&self) -> watch::Receiver<Vec<KioskSession>> {
        self.sessions_tx.subscribe()
    }

    pub fn sessions(&self) -> Vec<KioskSession> {
        self.sessions_tx.borrow().clone()
    }

    /// One heartbeat cycle: refresh our session record, drain commands
    /// addressed to us, publish the session snapshot, execute the drained
    /// commands locally. Failures are logged and swallowed; the next tick
    /// self-heals.
    pub async fn tick(&self) {
        let Some((adapter, _generation)) = self.connection.active_adapter() else {
            return;
        };
        match self.beat(adapter.as_ref()).await {
            Ok(drained) => {
                for command in drained {
                    self.commands.execute_local(command);
                }
            }
            Err(err) => {
                debug!(error = %err, "heartbeat tick failed");
            }
        }
    }

    async fn beat(
        &self,
        adapter: &dyn crate::adapter::StorageAdapter,
    ) -> Result<Vec<RemoteCommand>, StorageError> {
        let mut dataset = match adapter.read_dataset().await {
            Ok(dataset) => dataset,
            Err(StorageError::NotFound) => Dataset::default(),
            Err(err) => return Err(err),
        };

        let snap = self.kiosk.snapshot();
        dataset.sessions.insert(
            self.session_id.clone(),
            KioskSession {
                id: self.session_id.clone(),
                last_heartbeat: epoch_millis(),
                current_path: snap.current_path,
                logged_in_user: snap.logged_in_user,
                screensaver_active: snap.screensaver_active,
            },
        );

        // Taking our queue out before the write is what makes consumption
        // exactly-once from this instance's perspective.
        let drained = dataset
            .command_queues
            .remove(&self.session_id)
            .unwrap_or_default();

        adapter.write_dataset(&dataset).await?;

        let sessions: Vec<KioskSession> = dataset.sessions.values().cloned().collect();
        let _ = self.sessions_tx.send(sessions);
        Ok(drained)
    }

    /// Interval task owned by the service object.
    pub fn spawn_heartbeat(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        let registry = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                registry.tick().await;
            }
        })
    }
}
