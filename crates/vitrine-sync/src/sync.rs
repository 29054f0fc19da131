//! Push/pull synchronization between the local dataset copy and the active
//! provider.
//!
//! The engine owns a small status machine (`Idle → Pending → Syncing →
//! Synced | Error`) and guarantees at most one in-flight operation per
//! instance. A trigger that lands while an operation is running is coalesced
//! into exactly one follow-up run instead of a parallel one.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::connection::ConnectionManager;
use crate::dataset::epoch_millis;
use crate::error::{truncate_message, StorageError};
use crate::state::DatasetStore;

/// How remote edits that race a push are handled: they are not. The full
/// local dataset overwrites the remote document, last writer wins, no merge.
/// A deliberate, documented limitation: swapping in a merge strategy means
/// replacing this policy, not hunting down an implicit side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    Overwrite,
}

pub const CONFLICT_POLICY: ConflictPolicy = ConflictPolicy::Overwrite;

pub const DEFAULT_AUTO_SYNC_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Pending,
    Syncing,
    Synced,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
    Push,
    Pull,
}

/// How a sync request resolved from the caller's point of view.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// The operation ran (possibly including coalesced follow-ups) and the
    /// final status is `Synced` or `Error`.
    Completed,
    /// Another operation was in flight; this trigger was folded into one
    /// follow-up run executed by the in-flight caller.
    Coalesced,
    /// No provider is active; nothing happened and nothing failed.
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct SyncSnapshot {
    pub status: SyncStatus,
    pub last_error: Option<String>,
    pub last_synced_at: Option<u64>,
}

struct EngineState {
    status: SyncStatus,
    last_error: Option<String>,
    last_synced_at: Option<u64>,
    in_flight: bool,
    follow_up: Option<SyncOp>,
}

pub struct SyncEngine {
    connection: Arc<ConnectionManager>,
    dataset: DatasetStore,
    state: Mutex<EngineState>,
}

impl SyncEngine {
    pub fn new(connection: Arc<ConnectionManager>, dataset: DatasetStore) -> Self {
        Self {
            connection,
            dataset,
            state: Mutex::new(EngineState {
                status: SyncStatus::Idle,
                last_error: None,
                last_synced_at: None,
                in_flight: false,
                follow_up: None,
            }),
        }
    }

    pub fn status(&self) -> SyncSnapshot {
        let st = self.state.lock();
        SyncSnapshot {
            status: st.status,
            last_error: st.last_error.clone(),
            last_synced_at: st.last_synced_at,
        }
    }

    /// A collaborator changed the local dataset: terminal statuses fall back
    /// to `Pending`. The service object layers the immediate auto-sync push
    /// on top of this.
    pub fn note_mutation(&self) {
        let mut st = self.state.lock();
        if !st.in_flight {
            st.status = SyncStatus::Pending;
        }
    }

    /// Serialize the local dataset and overwrite the remote document
    /// ([`CONFLICT_POLICY`]).
    pub async fn push(&self) -> SyncOutcome {
        self.run(SyncOp::Push).await
    }

    /// Fetch the remote document and replace local state wholesale. A remote
    /// that was never written is "not yet initialized", not a failure.
    pub async fn pull(&self) -> SyncOutcome {
        self.run(SyncOp::Pull).await
    }

    async fn run(&self, op: SyncOp) -> SyncOutcome {
        // With no provider active every sync operation is a safe no-op.
        let Some((adapter, generation)) = self.connection.active_adapter() else {
            debug!(?op, "sync requested without an active provider");
            return SyncOutcome::Disconnected;
        };

        {
            let mut st = self.state.lock();
            if st.in_flight {
                st.follow_up = Some(op);
                return SyncOutcome::Coalesced;
            }
            st.in_flight = true;
            st.status = SyncStatus::Syncing;
        }

        let mut current = op;
        loop {
            let result = self.execute(current, adapter.as_ref()).await;

            let mut st = self.state.lock();
            if self.connection.generation() != generation {
                // The provider changed under us; drop the result on the
                // floor rather than mixing state across providers.
                st.in_flight = false;
                st.follow_up = None;
                st.status = SyncStatus::Idle;
                info!(?current, "discarding sync result from replaced provider");
                return SyncOutcome::Completed;
            }

            match &result {
                Ok(()) => {
                    st.status = SyncStatus::Synced;
                    st.last_error = None;
                    st.last_synced_at = Some(epoch_millis());
                }
                Err(err) => {
                    st.status = SyncStatus::Error;
                    st.last_error = Some(truncate_message(&err.to_string(), 500));
                    warn!(?current, error = %err, "sync operation failed");
                }
            }

            match st.follow_up.take() {
                Some(next) => {
                    st.status = SyncStatus::Syncing;
                    current = next;
                }
                None => {
                    st.in_flight = false;
                    return SyncOutcome::Completed;
                }
            }
        }
    }

    async fn execute(&self, op: SyncOp, adapter: &dyn crate::adapter::StorageAdapter) -> Result<(), StorageError> {
        match op {
            SyncOp::Push => {
                let snapshot = self.dataset.snapshot();
                adapter.write_dataset(&snapshot).await
            }
            SyncOp::Pull => match adapter.read_dataset().await {
                Ok(remote) => {
                    self.dataset.replace(remote);
                    Ok(())
                }
                // Remote not yet initialized: keep local state as-is.
                Err(StorageError::NotFound) => Ok(()),
                Err(err) => Err(err),
            },
        }
    }

    /// Interval task: pull while quiescent so long as auto-sync is enabled.
    /// Owned by the service object, stopped by aborting the handle.
    pub fn spawn_auto_sync(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        let engine = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !engine.connection.auto_sync() {
                    continue;
                }
                let status = engine.status().status;
                // Only pull when there are no unsynced local edits to
                // clobber and nothing already in flight.
                if matches!(status, SyncStatus::Idle | SyncStatus::Synced) {
                    engine.pull().await;
                }
            }
        })
    }
}
