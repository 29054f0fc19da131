//! Provider lifecycle: candidate, test-then-commit, last known good.
//!
//! A provider selection is only "connected" after one successful round trip
//! against its adapter. The last config that passed a test is persisted so a
//! disconnected device can offer one-click reconnect without re-entering
//! credentials.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::adapter::{build_adapter, StorageAdapter};
use crate::device::{DeviceProfile, ProfileError, ProfileStore};
use crate::error::{truncate_message, StorageError};
use crate::provider::ProviderConfig;

const MESSAGE_LIMIT: usize = 200;

/// Result of a connectivity test, shaped for direct operator display.
#[derive(Debug, Clone, PartialEq)]
pub struct TestOutcome {
    pub success: bool,
    pub message: Option<String>,
}

impl TestOutcome {
    fn passed() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(truncate_message(&message.into(), MESSAGE_LIMIT)),
        }
    }
}

#[derive(Clone)]
struct Active {
    config: ProviderConfig,
    adapter: Arc<dyn StorageAdapter>,
}

struct ConnState {
    profile: DeviceProfile,
    session_id: String,
    candidate: Option<ProviderConfig>,
    active: Option<Active>,
    generation: u64,
}

pub struct ConnectionManager {
    store: ProfileStore,
    state: Mutex<ConnState>,
}

impl ConnectionManager {
    pub fn new(store: ProfileStore) -> Result<Self, ProfileError> {
        let mut profile = store.load()?;
        let had_id = profile.session_id.is_some();
        let session_id = profile.ensure_session_id();
        if !had_id {
            store.save(&profile)?;
        }
        Ok(Self {
            store,
            state: Mutex::new(ConnState {
                profile,
                session_id,
                candidate: None,
                active: None,
                generation: 0,
            }),
        })
    }

    /// Stable per-install identifier used for heartbeats and command routing.
    pub fn session_id(&self) -> String {
        self.state.lock().session_id.clone()
    }

    /// Store `config` as the candidate provider. Nothing is connected until
    /// [`test_connection`](Self::test_connection) passes.
    pub fn connect(&self, config: ProviderConfig) -> Result<(), StorageError> {
        let config = config.normalized()?;
        info!(provider = config.label(), "candidate provider selected");
        self.state.lock().candidate = Some(config);
        Ok(())
    }

    /// Explicit operator switch: forget the last known good provider before
    /// adopting the new candidate.
    pub fn switch(&self, config: ProviderConfig) -> Result<(), StorageError> {
        {
            let mut st = self.state.lock();
            st.profile.last_known_good = None;
            let profile = st.profile.clone();
            drop(st);
            self.persist(&profile);
        }
        self.connect(config)
    }

    /// Probe the candidate adapter. On success the candidate becomes the
    /// active provider and is persisted as last known good; on failure the
    /// active provider is left exactly as it was.
    pub async fn test_connection(&self) -> TestOutcome {
        let Some(config) = self.state.lock().candidate.clone() else {
            return TestOutcome::failed("no provider selected");
        };
        let adapter = match build_adapter(&config) {
            Ok(adapter) => adapter,
            Err(err) => return TestOutcome::failed(err.to_string()),
        };
        match adapter.probe().await {
            Ok(()) => {
                let mut st = self.state.lock();
                if st.candidate.as_ref() != Some(&config) {
                    return TestOutcome::failed("provider selection changed during test");
                }
                st.generation += 1;
                st.active = Some(Active {
                    config: config.clone(),
                    adapter,
                });
                st.profile.active_provider = Some(config.clone());
                st.profile.last_known_good = Some(config.clone());
                let profile = st.profile.clone();
                drop(st);
                self.persist(&profile);
                info!(provider = config.label(), "provider connected");
                TestOutcome::passed()
            }
            Err(err) => {
                warn!(provider = config.label(), error = %err, "connection test failed");
                TestOutcome::failed(err.to_string())
            }
        }
    }

    /// Re-run test-then-commit from the persisted last-known-good config.
    pub async fn reconnect(&self) -> TestOutcome {
        let last_known_good = self.state.lock().profile.last_known_good.clone();
        match last_known_good {
            Some(config) => {
                self.state.lock().candidate = Some(config);
                self.test_connection().await
            }
            None => TestOutcome::failed("no known-good provider to reconnect to"),
        }
    }

    /// Drop the active provider. The last-known-good record survives so
    /// [`reconnect`](Self::reconnect) keeps working.
    pub fn disconnect(&self) {
        let mut st = self.state.lock();
        st.generation += 1;
        st.active = None;
        st.candidate = None;
        st.profile.active_provider = None;
        let profile = st.profile.clone();
        drop(st);
        self.persist(&profile);
        info!("provider disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().active.is_some()
    }

    pub fn active_config(&self) -> Option<ProviderConfig> {
        self.state.lock().active.as_ref().map(|a| a.config.clone())
    }

    pub fn last_known_good(&self) -> Option<ProviderConfig> {
        self.state.lock().profile.last_known_good.clone()
    }

    /// The active adapter plus the generation it belongs to. Results computed
    /// against a stale generation must be discarded, not applied.
    pub fn active_adapter(&self) -> Option<(Arc<dyn StorageAdapter>, u64)> {
        let st = self.state.lock();
        st.active
            .as_ref()
            .map(|a| (Arc::clone(&a.adapter), st.generation))
    }

    /// Bumped on every connect, disconnect, and provider switch.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn auto_sync(&self) -> bool {
        self.state.lock().profile.auto_sync
    }

    pub fn set_auto_sync(&self, enabled: bool) {
        let mut st = self.state.lock();
        st.profile.auto_sync = enabled;
        let profile = st.profile.clone();
        drop(st);
        self.persist(&profile);
    }

    fn persist(&self, profile: &DeviceProfile) {
        if let Err(err) = self.store.save(profile) {
            warn!(error = %err, "failed to persist device profile");
        }
    }

    /// Commit a prebuilt adapter as the active provider, bypassing the probe.
    #[cfg(test)]
    pub(crate) fn adopt_adapter(&self, config: ProviderConfig, adapter: Arc<dyn StorageAdapter>) {
        let mut st = self.state.lock();
        st.generation += 1;
        st.profile.active_provider = Some(config.clone());
        st.profile.last_known_good = Some(config.clone());
        st.active = Some(Active { config, adapter });
    }
}

#[cfg(test)]
pub(crate) fn test_manager() -> Arc<ConnectionManager> {
    let path = std::env::temp_dir()
        .join(format!("vitrine-conn-{}", uuid::Uuid::new_v4()))
        .join("device.toml");
    Arc::new(ConnectionManager::new(ProfileStore::at(path)).unwrap())
}
