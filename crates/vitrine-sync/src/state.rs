//! Local runtime state: the device's working copy of the dataset and the
//! screen-level state a heartbeat reports.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::dataset::Dataset;

/// The device's in-memory copy of the shared dataset.
///
/// Pull replaces it wholesale; push serializes a snapshot of it. Collaborator
/// mutations go through [`crate::service::KioskService::update_dataset`] so
/// the sync engine hears about them.
#[derive(Clone, Default)]
pub struct DatasetStore {
    inner: Arc<RwLock<Dataset>>,
}

impl DatasetStore {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            inner: Arc::new(RwLock::new(dataset)),
        }
    }

    pub fn snapshot(&self) -> Dataset {
        self.inner.read().clone()
    }

    pub fn replace(&self, dataset: Dataset) {
        *self.inner.write() = dataset;
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Dataset) -> R) -> R {
        f(&mut self.inner.write())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KioskStateSnapshot {
    pub current_path: String,
    pub logged_in_user: Option<String>,
    pub screensaver_active: bool,
}

/// Screen-level state owned by this instance only: where the kiosk is, who is
/// logged in, whether the screensaver runs. Heartbeats report it; remote
/// commands mutate it.
#[derive(Clone)]
pub struct KioskState {
    inner: Arc<Mutex<KioskStateSnapshot>>,
}

impl Default for KioskState {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(KioskStateSnapshot {
                current_path: "/".to_string(),
                logged_in_user: None,
                screensaver_active: false,
            })),
        }
    }
}

impl KioskState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> KioskStateSnapshot {
        self.inner.lock().clone()
    }

    pub fn navigate(&self, path: impl Into<String>) {
        self.inner.lock().current_path = path.into();
    }

    pub fn set_logged_in_user(&self, user: Option<String>) {
        self.inner.lock().logged_in_user = user;
    }

    pub fn logout(&self) {
        self.inner.lock().logged_in_user = None;
    }

    pub fn set_screensaver(&self, active: bool) {
        self.inner.lock().screensaver_active = active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dataset_store_snapshots_are_detached() {
        let store = DatasetStore::default();
        let snapshot = store.snapshot();
        store.with_mut(|d| d.catalog = json!([1, 2, 3]));
        assert_eq!(snapshot.catalog, json!([]));
        assert_eq!(store.snapshot().catalog, json!([1, 2, 3]));
    }

    #[test]
    fn kiosk_state_mutations_apply() {
        let state = KioskState::new();
        state.navigate("/catalog/42");
        state.set_logged_in_user(Some("clerk".into()));
        state.set_screensaver(true);

        let snap = state.snapshot();
        assert_eq!(snap.current_path, "/catalog/42");
        assert_eq!(snap.logged_in_user.as_deref(), Some("clerk"));
        assert!(snap.screensaver_active);

        state.logout();
        assert_eq!(state.snapshot().logged_in_user, None);
    }
}
