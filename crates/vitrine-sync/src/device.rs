//! Device-local persisted state, outside the shared dataset.
//!
//! The profile carries the active and last-known-good provider configs, the
//! auto-sync flag, and this device's stable session id. It lives in
//! `~/.vitrine/device.toml`; tests point the store at a scratch path.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("unable to determine home directory")]
    NoHome,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed device profile: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unable to serialize device profile: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// Scalar fields first so the TOML tables for the provider configs come last.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceProfile {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub auto_sync: bool,
    #[serde(default)]
    pub active_provider: Option<crate::provider::ProviderConfig>,
    #[serde(default)]
    pub last_known_good: Option<crate::provider::ProviderConfig>,
}

impl DeviceProfile {
    /// The stable per-install identifier, minted on first use.
    pub fn ensure_session_id(&mut self) -> String {
        if let Some(id) = &self.session_id {
            return id.clone();
        }
        let id = Uuid::new_v4().to_string();
        self.session_id = Some(id.clone());
        id
    }
}

#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn default_path() -> Result<PathBuf, ProfileError> {
        let base = BaseDirs::new().ok_or(ProfileError::NoHome)?;
        Ok(base.home_dir().join(".vitrine").join("device.toml"))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn load(&self) -> Result<DeviceProfile, ProfileError> {
        if !self.path.exists() {
            return Ok(DeviceProfile::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn save(&self, profile: &DeviceProfile) -> Result<(), ProfileError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = toml::to_string_pretty(profile)?;
        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        file.write_all(serialized.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderConfig;

    fn scratch_store() -> ProfileStore {
        let path = std::env::temp_dir()
            .join(format!("vitrine-profile-{}", Uuid::new_v4()))
            .join("device.toml");
        ProfileStore::at(path)
    }

    #[test]
    fn missing_file_loads_as_default_profile() {
        let store = scratch_store();
        let profile = store.load().unwrap();
        assert!(profile.session_id.is_none());
        assert!(profile.active_provider.is_none());
        assert!(!profile.auto_sync);
    }

    #[test]
    fn profile_round_trips_with_provider_configs() {
        let store = scratch_store();
        let mut profile = DeviceProfile::default();
        profile.ensure_session_id();
        profile.active_provider = Some(ProviderConfig::CustomApi {
            endpoint: "https://kiosk.example.com".into(),
            auth_key: Some("k-1".into()),
        });
        profile.last_known_good = profile.active_provider.clone();
        profile.auto_sync = true;
        store.save(&profile).unwrap();

        let back = store.load().unwrap();
        assert_eq!(back.session_id, profile.session_id);
        assert_eq!(back.active_provider, profile.active_provider);
        assert_eq!(back.last_known_good, profile.last_known_good);
        assert!(back.auto_sync);
    }

    #[test]
    fn session_id_is_minted_once() {
        let mut profile = DeviceProfile::default();
        let first = profile.ensure_session_id();
        let second = profile.ensure_session_id();
        assert_eq!(first, second);
    }
}
