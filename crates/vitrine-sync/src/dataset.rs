//! The shared dataset document and the records that live inside it.
//!
//! Every backend stores the dataset as one JSON document. Catalog and
//! settings belong to the presentation layer and stay opaque here; the core
//! only owns the session table and the per-target command queues that ride
//! along in the same document.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Milliseconds since the unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default = "empty_catalog")]
    pub catalog: Value,
    #[serde(default = "empty_settings")]
    pub settings: Value,
    #[serde(default)]
    pub sessions: BTreeMap<String, KioskSession>,
    #[serde(default)]
    pub command_queues: BTreeMap<String, Vec<RemoteCommand>>,
}

fn empty_catalog() -> Value {
    Value::Array(Vec::new())
}

fn empty_settings() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Default for Dataset {
    fn default() -> Self {
        Self {
            catalog: empty_catalog(),
            settings: empty_settings(),
            sessions: BTreeMap::new(),
            command_queues: BTreeMap::new(),
        }
    }
}

/// Self-reported liveness record for one kiosk instance.
///
/// Written on every heartbeat tick, never deleted by a peer. Staleness is
/// derived by readers from `last_heartbeat`, not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KioskSession {
    pub id: String,
    pub last_heartbeat: u64,
    pub current_path: String,
    #[serde(default)]
    pub logged_in_user: Option<String>,
    #[serde(default)]
    pub screensaver_active: bool,
}

/// A queued out-of-band command addressed to one kiosk instance.
///
/// The id exists for tracing; consumption is by removal from the queue, not
/// by acknowledgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCommand {
    pub id: String,
    #[serde(flatten)]
    pub kind: CommandKind,
}

impl RemoteCommand {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandKind {
    Navigate { path: String },
    Refresh,
    Logout,
    StartScreensaver,
    StopScreensaver,
}

impl CommandKind {
    pub fn label(&self) -> &'static str {
        match self {
            CommandKind::Navigate { .. } => "navigate",
            CommandKind::Refresh => "refresh",
            CommandKind::Logout => "logout",
            CommandKind::StartScreensaver => "start_screensaver",
            CommandKind::StopScreensaver => "stop_screensaver",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_dataset_has_catalog_array_and_settings_object() {
        let dataset = Dataset::default();
        assert_eq!(dataset.catalog, json!([]));
        assert_eq!(dataset.settings, json!({}));
        assert!(dataset.sessions.is_empty());
        assert!(dataset.command_queues.is_empty());
    }

    #[test]
    fn dataset_deserializes_with_missing_core_fields() {
        // A freshly initialized backend may only carry catalog data.
        let dataset: Dataset =
            serde_json::from_value(json!({ "catalog": [{ "sku": "a-1" }] })).unwrap();
        assert_eq!(dataset.catalog, json!([{ "sku": "a-1" }]));
        assert!(dataset.sessions.is_empty());
        assert!(dataset.command_queues.is_empty());
    }

    #[test]
    fn command_serializes_with_type_tag() {
        let cmd = RemoteCommand::new(CommandKind::Navigate {
            path: "/catalog".into(),
        });
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["type"], "navigate");
        assert_eq!(value["path"], "/catalog");

        let back: RemoteCommand = serde_json::from_value(value).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn session_round_trips_without_optional_fields() {
        let raw = json!({
            "id": "kiosk-1",
            "last_heartbeat": 1700000000000u64,
            "current_path": "/"
        });
        let session: KioskSession = serde_json::from_value(raw).unwrap();
        assert_eq!(session.logged_in_user, None);
        assert!(!session.screensaver_active);
    }
}
