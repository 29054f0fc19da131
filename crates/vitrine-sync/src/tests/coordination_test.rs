//! End-to-end coordination between two devices sharing one backend.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;

use crate::presence::is_online;
use crate::provider::ProviderConfig;
use crate::service::{KioskService, ServiceConfig};
use crate::sync::SyncOutcome;
use crate::CommandKind;

fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("vitrine-e2e-{name}-{}", uuid::Uuid::new_v4()))
}

async fn device(name: &str, shared_root: &PathBuf) -> Arc<KioskService> {
    let service = KioskService::new(ServiceConfig {
        profile_path: Some(scratch(name).join("device.toml")),
        ..ServiceConfig::default()
    })
    .unwrap();
    service
        .connection()
        .connect(ProviderConfig::Local {
            root: shared_root.clone(),
        })
        .unwrap();
    assert!(service.connection().test_connection().await.success);
    service
}

#[tokio::test]
async fn dataset_pushed_by_one_device_pulls_identically_on_another() {
    let shared = scratch("shared");
    std::fs::create_dir_all(&shared).unwrap();

    let device_a = device("a", &shared).await;
    device_a.update_dataset(|d| {
        d.catalog = json!([]);
        d.settings = json!({ "theme": "museum", "idle_minutes": 5 });
    });
    let original = device_a.dataset().snapshot();
    assert_eq!(device_a.sync().push().await, SyncOutcome::Completed);

    // A freshly provisioned device sees exactly what was pushed.
    let device_b = device("b", &shared).await;
    assert_eq!(device_b.sync().pull().await, SyncOutcome::Completed);
    assert_eq!(device_b.dataset().snapshot(), original);
}

#[tokio::test]
async fn peers_observe_each_other_through_heartbeats() {
    let shared = scratch("shared");
    std::fs::create_dir_all(&shared).unwrap();

    let device_a = device("a", &shared).await;
    let device_b = device("b", &shared).await;

    device_a.registry().tick().await;
    device_b.registry().tick().await;
    // A needs one more read to observe B's record.
    device_a.registry().tick().await;

    let seen_by_a = device_a.registry().sessions();
    assert_eq!(seen_by_a.len(), 2);
    assert!(seen_by_a.iter().all(is_online));
    assert!(seen_by_a.iter().any(|s| s.id == device_b.session_id()));
}

#[tokio::test]
async fn command_sent_from_one_device_executes_on_the_other_exactly_once() {
    let shared = scratch("shared");
    std::fs::create_dir_all(&shared).unwrap();

    let device_a = device("a", &shared).await;
    let device_b = device("b", &shared).await;
    device_b.kiosk().navigate("/exhibit/9");

    device_a
        .commands()
        .send_command(
            &device_b.session_id(),
            CommandKind::Navigate { path: "/".into() },
        )
        .await
        .unwrap();

    device_b.registry().tick().await;
    assert_eq!(device_b.kiosk().snapshot().current_path, "/");

    // The queue is empty on the shared store; a second tick re-runs nothing.
    device_b.kiosk().navigate("/exhibit/9");
    device_b.registry().tick().await;
    assert_eq!(device_b.kiosk().snapshot().current_path, "/exhibit/9");
}
