//! Durable remote commands over the shared dataset.
//!
//! An operator enqueues a command into the target's queue with the same
//! read-modify-write cycle heartbeats use; the addressed instance drains its
//! own queue on its next tick and applies the effects locally. No
//! acknowledgment flows back; delivery shows up indirectly in the target's
//! next heartbeat (path change, screensaver state).

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::connection::ConnectionManager;
use crate::dataset::{CommandKind, Dataset, RemoteCommand};
use crate::error::StorageError;
use crate::state::KioskState;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("no active storage provider")]
    Disconnected,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Local effect of an executed command, for collaborators that need to react
/// beyond the state change (e.g. reload a view on `RefreshRequested`).
#[derive(Debug, Clone, PartialEq)]
pub enum CommandEvent {
    Navigated { path: String },
    RefreshRequested,
    LoggedOut,
    ScreensaverStarted,
    ScreensaverStopped,
}

pub struct CommandChannel {
    connection: Arc<ConnectionManager>,
    kiosk: KioskState,
    events_tx: broadcast::Sender<CommandEvent>,
}

impl CommandChannel {
    pub fn new(connection: Arc<ConnectionManager>, kiosk: KioskState) -> Self {
        let (events_tx, _) = broadcast::channel(64);
        Self {
            connection,
            kiosk,
            events_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CommandEvent> {
        self.events_tx.subscribe()
    }

    /// Append a command to `target_id`'s queue in the shared dataset.
    pub async fn send_command(
        &self,
        target_id: &str,
        kind: CommandKind,
    ) -> Result<(), SendError> {
        let Some((adapter, _generation)) = self.connection.active_adapter() else {
            return Err(SendError::Disconnected);
        };

        let mut dataset = match adapter.read_dataset().await {
            Ok(dataset) => dataset,
            Err(StorageError::NotFound) => Dataset::default(),
            Err(err) => return Err(err.into()),
        };

        let command = RemoteCommand::new(kind);
        info!(target = target_id, command = command.kind.label(), id = %command.id, "queueing remote command");
        dataset
            .command_queues
            .entry(target_id.to_string())
            .or_default()
            .push(command);

        adapter.write_dataset(&dataset).await?;
        Ok(())
    }

    /// Apply a drained command to this instance. Called from the heartbeat
    /// tick, which already removed it from the shared queue.
    pub(crate) fn execute_local(&self, command: RemoteCommand) {
        debug!(command = command.kind.label(), id = %command.id, "executing remote command");
        let event = match command.kind {
            CommandKind::Navigate { path } => {
                self.kiosk.navigate(path.clone());
                CommandEvent::Navigated { path }
            }
            CommandKind::Refresh => CommandEvent::RefreshRequested,
            CommandKind::Logout => {
                self.kiosk.logout();
                CommandEvent::LoggedOut
            }
            CommandKind::StartScreensaver => {
                self.kiosk.set_screensaver(true);
                CommandEvent::ScreensaverStarted
            }
            CommandKind::StopScreensaver => {
                self.kiosk.set_screensaver(false);
                CommandEvent::ScreensaverStopped
            }
        };
        let _ = self.events_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryAdapter;
    use crate::connection::test_manager;
    use crate::presence::SessionRegistry;
    use crate::provider::ProviderConfig;

    struct Fixture {
        registry: Arc<SessionRegistry>,
        commands: Arc<CommandChannel>,
        adapter: MemoryAdapter,
        kiosk: KioskState,
    }

    fn fixture() -> Fixture {
        let manager = test_manager();
        let adapter = MemoryAdapter::new();
        manager.adopt_adapter(
            ProviderConfig::SharedUrl {
                endpoint: "https://kiosk.example.com".into(),
            },
            Arc::new(adapter.clone()),
        );
        let kiosk = KioskState::new();
        let commands = Arc::new(CommandChannel::new(Arc::clone(&manager), kiosk.clone()));
        let registry = Arc::new(SessionRegistry::new(
            manager,
            kiosk.clone(),
            Arc::clone(&commands),
        ));
        Fixture {
            registry,
            commands,
            adapter,
            kiosk,
        }
    }

    #[tokio::test]
    async fn navigate_command_moves_the_target_and_empties_the_queue() {
        let f = fixture();
        let target = f.registry.session_id().to_string();
        f.kiosk.navigate("/exhibit/3");

        f.commands
            .send_command(&target, CommandKind::Navigate { path: "/".into() })
            .await
            .unwrap();
        assert_eq!(
            f.adapter.stored().unwrap().command_queues[&target].len(),
            1
        );

        f.registry.tick().await;

        assert_eq!(f.kiosk.snapshot().current_path, "/");
        assert!(f
            .adapter
            .stored()
            .unwrap()
            .command_queues
            .get(&target)
            .is_none());
    }

    #[tokio::test]
    async fn drained_command_does_not_reappear_on_the_next_tick() {
        let f = fixture();
        let target = f.registry.session_id().to_string();
        let mut events = f.commands.subscribe();

        f.commands
            .send_command(&target, CommandKind::StartScreensaver)
            .await
            .unwrap();

        f.registry.tick().await;
        assert_eq!(events.recv().await.unwrap(), CommandEvent::ScreensaverStarted);
        assert!(f.kiosk.snapshot().screensaver_active);

        f.registry.tick().await;
        // Exactly one execution: nothing left to receive.
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn commands_for_other_instances_stay_queued() {
        let f = fixture();
        f.commands
            .send_command("someone-else", CommandKind::Refresh)
            .await
            .unwrap();

        f.registry.tick().await;

        let stored = f.adapter.stored().unwrap();
        assert_eq!(stored.command_queues["someone-else"].len(), 1);
        assert_eq!(f.kiosk.snapshot().current_path, "/");
    }

    #[tokio::test]
    async fn logout_and_screensaver_commands_mutate_local_state() {
        let f = fixture();
        let target = f.registry.session_id().to_string();
        f.kiosk.set_logged_in_user(Some("clerk".into()));
        f.kiosk.set_screensaver(true);

        f.commands
            .send_command(&target, CommandKind::Logout)
            .await
            .unwrap();
        f.commands
            .send_command(&target, CommandKind::StopScreensaver)
            .await
            .unwrap();
        f.registry.tick().await;

        let snap = f.kiosk.snapshot();
        assert_eq!(snap.logged_in_user, None);
        assert!(!snap.screensaver_active);
    }

    #[tokio::test]
    async fn send_without_provider_is_an_explicit_error() {
        let manager = test_manager();
        let kiosk = KioskState::new();
        let commands = CommandChannel::new(manager, kiosk);
        let err = commands
            .send_command("anyone", CommandKind::Refresh)
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::Disconnected));
    }
}
