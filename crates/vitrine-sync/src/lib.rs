//! Storage synchronization and multi-device coordination for vitrine kiosks.
//!
//! A kiosk's data (catalog, settings, media references) lives in a single
//! shared dataset that may sit in a local directory, behind a plain HTTP
//! endpoint, or inside a hosted backend. This crate owns everything below the
//! presentation layer: the storage adapters, the connection lifecycle, the
//! push/pull sync engine, heartbeat-based presence, and the polled remote
//! command channel. All coordination happens through the shared dataset;
//! there is no live socket between instances.

pub mod adapter;
pub mod command;
pub mod connection;
pub mod dataset;
pub mod device;
pub mod error;
pub mod presence;
pub mod provider;
pub mod service;
pub mod state;
pub mod sync;

#[cfg(test)]
mod tests;

pub use adapter::{build_adapter, AssetLocator, AssetRef, StorageAdapter};
pub use command::{CommandChannel, CommandEvent, SendError};
pub use connection::{ConnectionManager, TestOutcome};
pub use dataset::{CommandKind, Dataset, KioskSession, RemoteCommand};
pub use error::StorageError;
pub use presence::{is_online, is_online_at, SessionRegistry, LIVENESS_THRESHOLD};
pub use provider::ProviderConfig;
pub use service::{KioskService, ServiceConfig};
pub use state::{DatasetStore, KioskState};
pub use sync::{ConflictPolicy, SyncEngine, SyncOutcome, SyncStatus, CONFLICT_POLICY};
