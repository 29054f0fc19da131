//! Uniform storage capability set over heterogeneous backends.
//!
//! Every backend implements the same five operations; sync, presence, and
//! remote commands are all built on top of them, so a new backend gains the
//! whole coordination layer by implementing this trait.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::dataset::Dataset;
use crate::error::StorageError;
use crate::provider::ProviderConfig;

pub mod hosted;
pub mod http;
pub mod local;
pub mod memory;

pub use hosted::HostedBackendAdapter;
pub use http::HttpApiAdapter;
pub use local::LocalDirAdapter;
pub use memory::MemoryAdapter;

/// Reference to an out-of-band binary asset, stable across devices.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AssetRef {
    pub name: String,
}

impl AssetRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Where an asset can actually be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLocator {
    Url(String),
    Path(PathBuf),
}

#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Fetch the whole dataset. `NotFound` means the backend has never been
    /// written to, which callers treat as empty state.
    async fn read_dataset(&self) -> Result<Dataset, StorageError>;

    /// Replace the whole dataset.
    async fn write_dataset(&self, dataset: &Dataset) -> Result<(), StorageError>;

    /// Store a binary asset out-of-band. `path_hints` are advisory placement
    /// segments; backends that manage their own layout may ignore them.
    async fn upload_asset(
        &self,
        bytes: Vec<u8>,
        suggested_name: &str,
        path_hints: &[String],
    ) -> Result<AssetRef, StorageError>;

    /// Map an asset reference to a fetchable location. Pure, never touches
    /// the backend.
    fn resolve_asset_url(&self, asset: &AssetRef) -> AssetLocator;

    /// Cheap connectivity and auth check. Must not mutate backend state.
    async fn probe(&self) -> Result<(), StorageError>;
}

/// Single dispatch point from a provider selection to a concrete adapter.
pub fn build_adapter(config: &ProviderConfig) -> Result<Arc<dyn StorageAdapter>, StorageError> {
    match config {
        ProviderConfig::Local { root } => Ok(Arc::new(LocalDirAdapter::new(root.clone()))),
        ProviderConfig::SharedUrl { endpoint } => {
            Ok(Arc::new(HttpApiAdapter::new(endpoint, None)?))
        }
        ProviderConfig::CustomApi { endpoint, auth_key }
        | ProviderConfig::FtpBridge { endpoint, auth_key } => {
            Ok(Arc::new(HttpApiAdapter::new(endpoint, auth_key.clone())?))
        }
        ProviderConfig::Hosted {
            endpoint,
            auth_key,
            dataset_table,
            asset_bucket,
        } => Ok(Arc::new(HostedBackendAdapter::new(
            endpoint,
            auth_key,
            dataset_table,
            asset_bucket,
        )?)),
    }
}

/// Strip path separators and other hostile characters from an operator- or
/// upload-supplied file name.
pub(crate) fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            ':' | '\0' => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim_matches(['.', ' ']).to_string();
    if trimmed.is_empty() {
        format!("asset-{}", uuid::Uuid::new_v4())
    } else {
        trimmed
    }
}
