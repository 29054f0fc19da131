//! Adapter over an operator-granted local directory.
//!
//! Layout: `database.json` at the directory root plus an `assets/`
//! subdirectory for uploaded binaries, both created on first successful
//! write. The caller must already hold read/write access to the directory;
//! acquiring it (and prompting the operator) is a collaborator concern.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{sanitize_file_name, AssetLocator, AssetRef, StorageAdapter};
use crate::dataset::Dataset;
use crate::error::StorageError;

pub const DATASET_FILE: &str = "database.json";
pub const ASSETS_DIR: &str = "assets";

pub struct LocalDirAdapter {
    root: PathBuf,
}

impl LocalDirAdapter {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn dataset_path(&self) -> PathBuf {
        self.root.join(DATASET_FILE)
    }

    fn assets_root(&self) -> PathBuf {
        self.root.join(ASSETS_DIR)
    }
}

#[async_trait]
impl StorageAdapter for LocalDirAdapter {
    async fn read_dataset(&self) -> Result<Dataset, StorageError> {
        let raw = fs::read(self.dataset_path())
            .await
            .map_err(StorageError::from_io)?;
        serde_json::from_slice(&raw).map_err(|err| StorageError::Validation(err.to_string()))
    }

    async fn write_dataset(&self, dataset: &Dataset) -> Result<(), StorageError> {
        let serialized = serde_json::to_vec_pretty(dataset)
            .map_err(|err| StorageError::Validation(err.to_string()))?;
        fs::create_dir_all(&self.root)
            .await
            .map_err(StorageError::from_io)?;
        fs::create_dir_all(self.assets_root())
            .await
            .map_err(StorageError::from_io)?;
        fs::write(self.dataset_path(), serialized)
            .await
            .map_err(StorageError::from_io)?;
        debug!(root = %self.root.display(), "dataset written");
        Ok(())
    }

    async fn upload_asset(
        &self,
        bytes: Vec<u8>,
        suggested_name: &str,
        path_hints: &[String],
    ) -> Result<AssetRef, StorageError> {
        let name = sanitize_file_name(suggested_name);
        let mut dir = self.assets_root();
        let mut relative = PathBuf::new();
        for hint in path_hints {
            let segment = sanitize_file_name(hint);
            dir.push(&segment);
            relative.push(&segment);
        }
        fs::create_dir_all(&dir).await.map_err(StorageError::from_io)?;

        // Keep distinct uploads distinct instead of clobbering by name.
        let file_name = if dir.join(&name).exists() {
            format!("{}-{}", short_token(), name)
        } else {
            name
        };
        relative.push(&file_name);
        fs::write(dir.join(&file_name), bytes)
            .await
            .map_err(StorageError::from_io)?;
        Ok(AssetRef::new(path_to_ref(&relative)))
    }

    fn resolve_asset_url(&self, asset: &AssetRef) -> AssetLocator {
        AssetLocator::Path(self.assets_root().join(&asset.name))
    }

    async fn probe(&self) -> Result<(), StorageError> {
        let meta = fs::metadata(&self.root).await.map_err(StorageError::from_io)?;
        if !meta.is_dir() {
            return Err(StorageError::Validation(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        Ok(())
    }
}

fn short_token() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

fn path_to_ref(path: &Path) -> String {
    path.iter()
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("vitrine-local-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let adapter = LocalDirAdapter::new(scratch_dir());
        let mut dataset = Dataset::default();
        dataset.catalog = json!([{ "sku": "a-1", "price": 450 }]);
        dataset.settings = json!({ "theme": "dark" });

        adapter.write_dataset(&dataset).await.unwrap();
        let back = adapter.read_dataset().await.unwrap();
        assert_eq!(back, dataset);
    }

    #[tokio::test]
    async fn missing_dataset_reads_as_not_found() {
        let adapter = LocalDirAdapter::new(scratch_dir());
        assert_eq!(
            adapter.read_dataset().await.unwrap_err(),
            StorageError::NotFound
        );
    }

    #[tokio::test]
    async fn corrupt_dataset_reads_as_validation_error() {
        let root = scratch_dir();
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join(DATASET_FILE), b"{not json").unwrap();
        let adapter = LocalDirAdapter::new(root);
        assert!(matches!(
            adapter.read_dataset().await.unwrap_err(),
            StorageError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn probe_fails_until_directory_exists() {
        let root = scratch_dir();
        let adapter = LocalDirAdapter::new(root.clone());
        assert_eq!(adapter.probe().await.unwrap_err(), StorageError::NotFound);

        std::fs::create_dir_all(&root).unwrap();
        adapter.probe().await.unwrap();
    }

    #[tokio::test]
    async fn uploaded_asset_lands_under_hint_path() {
        let root = scratch_dir();
        let adapter = LocalDirAdapter::new(root.clone());
        let asset = adapter
            .upload_asset(b"pdf bytes".to_vec(), "menu.pdf", &["catalog".into()])
            .await
            .unwrap();
        assert_eq!(asset.name, "catalog/menu.pdf");

        match adapter.resolve_asset_url(&asset) {
            AssetLocator::Path(path) => {
                assert_eq!(std::fs::read(path).unwrap(), b"pdf bytes");
            }
            other => panic!("expected path locator, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn colliding_upload_names_stay_distinct() {
        let adapter = LocalDirAdapter::new(scratch_dir());
        let first = adapter
            .upload_asset(b"one".to_vec(), "logo.png", &[])
            .await
            .unwrap();
        let second = adapter
            .upload_asset(b"two".to_vec(), "logo.png", &[])
            .await
            .unwrap();
        assert_ne!(first, second);
        assert!(second.name.ends_with("logo.png"));
    }
}
