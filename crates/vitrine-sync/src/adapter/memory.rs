//! In-process adapter backed by a mutex-held dataset.
//!
//! Gives engine and registry tests (and embedders wiring up a throwaway
//! instance) a backend with injectable failures and a write gate, without a
//! filesystem or a socket.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use super::{AssetLocator, AssetRef, StorageAdapter};
use crate::dataset::Dataset;
use crate::error::StorageError;

#[derive(Default)]
struct MemoryInner {
    dataset: Mutex<Option<Dataset>>,
    assets: Mutex<BTreeMap<String, Vec<u8>>>,
    fail_reads: Mutex<Option<StorageError>>,
    fail_writes: Mutex<Option<StorageError>>,
    write_gate: Mutex<Option<Arc<Semaphore>>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MemoryAdapter {
    inner: Arc<MemoryInner>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(dataset: Dataset) -> Self {
        let adapter = Self::default();
        *adapter.inner.dataset.lock() = Some(dataset);
        adapter
    }

    /// Snapshot of the stored dataset, if any write has landed yet.
    pub fn stored(&self) -> Option<Dataset> {
        self.inner.dataset.lock().clone()
    }

    /// Every read fails with `err` until cleared with `None`.
    pub fn fail_reads(&self, err: Option<StorageError>) {
        *self.inner.fail_reads.lock() = err;
    }

    /// Every write fails with `err` until cleared with `None`.
    pub fn fail_writes(&self, err: Option<StorageError>) {
        *self.inner.fail_writes.lock() = err;
    }

    /// Block writes until permits are added to the returned semaphore. Each
    /// write consumes one permit while the gate is installed.
    pub fn gate_writes(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.inner.write_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn read_count(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    async fn read_dataset(&self) -> Result<Dataset, StorageError> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.inner.fail_reads.lock().clone() {
            return Err(err);
        }
        self.inner.dataset.lock().clone().ok_or(StorageError::NotFound)
    }

    async fn write_dataset(&self, dataset: &Dataset) -> Result<(), StorageError> {
        // Counted when the write starts so tests can observe a parked write.
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        let gate = self.inner.write_gate.lock().clone();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| StorageError::Network("write gate closed".into()))?;
            permit.forget();
        }
        if let Some(err) = self.inner.fail_writes.lock().clone() {
            return Err(err);
        }
        *self.inner.dataset.lock() = Some(dataset.clone());
        Ok(())
    }

    async fn upload_asset(
        &self,
        bytes: Vec<u8>,
        suggested_name: &str,
        path_hints: &[String],
    ) -> Result<AssetRef, StorageError> {
        let mut segments: Vec<String> = path_hints.to_vec();
        segments.push(suggested_name.to_string());
        let name = segments.join("/");
        self.inner.assets.lock().insert(name.clone(), bytes);
        Ok(AssetRef::new(name))
    }

    fn resolve_asset_url(&self, asset: &AssetRef) -> AssetLocator {
        AssetLocator::Url(format!("memory://assets/{}", asset.name))
    }

    async fn probe(&self) -> Result<(), StorageError> {
        if let Some(err) = self.inner.fail_reads.lock().clone() {
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_store_reads_as_not_found() {
        let adapter = MemoryAdapter::new();
        assert_eq!(
            adapter.read_dataset().await.unwrap_err(),
            StorageError::NotFound
        );

        adapter.write_dataset(&Dataset::default()).await.unwrap();
        assert_eq!(adapter.read_dataset().await.unwrap(), Dataset::default());
    }

    #[tokio::test]
    async fn injected_failures_surface_until_cleared() {
        let adapter = MemoryAdapter::new();
        adapter.fail_writes(Some(StorageError::Network("offline".into())));
        assert!(adapter.write_dataset(&Dataset::default()).await.is_err());

        adapter.fail_writes(None);
        adapter.write_dataset(&Dataset::default()).await.unwrap();
        assert_eq!(adapter.write_count(), 2);
    }

    #[tokio::test]
    async fn gated_write_waits_for_a_permit() {
        let adapter = MemoryAdapter::new();
        let gate = adapter.gate_writes();

        let pending = {
            let adapter = adapter.clone();
            tokio::spawn(async move { adapter.write_dataset(&Dataset::default()).await })
        };
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        gate.add_permits(1);
        pending.await.unwrap().unwrap();
        assert_eq!(adapter.write_count(), 1);
    }
}
