#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pgvector::Vector;
use vecstore::BackendError;
use vecstore::models::StoreConfig;
use vecstore::services::{MemoryBackend, ScoredRecord, StagedRecord, VectorBackend};

/// Memory backend that counts round-trips and can fail or stall on demand.
#[derive(Default)]
pub struct InstrumentedBackend {
    pub inner: MemoryBackend,
    pub upsert_calls: AtomicUsize,
    pub batch_sizes: std::sync::Mutex<Vec<usize>>,
    pub search_calls: AtomicUsize,
    /// Zero-based upsert call that fails.
    pub fail_on_batch: Option<usize>,
    /// Applied before every write and search.
    pub delay: Option<Duration>,
}

impl InstrumentedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(batch: usize) -> Self {
        Self {
            fail_on_batch: Some(batch),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn upserts(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorBackend for InstrumentedBackend {
    async fn health_check(&self) -> Result<bool, BackendError> {
        self.inner.health_check().await
    }

    async fn count(&self, table: &StoreConfig) -> Result<Option<u64>, BackendError> {
        self.inner.count(table).await
    }

    async fn ensure_schema(&self, table: &StoreConfig) -> Result<(), BackendError> {
        self.inner.ensure_schema(table).await
    }

    async fn upsert_batch(
        &self,
        table: &StoreConfig,
        records: &[StagedRecord],
    ) -> Result<(), BackendError> {
        let call = self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(records.len());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_on_batch == Some(call) {
            return Err(BackendError::Connection("injected failure".to_string()));
        }
        self.inner.upsert_batch(table, records).await
    }

    async fn nearest(
        &self,
        table: &StoreConfig,
        query: &Vector,
        max_results: usize,
        min_score: f64,
    ) -> Result<Vec<ScoredRecord>, BackendError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.inner
            .nearest(table, query, max_results, min_score)
            .await
    }

    fn name(&self) -> &str {
        "instrumented"
    }
}
