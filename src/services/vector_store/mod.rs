//! Vector storage and similarity search.
//!
//! [`VectorStore`] owns validation, id generation, normalization and write
//! batching. Backends behind the [`VectorBackend`] trait only execute the
//! resulting round-trips: PostgreSQL/pgvector for production and an
//! in-process backend with the same semantics for tests and embedded use.

mod memory;
mod pgvector;

pub use memory::MemoryBackend;
pub use pgvector::PgVectorBackend;

use std::future::Future;
use std::sync::Arc;

use ::pgvector::Vector;
use async_trait::async_trait;
use tracing::{debug, error, info};

use super::batch::to_batches;
use super::codec::VectorCodec;
use crate::error::{BackendError, VectorStoreError};
use crate::models::{DatabaseConfig, Embedding, SearchQuery, SearchResult, StoreConfig};

/// A row ready to be written: fresh id, content, normalized vector.
#[derive(Debug, Clone)]
pub struct StagedRecord {
    pub id: String,
    pub content: String,
    pub embedding: Vector,
}

/// A row returned by a similarity query.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub id: String,
    pub content: String,
    pub embedding: Vector,
    /// `1 - cosine_distance(embedding, query)`
    pub score: f64,
}

/// Storage operations a backend must provide.
///
/// Each call acquires whatever connection it needs and releases it before
/// returning, including on error or when the future is dropped.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Check if the backend is reachable.
    async fn health_check(&self) -> Result<bool, BackendError>;

    /// Row count, or `None` when the table does not exist.
    async fn count(&self, table: &StoreConfig) -> Result<Option<u64>, BackendError>;

    /// Create the table and its cosine ANN index if missing. Idempotent.
    async fn ensure_schema(&self, table: &StoreConfig) -> Result<(), BackendError>;

    /// Insert-or-update `records` keyed by id, all-or-nothing.
    async fn upsert_batch(
        &self,
        table: &StoreConfig,
        records: &[StagedRecord],
    ) -> Result<(), BackendError>;

    /// Up to `max_results` rows scoring at least `min_score`, best first.
    async fn nearest(
        &self,
        table: &StoreConfig,
        query: &Vector,
        max_results: usize,
        min_score: f64,
    ) -> Result<Vec<ScoredRecord>, BackendError>;

    fn name(&self) -> &str;
}

/// Source of record ids.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random UUID v4 ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV4Generator;

impl IdGenerator for UuidV4Generator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// A single table of `(id, content, embedding)` records.
///
/// Holds no records in memory; every call goes to the backend.
pub struct VectorStore {
    backend: Arc<dyn VectorBackend>,
    config: StoreConfig,
    codec: VectorCodec,
    ids: Arc<dyn IdGenerator>,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    pub fn new(
        backend: Arc<dyn VectorBackend>,
        config: StoreConfig,
    ) -> Result<Self, VectorStoreError> {
        config
            .validate()
            .map_err(|e| VectorStoreError::Validation(e.to_string()))?;

        Ok(Self {
            backend,
            codec: VectorCodec::new(config.dimensions),
            config,
            ids: Arc::new(UuidV4Generator),
        })
    }

    /// Connect a pooled PostgreSQL backend.
    pub async fn connect(
        database: &DatabaseConfig,
        config: StoreConfig,
    ) -> Result<Self, VectorStoreError> {
        let backend = PgVectorBackend::connect(database).await?;
        Self::new(Arc::new(backend), config)
    }

    pub fn in_memory(config: StoreConfig) -> Result<Self, VectorStoreError> {
        Self::new(Arc::new(MemoryBackend::new()), config)
    }

    /// Replace the id strategy.
    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    pub fn table_name(&self) -> &str {
        &self.config.table_name
    }

    pub async fn health_check(&self) -> Result<bool, VectorStoreError> {
        Ok(self.bounded("health check", self.backend.health_check()).await??)
    }

    /// Row count, or `None` when the table has not been created.
    pub async fn count(&self) -> Result<Option<u64>, VectorStoreError> {
        Ok(self.bounded("count", self.backend.count(&self.config)).await??)
    }

    /// Create the table and ANN index. Safe to call on every startup.
    pub async fn create_schema_if_not_exists(&self) -> Result<(), VectorStoreError> {
        self.bounded("schema creation", self.backend.ensure_schema(&self.config))
            .await?
            .map_err(|source| VectorStoreError::Schema {
                table: self.config.table_name.clone(),
                source,
            })?;

        info!(
            table = %self.config.table_name,
            dimensions = self.config.dimensions,
            backend = self.backend.name(),
            "vector table ready"
        );
        Ok(())
    }

    /// Store one embedding. Returns its generated id.
    pub async fn add(&self, embedding: &Embedding) -> Result<String, VectorStoreError> {
        let mut ids = self.add_all(std::slice::from_ref(embedding)).await?;
        ids.pop().ok_or_else(|| {
            VectorStoreError::Validation("no id generated for embedding".to_string())
        })
    }

    /// Store embeddings under freshly generated ids, in batches.
    ///
    /// Every embedding is validated and encoded before the first write. Batches
    /// are written in input order, one transaction each. When a batch fails,
    /// the batches before it stay committed and the error reports how many
    /// records they held.
    ///
    /// Ids are minted per call: calling again with the same embeddings writes
    /// new rows rather than replacing the earlier ones.
    pub async fn add_all(&self, embeddings: &[Embedding]) -> Result<Vec<String>, VectorStoreError> {
        if embeddings.is_empty() {
            return Ok(Vec::new());
        }

        let staged = self.stage(embeddings)?;
        let ids: Vec<String> = staged.iter().map(|r| r.id.clone()).collect();
        let mut committed = 0;

        for (batch_index, batch) in to_batches(&staged, self.config.write_batch_size)?
            .into_iter()
            .enumerate()
        {
            let result = match self
                .bounded("write", self.backend.upsert_batch(&self.config, batch))
                .await
            {
                Ok(result) => result,
                Err(timeout) => Err(BackendError::Connection(timeout.to_string())),
            };

            if let Err(source) = result {
                error!(
                    table = %self.config.table_name,
                    batch_index,
                    committed,
                    error = %source,
                    "write batch failed"
                );
                return Err(VectorStoreError::StoreWrite {
                    table: self.config.table_name.clone(),
                    batch_index,
                    committed,
                    source,
                });
            }

            committed += batch.len();
            debug!(
                table = %self.config.table_name,
                batch_index,
                records = batch.len(),
                committed,
                "write batch committed"
            );
        }

        Ok(ids)
    }

    /// Most similar records to `query.vector`, best first.
    ///
    /// The backing index is approximate; on large tables the result can miss
    /// rows an exhaustive scan would return.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, VectorStoreError> {
        self.validate_query(query)?;
        let query_vector = self.codec.to_storage_form(&query.vector)?;

        let rows = self
            .bounded(
                "search",
                self.backend.nearest(
                    &self.config,
                    &query_vector,
                    query.max_results,
                    query.min_score,
                ),
            )
            .await?
            .map_err(|source| VectorStoreError::Search {
                table: self.config.table_name.clone(),
                source,
            })?;

        let mut results = Vec::with_capacity(rows.len());
        // Zero vectors score NaN and never pass the threshold.
        for row in rows
            .into_iter()
            .filter(|row| row.score >= query.min_score)
            .take(query.max_results)
        {
            results.push(SearchResult {
                id: row.id,
                content: row.content,
                vector: self.codec.to_numeric_array(row.embedding)?,
                score: row.score,
            });
        }

        debug!(
            table = %self.config.table_name,
            max_results = query.max_results,
            min_score = query.min_score,
            returned = results.len(),
            "search completed"
        );
        Ok(results)
    }

    fn stage(&self, embeddings: &[Embedding]) -> Result<Vec<StagedRecord>, VectorStoreError> {
        if let Some((index, embedding)) = embeddings
            .iter()
            .enumerate()
            .find(|(_, e)| e.dimension() != self.config.dimensions)
        {
            return Err(VectorStoreError::Validation(format!(
                "embedding {index} has dimension {}, table {} expects {}",
                embedding.dimension(),
                self.config.table_name,
                self.config.dimensions
            )));
        }

        embeddings
            .iter()
            .map(|embedding| {
                Ok(StagedRecord {
                    id: self.ids.generate(),
                    content: embedding.content().to_string(),
                    embedding: self.codec.to_storage_form(embedding.vector())?,
                })
            })
            .collect()
    }

    fn validate_query(&self, query: &SearchQuery) -> Result<(), VectorStoreError> {
        if query.max_results == 0 {
            return Err(VectorStoreError::QueryValidation(
                "max_results must be positive".to_string(),
            ));
        }
        if query.vector.len() != self.config.dimensions {
            return Err(VectorStoreError::QueryValidation(format!(
                "query vector has dimension {}, table {} expects {}",
                query.vector.len(),
                self.config.table_name,
                self.config.dimensions
            )));
        }
        if query.vector.iter().any(|v| !v.is_finite()) {
            return Err(VectorStoreError::QueryValidation(
                "query vector has non-finite components".to_string(),
            ));
        }
        if query.min_score.is_nan() {
            return Err(VectorStoreError::QueryValidation(
                "min_score is NaN".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply the configured operation timeout to a backend call.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, BackendError>>,
    ) -> Result<Result<T, BackendError>, VectorStoreError> {
        match self.config.operation_timeout() {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                VectorStoreError::Timeout {
                    operation,
                    table: self.config.table_name.clone(),
                }
            }),
            None => Ok(call.await),
        }
    }
}
