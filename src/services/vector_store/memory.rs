//! In-process backend with exact cosine search.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use pgvector::Vector;
use tokio::sync::RwLock;

use super::{ScoredRecord, StagedRecord, VectorBackend};
use crate::error::BackendError;
use crate::models::{StoreConfig, StoredRecord};
use crate::services::codec::cosine_distance;

struct MemoryTable {
    dimensions: usize,
    rows: BTreeMap<String, (String, Vector)>,
}

/// Tables held in memory. Search is an exhaustive scan, so results equal
/// what an exact index would return.
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, MemoryTable>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows of `table` in id order. Empty if the table does not exist.
    pub async fn records(&self, table: &str) -> Vec<StoredRecord> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(|t| {
                t.rows
                    .iter()
                    .map(|(id, (content, embedding))| StoredRecord {
                        id: id.clone(),
                        content: content.clone(),
                        embedding: embedding.to_vec(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorBackend for MemoryBackend {
    async fn health_check(&self) -> Result<bool, BackendError> {
        Ok(true)
    }

    async fn count(&self, table: &StoreConfig) -> Result<Option<u64>, BackendError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&table.table_name)
            .map(|t| t.rows.len() as u64))
    }

    async fn ensure_schema(&self, table: &StoreConfig) -> Result<(), BackendError> {
        let mut tables = self.tables.write().await;
        let existing = tables
            .entry(table.table_name.clone())
            .or_insert_with(|| MemoryTable {
                dimensions: table.dimensions,
                rows: BTreeMap::new(),
            });

        if existing.dimensions != table.dimensions {
            return Err(BackendError::Query(format!(
                "table {} has dimension {}, expected {}",
                table.table_name, existing.dimensions, table.dimensions
            )));
        }
        Ok(())
    }

    async fn upsert_batch(
        &self,
        table: &StoreConfig,
        records: &[StagedRecord],
    ) -> Result<(), BackendError> {
        let mut tables = self.tables.write().await;
        let target = tables
            .get_mut(&table.table_name)
            .ok_or_else(|| BackendError::MissingTable(table.table_name.clone()))?;

        // Check the whole batch first so a rejected record leaves no partial write.
        if let Some(record) = records
            .iter()
            .find(|r| r.embedding.as_slice().len() != target.dimensions)
        {
            return Err(BackendError::Codec(format!(
                "record {} has dimension {}, expected {}",
                record.id,
                record.embedding.as_slice().len(),
                target.dimensions
            )));
        }

        for record in records {
            target.rows.insert(
                record.id.clone(),
                (record.content.clone(), record.embedding.clone()),
            );
        }
        Ok(())
    }

    async fn nearest(
        &self,
        table: &StoreConfig,
        query: &Vector,
        max_results: usize,
        min_score: f64,
    ) -> Result<Vec<ScoredRecord>, BackendError> {
        let tables = self.tables.read().await;
        let source = tables
            .get(&table.table_name)
            .ok_or_else(|| BackendError::MissingTable(table.table_name.clone()))?;

        let mut scored: Vec<ScoredRecord> = source
            .rows
            .iter()
            .filter_map(|(id, (content, embedding))| {
                let score = 1.0 - cosine_distance(embedding.as_slice(), query.as_slice());
                (score >= min_score).then(|| ScoredRecord {
                    id: id.clone(),
                    content: content.clone(),
                    embedding: embedding.clone(),
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(max_results);

        Ok(scored)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
