//! Document ingestion: source -> splitter -> embedding model -> vector store.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::embedding::EmbeddingModel;
use super::splitter::TextSplitter;
use super::vector_store::VectorStore;
use crate::error::PipelineError;
use crate::sources::DocumentSource;

/// Counters for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents_listed: usize,
    pub documents_ingested: usize,
    /// Documents that could not be read and were left out.
    pub documents_skipped: usize,
    pub chunks_embedded: usize,
    pub records_written: usize,
}

/// Wires a document source and an embedding model into a [`VectorStore`].
///
/// An unreadable document is logged and skipped; the rest of the listing is
/// still ingested. Embedding and store failures abort the run, since the
/// document they belong to can no longer be stored completely.
pub struct IngestionPipeline {
    source: Arc<dyn DocumentSource>,
    splitter: Arc<dyn TextSplitter>,
    embedder: Arc<dyn EmbeddingModel>,
    store: Arc<VectorStore>,
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        splitter: Arc<dyn TextSplitter>,
        embedder: Arc<dyn EmbeddingModel>,
        store: Arc<VectorStore>,
    ) -> Self {
        Self {
            source,
            splitter,
            embedder,
            store,
        }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Ingest every document in `container` under `prefix`.
    ///
    /// Triggering `cancel` drops the in-flight call (rolling back any open
    /// write transaction) and returns [`PipelineError::Cancelled`]. Records of
    /// documents completed before that stay stored.
    pub async fn run(
        &self,
        container: &str,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<IngestReport, PipelineError> {
        let mut report = IngestReport::default();

        let ids = until_cancelled(cancel, 0, self.source.list_documents(container, prefix))
            .await?
            .map_err(PipelineError::Listing)?;
        report.documents_listed = ids.len();

        for id in &ids {
            let read = until_cancelled(
                cancel,
                report.documents_ingested,
                self.source.read_document_text(container, id),
            )
            .await?;

            let text = match read {
                Ok(text) => text,
                Err(error) => {
                    warn!(
                        container,
                        document = %id,
                        error = %error,
                        "skipping unreadable document"
                    );
                    report.documents_skipped += 1;
                    continue;
                }
            };

            let chunks = self.splitter.split(&text);
            let embeddings = until_cancelled(
                cancel,
                report.documents_ingested,
                self.embedder.embed_all(&chunks),
            )
            .await?
            .map_err(|source| PipelineError::Embedding {
                document: id.clone(),
                source,
            })?;
            report.chunks_embedded += embeddings.len();

            let written = until_cancelled(
                cancel,
                report.documents_ingested,
                self.store.add_all(&embeddings),
            )
            .await?
            .map_err(|source| PipelineError::Store {
                document: id.clone(),
                source,
            })?;
            report.records_written += written.len();
            report.documents_ingested += 1;

            debug!(
                document = %id,
                chunks = chunks.len(),
                records = written.len(),
                "document ingested"
            );
        }

        info!(
            container,
            prefix,
            table = self.store.table_name(),
            listed = report.documents_listed,
            ingested = report.documents_ingested,
            skipped = report.documents_skipped,
            records = report.records_written,
            "ingestion finished"
        );
        Ok(report)
    }
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    documents_completed: usize,
    call: impl Future<Output = T>,
) -> Result<T, PipelineError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(PipelineError::Cancelled { documents_completed }),
        output = call => Ok(output),
    }
}
