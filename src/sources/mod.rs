//! Document sources feeding the ingestion pipeline.

mod local;

pub use local::LocalDirectorySource;

use async_trait::async_trait;

use crate::error::SourceError;

/// A store of text documents grouped into containers (buckets, directories).
///
/// Listings never include directory placeholders or zero-length entries, and
/// cover every page of the underlying listing API.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Ids of all documents in `container` whose id starts with `prefix`.
    async fn list_documents(&self, container: &str, prefix: &str)
    -> Result<Vec<String>, SourceError>;

    /// Full text of one document.
    async fn read_document_text(&self, container: &str, id: &str) -> Result<String, SourceError>;
}
