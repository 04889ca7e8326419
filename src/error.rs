//! Error types for the vector store and its ingestion pipeline.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors raised by a storage backend for a single round-trip.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to connect to backend: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("table does not exist: {0}")]
    MissingTable(String),

    #[error("backend rejected vector: {0}")]
    Codec(String),
}

impl From<sqlx::Error> for BackendError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                BackendError::Connection(err.to_string())
            }
            other => BackendError::Query(other.to_string()),
        }
    }
}

impl Retryable for BackendError {
    fn is_retryable(&self) -> bool {
        match self {
            BackendError::Connection(_) => true,
            BackendError::Query(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("deadlock")
                    || msg_lower.contains("could not serialize")
            }
            BackendError::MissingTable(_) | BackendError::Codec(_) => false,
        }
    }
}

/// Errors surfaced by [`crate::services::VectorStore`].
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// Caller-supplied data violates an invariant. No work was performed.
    #[error("validation error: {0}")]
    Validation(String),

    /// Malformed search request. Raised before any backend round-trip.
    #[error("invalid search query: {0}")]
    QueryValidation(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("failed to create schema for table {table}: {source}")]
    Schema {
        table: String,
        #[source]
        source: BackendError,
    },

    /// A write batch failed. Batches before `batch_index` were committed and
    /// are not rolled back.
    #[error(
        "write to table {table} failed at batch {batch_index} ({committed} records committed before failure): {source}"
    )]
    StoreWrite {
        table: String,
        batch_index: usize,
        committed: usize,
        #[source]
        source: BackendError,
    },

    #[error("search on table {table} failed: {source}")]
    Search {
        table: String,
        #[source]
        source: BackendError,
    },

    #[error("{operation} on table {table} timed out")]
    Timeout { operation: &'static str, table: String },

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

impl VectorStoreError {
    /// Number of records known to be committed before the failure, if any.
    pub fn committed(&self) -> Option<usize> {
        match self {
            VectorStoreError::StoreWrite { committed, .. } => Some(*committed),
            _ => None,
        }
    }
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding server: {0}")]
    ConnectionError(String),

    #[error("embedding server error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("input {index} is ~{tokens} tokens, over the {limit} token budget")]
    InputTooLong {
        index: usize,
        tokens: usize,
        limit: usize,
    },

    #[error("embedding timeout")]
    Timeout,

    #[error("invalid embedding configuration: {0}")]
    InvalidConfig(String),
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            // Connection and timeout errors are retryable
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            // Server errors might be transient (e.g., 503 Service Unavailable)
            EmbeddingError::ServerError(msg) => {
                msg.contains("503")
                    || msg.contains("502")
                    || msg.contains("504")
                    || msg.contains("429")
                    || msg.to_lowercase().contains("unavailable")
                    || msg.to_lowercase().contains("too many requests")
            }
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_)
            | EmbeddingError::InputTooLong { .. }
            | EmbeddingError::InvalidConfig(_) => false,
        }
    }
}

/// Errors related to document sources.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to list {container}: {message}")]
    ListError { container: String, message: String },

    #[error("failed to read {document} from {container}: {message}")]
    ReadError {
        container: String,
        document: String,
        message: String,
    },
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors that abort an ingestion run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("document listing failed: {0}")]
    Listing(#[source] SourceError),

    #[error("embedding failed for document {document}: {source}")]
    Embedding {
        document: String,
        #[source]
        source: EmbeddingError,
    },

    #[error("storing document {document} failed: {source}")]
    Store {
        document: String,
        #[source]
        source: VectorStoreError,
    },

    #[error("ingestion cancelled after {documents_completed} documents")]
    Cancelled { documents_completed: usize },
}
