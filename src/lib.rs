//! Text embedding ingestion and cosine similarity search over a single
//! vector table.

pub mod error;
pub mod models;
pub mod services;
pub mod sources;
pub mod utils;

pub use error::{BackendError, PipelineError, VectorStoreError};
pub use models::{Config, Embedding, SearchQuery, SearchResult, StoreConfig};
pub use services::{IngestionPipeline, VectorStore};
