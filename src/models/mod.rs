mod config;
mod embedding;
mod search;

pub use config::{
    Config, DATABASE_URL_ENV, DEFAULT_DATABASE_URL, DEFAULT_DIMENSIONS, DEFAULT_EMBEDDING_URL,
    DEFAULT_TABLE_NAME, DatabaseConfig, EmbeddingConfig, IndexConfig, StoreConfig, Truncate,
};
pub use embedding::{Embedding, StoredRecord};
pub use search::{SearchQuery, SearchResult};
