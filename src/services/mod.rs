mod batch;
mod codec;
mod embedding;
mod pipeline;
mod splitter;
mod vector_store;

pub use batch::to_batches;
pub use codec::{VectorCodec, cosine_distance, magnitude, narrow_to_f32, normalize};
pub use embedding::{EmbeddingModel, HttpEmbeddingClient, estimate_tokens};
pub use pipeline::{IngestReport, IngestionPipeline};
pub use splitter::{LineSplitter, TextSplitter};
pub use vector_store::{
    IdGenerator, MemoryBackend, PgVectorBackend, ScoredRecord, StagedRecord, UuidV4Generator,
    VectorBackend, VectorStore,
};
