//! Embedding providers.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::batch::to_batches;
use crate::error::EmbeddingError;
use crate::models::{Embedding, EmbeddingConfig, Truncate};
use crate::utils::retry::{RetryConfig, with_retry};

/// Turns text chunks into embeddings, one per chunk, in input order.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed_all(&self, chunks: &[String]) -> Result<Vec<Embedding>, EmbeddingError>;
}

/// Estimate the number of tokens in a text.
/// Uses a simple heuristic: ~4 characters per token on average.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Request body for the /embed endpoint.
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
    truncate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    truncation_direction: Option<&'static str>,
}

impl<'a> EmbedRequest<'a> {
    fn new(inputs: &'a [String], truncate: Truncate) -> Self {
        let (truncate, truncation_direction) = match truncate {
            Truncate::None => (false, None),
            Truncate::Start => (true, Some("Left")),
            Truncate::End => (true, Some("Right")),
        };
        Self {
            inputs,
            truncate,
            truncation_direction,
        }
    }
}

/// Client for a text-embeddings-inference compatible server.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingClient {
    client: Client,
    base_url: String,
    batch_size: usize,
    max_input_tokens: usize,
    truncate: Truncate,
    retry: RetryConfig,
}

impl HttpEmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        if config.batch_size == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            batch_size: config.batch_size,
            max_input_tokens: config.max_input_tokens,
            truncate: config.truncate,
            retry: RetryConfig::new(config.max_attempts),
        })
    }

    pub fn with_defaults() -> Result<Self, EmbeddingError> {
        Self::new(&EmbeddingConfig::default())
    }

    /// Get the base URL of the embedding server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Without truncation the server would reject oversized inputs; fail
    /// before sending anything.
    fn check_budget(&self, chunks: &[String]) -> Result<(), EmbeddingError> {
        if self.truncate != Truncate::None {
            return Ok(());
        }
        for (index, chunk) in chunks.iter().enumerate() {
            let tokens = estimate_tokens(chunk);
            if tokens > self.max_input_tokens {
                return Err(EmbeddingError::InputTooLong {
                    index,
                    tokens,
                    limit: self.max_input_tokens,
                });
            }
        }
        Ok(())
    }

    async fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/embed", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest::new(texts, self.truncate))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout
                } else if e.is_connect() {
                    EmbeddingError::ConnectionError(e.to_string())
                } else {
                    EmbeddingError::RequestError(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ServerError(format!(
                "status {}: {}",
                status, body
            )));
        }

        let vectors: Vec<Vec<f32>> = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        if vectors.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingModel for HttpEmbeddingClient {
    async fn embed_all(&self, chunks: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        self.check_budget(chunks)?;

        let batches = to_batches(chunks, self.batch_size)
            .map_err(|e| EmbeddingError::InvalidConfig(e.to_string()))?;
        let mut embeddings = Vec::with_capacity(chunks.len());

        for batch in batches {
            let vectors = with_retry(&self.retry, "embed", || self.embed_single_batch(batch)).await?;
            embeddings.extend(
                vectors
                    .into_iter()
                    .zip(batch)
                    .map(|(vector, text)| Embedding::new(vector, text.clone())),
            );
        }

        Ok(embeddings)
    }
}
