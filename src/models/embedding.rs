//! Embedding values passed into the store and records persisted by it.

use serde::{Deserialize, Serialize};

/// A vector together with the text it was computed from.
///
/// Immutable once built. The store copies the vector before normalizing it,
/// so callers keep their original values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    vector: Vec<f32>,
    content: String,
}

impl Embedding {
    pub fn new(vector: Vec<f32>, content: impl Into<String>) -> Self {
        Self {
            vector,
            content: content.into(),
        }
    }

    /// An embedding with empty content.
    pub fn from_vector(vector: Vec<f32>) -> Self {
        Self::new(vector, String::new())
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    pub fn into_parts(self) -> (Vec<f32>, String) {
        (self.vector, self.content)
    }
}

/// A persisted row: store-generated id, content, unit-length vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_accessors() {
        let embedding = Embedding::new(vec![1.0, 2.0, 3.0], "hello");
        assert_eq!(embedding.dimension(), 3);
        assert_eq!(embedding.content(), "hello");
        assert_eq!(embedding.vector(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_from_vector_has_empty_content() {
        let embedding = Embedding::from_vector(vec![0.5]);
        assert_eq!(embedding.content(), "");
    }
}
