//! Search request and result values.

use serde::{Deserialize, Serialize};

/// A similarity search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Query vector, same dimension as the store.
    pub vector: Vec<f32>,

    /// Maximum rows to return.
    pub max_results: usize,

    /// Rows scoring below this similarity (range -1.0..=1.0) are dropped.
    pub min_score: f64,
}

impl SearchQuery {
    /// A query returning the single best match with no score threshold.
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            max_results: 1,
            min_score: 0.0,
        }
    }

    /// Set the result limit.
    #[must_use]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Set the minimum score threshold.
    #[must_use]
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }
}

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,

    pub content: String,

    /// Stored (unit-length) vector.
    pub vector: Vec<f32>,

    /// `1 - cosine_distance`, in -1.0..=1.0.
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_defaults() {
        let query = SearchQuery::new(vec![1.0, 0.0]);
        assert_eq!(query.max_results, 1);
        assert_eq!(query.min_score, 0.0);
    }

    #[test]
    fn test_search_query_builder() {
        let query = SearchQuery::new(vec![1.0])
            .with_max_results(20)
            .with_min_score(0.5);

        assert_eq!(query.max_results, 20);
        assert_eq!(query.min_score, 0.5);
    }
}
