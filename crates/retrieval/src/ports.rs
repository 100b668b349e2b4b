//! Port definitions for the retrieval layer

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RetrievalError;

/// Result of one similarity search
///
/// The three vectors are index-aligned: `distances[i]` and `metadatas[i]`
/// describe `documents[i]`. At most `k` entries come back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    /// Matched document texts, best match first
    pub documents: Vec<String>,
    /// Similarity distances, lower is closer
    pub distances: Vec<f64>,
    /// Per-document metadata
    pub metadatas: Vec<Value>,
}

impl SearchResults {
    /// Number of matched documents
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the search matched nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Port for document stores that can serve similarity searches
#[async_trait]
pub trait DocumentSearch: Send + Sync {
    /// Return up to `k` documents relevant to `query`
    async fn search(&self, query: &str, k: usize) -> Result<SearchResults, RetrievalError>;
}
