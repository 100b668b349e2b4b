//! Retrieval error types

use thiserror::Error;

/// Errors from the retrieval layer
///
/// Generation failures do not appear here; they surface as unsuccessful
/// results, the same as everywhere else in the orchestration path.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The document store could not serve the search
    #[error("document search failed: {0}")]
    Search(String),
}
