//! Orchestration errors

use thiserror::Error;

/// Errors that can occur in the orchestration core
///
/// `AtCapacity` is the only error a caller of `submit` is expected to
/// branch on; everything downstream of admission is reported through the
/// `success` flag of an execution record rather than raised.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Gate refused admission; recoverable, retry later or fail fast
    #[error("at capacity: {capacity} requests in flight")]
    AtCapacity {
        /// The gate's fixed capacity
        capacity: usize,
    },

    /// Model invocation exceeded its execution bound
    #[error("execution timed out after {0}s")]
    ExecutionTimeout(u64),

    /// Status or health probe against the backend failed
    #[error("probe failed: {0}")]
    Probe(String),

    /// Backend invocation failed before producing an outcome
    #[error("backend error: {0}")]
    Backend(String),
}

impl OrchestrationError {
    /// Check if this error is recoverable by retrying later
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::AtCapacity { .. })
    }
}
