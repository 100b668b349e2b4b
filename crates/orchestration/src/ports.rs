//! Port definitions for the orchestration core
//!
//! The core depends on one narrow capability: a backend that can report
//! which models are loaded and run a single bounded generation. Everything
//! else (HTTP, subprocess, RPC) lives behind this trait in an adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OrchestrationError;

/// Outcome of a single model invocation
///
/// Mirrors the (stdout, exit-success, stderr) shape of a process-style
/// backend without committing to one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeOutcome {
    /// Generated text, empty on failure
    pub output: String,
    /// Whether the backend reported success
    pub success: bool,
    /// Diagnostic detail on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl InvokeOutcome {
    /// Successful generation
    #[must_use]
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
            detail: None,
        }
    }

    /// Failed generation with diagnostic detail
    #[must_use]
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            output: String::new(),
            success: false,
            detail: Some(detail.into()),
        }
    }
}

/// Port for model backend implementations
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Names of the models the backend currently has loaded
    async fn active_models(&self) -> Result<Vec<String>, OrchestrationError>;

    /// Run one generation against `model`, bounded by `timeout`
    ///
    /// A backend-reported failure (bad exit, error payload) is an `Ok`
    /// outcome with `success == false`; `Err` is reserved for transport
    /// faults where no outcome was produced.
    async fn invoke(
        &self,
        model: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<InvokeOutcome, OrchestrationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn ModelBackend) {}

    #[test]
    fn trait_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn ModelBackend>();
    }

    #[test]
    fn outcome_ok() {
        let outcome = InvokeOutcome::ok("hello");
        assert!(outcome.success);
        assert_eq!(outcome.output, "hello");
        assert!(outcome.detail.is_none());
    }

    #[test]
    fn outcome_failed() {
        let outcome = InvokeOutcome::failed("model not loaded");
        assert!(!outcome.success);
        assert!(outcome.output.is_empty());
        assert_eq!(outcome.detail, Some("model not loaded".to_string()));
    }

    #[test]
    fn outcome_serialization_skips_empty_detail() {
        let outcome = InvokeOutcome::ok("hi");
        let json = serde_json::to_string(&outcome).expect("serialize");
        assert!(!json.contains("detail"));
    }
}
