//! Configuration for the orchestration core

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the orchestrator and its concurrency gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum simultaneous in-flight model executions
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Hard bound on a single model execution, in seconds
    #[serde(default = "default_execution_timeout_secs")]
    pub execution_timeout_secs: u64,

    /// Bound on a single health probe round-trip, in seconds
    #[serde(default = "default_health_check_timeout_secs")]
    pub health_check_timeout_secs: u64,

    /// Wait estimate to report before any request has completed, in seconds
    #[serde(default = "default_wait_estimate_secs")]
    pub default_wait_estimate_secs: f64,
}

const fn default_max_concurrent() -> usize {
    3
}

const fn default_execution_timeout_secs() -> u64 {
    60
}

const fn default_health_check_timeout_secs() -> u64 {
    30
}

const fn default_wait_estimate_secs() -> f64 {
    10.0
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            execution_timeout_secs: default_execution_timeout_secs(),
            health_check_timeout_secs: default_health_check_timeout_secs(),
            default_wait_estimate_secs: default_wait_estimate_secs(),
        }
    }
}

impl OrchestratorConfig {
    /// Execution timeout as a [`Duration`]
    #[must_use]
    pub const fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }

    /// Health probe timeout as a [`Duration`]
    #[must_use]
    pub const fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout_secs)
    }
}
