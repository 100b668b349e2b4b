//! Model registry
//!
//! Owns the static model catalog plus all per-model runtime state: loaded
//! flags refreshed from the backend, the last health probe result, and a
//! capped per-model performance history. All mutable state sits behind one
//! lock; the registry never holds another component's lock.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use domain::{ModelCategory, ModelDescriptor};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::ports::ModelBackend;

/// Number of latency samples kept per model
const PERFORMANCE_WINDOW: usize = 100;

/// Prompt used for health probes; a single lightweight round-trip
const HEALTH_PROBE_PROMPT: &str = "Hello";

/// Whether a model is currently loaded in the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    /// Model is resident and can serve requests
    Loaded,
    /// Model is known to the catalog but not loaded
    Unloaded,
}

/// Result of a single health probe
///
/// Records never expire: a model marked healthy stays available until the
/// next explicit probe. `checked_at` lets callers apply their own staleness
/// policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Model that was probed
    pub model: String,
    /// Whether the probe round-trip succeeded
    pub healthy: bool,
    /// Probe latency in seconds; absent when the probe never completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_secs: Option<f64>,
    /// When the probe finished
    pub checked_at: DateTime<Utc>,
    /// Error description if unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    fn healthy(model: &str, elapsed_secs: f64) -> Self {
        Self {
            model: model.to_string(),
            healthy: true,
            response_time_secs: Some(elapsed_secs),
            checked_at: Utc::now(),
            error: None,
        }
    }

    fn unhealthy(model: &str, elapsed_secs: Option<f64>, error: impl Into<String>) -> Self {
        Self {
            model: model.to_string(),
            healthy: false,
            response_time_secs: elapsed_secs,
            checked_at: Utc::now(),
            error: Some(error.into()),
        }
    }
}

/// Point-in-time view of a model's recorded performance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    /// All invocations recorded for this model
    pub total_requests: u64,
    /// Invocations that succeeded
    pub successful_requests: u64,
    /// Mean latency over the retained successful samples, in seconds
    pub average_response_time_secs: f64,
    /// Number of retained samples (at most the window size)
    pub sample_count: usize,
}

/// Per-model performance history, success-only latencies capped at the
/// most recent [`PERFORMANCE_WINDOW`] samples
#[derive(Debug, Default)]
struct PerformanceHistory {
    total_requests: u64,
    successful_requests: u64,
    latencies: VecDeque<f64>,
    average: f64,
}

impl PerformanceHistory {
    fn record(&mut self, latency_secs: f64, success: bool) {
        self.total_requests += 1;
        if !success {
            return;
        }
        self.successful_requests += 1;
        self.latencies.push_back(latency_secs);
        if self.latencies.len() > PERFORMANCE_WINDOW {
            self.latencies.pop_front();
        }
        // Bounded sample set, recompute beats bookkeeping here
        #[allow(clippy::cast_precision_loss)]
        {
            self.average = self.latencies.iter().sum::<f64>() / self.latencies.len() as f64;
        }
    }

    fn snapshot(&self) -> PerformanceSnapshot {
        PerformanceSnapshot {
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            average_response_time_secs: self.average,
            sample_count: self.latencies.len(),
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    loaded: HashMap<String, LoadState>,
    health: HashMap<String, HealthReport>,
    performance: HashMap<String, PerformanceHistory>,
}

/// Catalog of known models plus their live runtime state
pub struct ModelRegistry {
    catalog: Vec<ModelDescriptor>,
    backend: Arc<dyn ModelBackend>,
    probe_timeout: Duration,
    state: Mutex<RegistryState>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("catalog", &self.catalog.len())
            .field("probe_timeout", &self.probe_timeout)
            .finish_non_exhaustive()
    }
}

impl ModelRegistry {
    /// Create a registry over an explicit catalog
    ///
    /// All models start unloaded until the first status refresh.
    #[must_use]
    pub fn new(
        catalog: Vec<ModelDescriptor>,
        backend: Arc<dyn ModelBackend>,
        probe_timeout: Duration,
    ) -> Self {
        let loaded = catalog
            .iter()
            .map(|m| (m.name.clone(), LoadState::Unloaded))
            .collect();
        Self {
            catalog,
            backend,
            probe_timeout,
            state: Mutex::new(RegistryState {
                loaded,
                health: HashMap::new(),
                performance: HashMap::new(),
            }),
        }
    }

    /// Create a registry with the default five-model catalog
    #[must_use]
    pub fn with_default_catalog(backend: Arc<dyn ModelBackend>, probe_timeout: Duration) -> Self {
        Self::new(Self::default_catalog(), backend, probe_timeout)
    }

    /// The default catalog, one model per category
    #[must_use]
    pub fn default_catalog() -> Vec<ModelDescriptor> {
        vec![
            ModelDescriptor::new("neural-chat:7b-v3.3-q4_0", ModelCategory::Fast, 4.1, 1),
            ModelDescriptor::new("llama3.1:8b", ModelCategory::General, 4.9, 2),
            ModelDescriptor::new("codellama:13b", ModelCategory::Coding, 7.4, 3),
            ModelDescriptor::new(
                "mixtral:8x7b-instruct-v0.1-q4_0",
                ModelCategory::Analysis,
                26.0,
                4,
            ),
            ModelDescriptor::new("llama3.1:70b", ModelCategory::Reasoning, 42.0, 5),
        ]
    }

    /// The static catalog, in insertion order
    #[must_use]
    pub fn list_models(&self) -> &[ModelDescriptor] {
        &self.catalog
    }

    /// Poll the backend and update loaded flags
    ///
    /// Never fails: a probe error keeps the last-known map unchanged and
    /// is only logged. Calling twice with no backend change yields
    /// identical maps.
    #[instrument(skip(self))]
    pub async fn refresh_status(&self) -> HashMap<String, LoadState> {
        match self.backend.active_models().await {
            Ok(active) => {
                let mut state = self.state.lock();
                for model in &self.catalog {
                    let load = if active.iter().any(|a| a == &model.name) {
                        LoadState::Loaded
                    } else {
                        LoadState::Unloaded
                    };
                    state.loaded.insert(model.name.clone(), load);
                }
                state.loaded.clone()
            }
            Err(e) => {
                warn!(error = %e, "Status probe failed, keeping last-known state");
                self.state.lock().loaded.clone()
            }
        }
    }

    /// Models that can serve requests right now
    ///
    /// A model qualifies if it is loaded and either has no health record
    /// or its last record says healthy (assume healthy if no data). The
    /// optional category filter applies after that; order is catalog
    /// insertion order, no sorting by health or latency.
    #[must_use]
    pub fn available_models(&self, category: Option<ModelCategory>) -> Vec<String> {
        let state = self.state.lock();
        self.catalog
            .iter()
            .filter(|m| {
                state.loaded.get(&m.name) == Some(&LoadState::Loaded)
                    && state.health.get(&m.name).is_none_or(|h| h.healthy)
            })
            .filter(|m| category.is_none_or(|c| m.category == c))
            .map(|m| m.name.clone())
            .collect()
    }

    /// Probe one model with a bounded round-trip and record the result
    ///
    /// The result is recorded into the model's runtime state before
    /// returning, regardless of outcome.
    #[instrument(skip(self))]
    pub async fn health_check(&self, name: &str) -> HealthReport {
        let start = Instant::now();

        let probed = tokio::time::timeout(
            self.probe_timeout,
            self.backend.invoke(name, HEALTH_PROBE_PROMPT, self.probe_timeout),
        )
        .await;

        let report = match probed {
            Ok(Ok(outcome)) => {
                let elapsed = start.elapsed().as_secs_f64();
                if outcome.success {
                    debug!(model = name, elapsed_secs = elapsed, "Health probe succeeded");
                    HealthReport::healthy(name, elapsed)
                } else {
                    let detail = outcome
                        .detail
                        .unwrap_or_else(|| "probe reported failure".to_string());
                    warn!(model = name, error = %detail, "Health probe unhealthy");
                    HealthReport::unhealthy(name, Some(elapsed), detail)
                }
            }
            Ok(Err(e)) => {
                warn!(model = name, error = %e, "Health probe error");
                HealthReport::unhealthy(name, None, e.to_string())
            }
            Err(_) => {
                warn!(model = name, bound_secs = self.probe_timeout.as_secs(), "Health probe timed out");
                HealthReport::unhealthy(name, Some(self.probe_timeout.as_secs_f64()), "Timeout")
            }
        };

        self.state
            .lock()
            .health
            .insert(name.to_string(), report.clone());
        report
    }

    /// Last recorded health report for a model, if any
    #[must_use]
    pub fn health_of(&self, name: &str) -> Option<HealthReport> {
        self.state.lock().health.get(name).cloned()
    }

    /// Record one invocation's latency and outcome for a model
    ///
    /// Only successful latencies enter the capped sample window; the mean
    /// is recomputed from the window on each call.
    pub fn record_performance(&self, name: &str, latency_secs: f64, success: bool) {
        self.state
            .lock()
            .performance
            .entry(name.to_string())
            .or_default()
            .record(latency_secs, success);
    }

    /// Performance snapshot for a model, if anything was recorded
    #[must_use]
    pub fn model_performance(&self, name: &str) -> Option<PerformanceSnapshot> {
        self.state
            .lock()
            .performance
            .get(name)
            .map(PerformanceHistory::snapshot)
    }

}
