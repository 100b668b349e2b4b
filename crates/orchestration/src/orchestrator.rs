//! Request orchestrator
//!
//! The single entry point callers talk to. Composes the registry, router
//! and concurrency gate: route the query, hand it to the gate, and expose
//! status, health and recommendation views over the shared state. The
//! orchestration surface never raises; every failure becomes a resolved
//! failure record.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use domain::{ModelCategory, ModelDescriptor, Priority};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::OrchestratorConfig;
use crate::gate::{ConcurrencyGate, ExecutionHandle, ExecutionRecord, GateStatistics};
use crate::ports::ModelBackend;
use crate::registry::{HealthReport, LoadState, ModelRegistry, PerformanceSnapshot};
use crate::router::ModelRouter;

/// Counters over routing attempts, kept apart from execution statistics
///
/// An attempt counts as admitted once the gate accepts the submission;
/// what the execution later does is the gate's business.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingStatistics {
    /// Calls into the routing path
    pub total_attempts: u64,
    /// Attempts the gate admitted
    pub admitted: u64,
    /// Attempts rejected at capacity
    pub rejected: u64,
    /// Incremental mean from process start to the admission decision, in
    /// seconds
    pub average_routing_secs: f64,
}

impl RoutingStatistics {
    fn observe(&mut self, elapsed_secs: f64, admitted: bool) {
        self.total_attempts += 1;
        if admitted {
            self.admitted += 1;
        } else {
            self.rejected += 1;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.total_attempts as f64;
        self.average_routing_secs = (self.average_routing_secs * (n - 1.0) + elapsed_secs) / n;
    }
}

/// Aggregate request statistics, the gate's counters plus the running flag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationStatistics {
    /// Terminal outcomes observed
    pub total_requests: u64,
    /// Terminal outcomes that succeeded
    pub completed_requests: u64,
    /// Terminal outcomes that failed
    pub failed_requests: u64,
    /// Mean of successful execution times, in seconds
    pub average_response_time_secs: f64,
    /// in-flight / capacity, in [0, 1]
    pub current_load: f64,
    /// Requests currently executing
    pub active_requests: usize,
    /// Admission bound
    pub capacity: usize,
    /// Routing-attempt counters
    pub routing: RoutingStatistics,
    /// Whether the orchestrator is accepting work
    pub running: bool,
}

impl OrchestrationStatistics {
    fn from_gate(stats: GateStatistics, routing: RoutingStatistics, running: bool) -> Self {
        Self {
            total_requests: stats.total_requests,
            completed_requests: stats.completed_requests,
            failed_requests: stats.failed_requests,
            average_response_time_secs: stats.average_response_time_secs,
            current_load: stats.current_load,
            active_requests: stats.active_requests,
            capacity: stats.capacity,
            routing,
            running,
        }
    }
}

/// Per-model line in a system status report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatus {
    /// Model name
    pub name: String,
    /// Catalog category
    pub category: ModelCategory,
    /// Approximate on-disk size in gigabytes
    pub size_gb: f64,
    /// Whether the backend currently has the model loaded
    pub loaded: bool,
    /// Last health probe, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthReport>,
    /// Recorded performance, if anything completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceSnapshot>,
}

/// Live view over the whole system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    /// Every catalog model with its runtime state
    pub models: Vec<ModelStatus>,
    /// Aggregate request statistics
    pub statistics: OrchestrationStatistics,
    /// When the snapshot was taken
    pub generated_at: DateTime<Utc>,
}

/// Model recommendation for a query, with a wait estimate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    /// The query as received
    pub query: String,
    /// Detected category
    pub category: ModelCategory,
    /// Model the router would pick right now
    pub recommended_model: String,
    /// Rough wait estimate in seconds, scaled by current load
    pub estimated_wait_secs: f64,
    /// in-flight / capacity at estimation time
    pub current_load: f64,
}

/// Scale the average response time by how busy the system is
///
/// Monotone in both arguments: more load or a slower average never lowers
/// the estimate.
fn estimate_wait(average_secs: f64, load: f64) -> f64 {
    average_secs * (1.0 + load)
}

/// Facade over registry, router and gate
pub struct Orchestrator {
    registry: Arc<ModelRegistry>,
    router: ModelRouter,
    gate: ConcurrencyGate,
    config: OrchestratorConfig,
    routing_stats: Mutex<RoutingStatistics>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Build an orchestrator over the default catalog
    #[must_use]
    pub fn new(backend: Arc<dyn ModelBackend>, config: OrchestratorConfig) -> Self {
        Self::with_catalog(ModelRegistry::default_catalog(), backend, config)
    }

    /// Build an orchestrator over an explicit catalog
    #[must_use]
    pub fn with_catalog(
        catalog: Vec<ModelDescriptor>,
        backend: Arc<dyn ModelBackend>,
        config: OrchestratorConfig,
    ) -> Self {
        let registry = Arc::new(ModelRegistry::new(
            catalog,
            Arc::clone(&backend),
            config.health_check_timeout(),
        ));
        let router = ModelRouter::new(Arc::clone(&registry));
        let gate = ConcurrencyGate::new(
            config.max_concurrent,
            config.execution_timeout(),
            backend,
            Arc::clone(&registry),
        );
        gate.start();
        info!(
            max_concurrent = config.max_concurrent,
            execution_timeout_secs = config.execution_timeout_secs,
            "Orchestrator initialized"
        );
        Self {
            registry,
            router,
            gate,
            config,
            routing_stats: Mutex::new(RoutingStatistics::default()),
        }
    }

    /// Classify a query without executing anything
    #[must_use]
    pub fn classify(query: &str) -> ModelCategory {
        ModelRouter::classify(query)
    }

    /// Route a query and hand it to the gate
    ///
    /// Never raises: a rejected submission resolves immediately with a
    /// failure record whose error starts with "Orchestration failed: ".
    /// A non-empty `user_preference` overrides the routed model; the query
    /// is still classified for reporting.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn process(
        &self,
        query: &str,
        priority: Priority,
        user_preference: Option<&str>,
    ) -> ExecutionHandle {
        let routing_start = Instant::now();
        let decision = self.router.route(query, priority).await;
        let model = user_preference
            .filter(|p| !p.trim().is_empty())
            .map_or(decision.selected_model, ToString::to_string);

        let submitted = self.gate.submit(query, &model, priority);
        self.routing_stats
            .lock()
            .observe(routing_start.elapsed().as_secs_f64(), submitted.is_ok());

        match submitted {
            Ok(handle) => handle,
            Err(e) => {
                warn!(model = %model, error = %e, "Submission rejected");
                ExecutionHandle::ready(ExecutionRecord::failure(
                    query,
                    model,
                    format!("Orchestration failed: {e}"),
                    0.0,
                ))
            }
        }
    }

    /// Process a query and wait for the result, bounded by `timeout`
    ///
    /// Falls back to the execution timeout when no bound is given. On
    /// expiry the caller gets a failure record immediately; the underlying
    /// execution is not cancelled and still settles the statistics.
    pub async fn process_sync(
        &self,
        query: &str,
        priority: Priority,
        user_preference: Option<&str>,
        timeout: Option<Duration>,
    ) -> ExecutionRecord {
        let bound = timeout.unwrap_or_else(|| self.config.execution_timeout());
        let handle = self.process(query, priority, user_preference).await;
        let request_id = handle.request_id().to_string();
        let model = handle.model().to_string();

        match tokio::time::timeout(bound, handle.wait()).await {
            Ok(record) => record,
            Err(_) => {
                warn!(request_id = %request_id, bound_secs = bound.as_secs(), "Caller wait expired");
                let mut record = ExecutionRecord::failure(
                    query,
                    model,
                    format!(
                        "Request timeout or failed: no result within {}s",
                        bound.as_secs()
                    ),
                    bound.as_secs_f64(),
                );
                record.request_id = request_id;
                record
            }
        }
    }

    /// Refresh loaded flags and report the full system state
    pub async fn system_status(&self) -> SystemStatus {
        let loaded = self.registry.refresh_status().await;
        let models = self
            .registry
            .list_models()
            .iter()
            .map(|m| ModelStatus {
                name: m.name.clone(),
                category: m.category,
                size_gb: m.size_gb,
                loaded: loaded.get(&m.name) == Some(&LoadState::Loaded),
                health: self.registry.health_of(&m.name),
                performance: self.registry.model_performance(&m.name),
            })
            .collect();

        SystemStatus {
            models,
            statistics: self.statistics(),
            generated_at: Utc::now(),
        }
    }

    /// Probe every catalog model sequentially and record the results
    pub async fn health_check_all(&self) -> HashMap<String, HealthReport> {
        let names: Vec<String> = self
            .registry
            .list_models()
            .iter()
            .map(|m| m.name.clone())
            .collect();

        let mut reports = HashMap::with_capacity(names.len());
        for name in names {
            let report = self.registry.health_check(&name).await;
            reports.insert(name, report);
        }
        reports
    }

    /// Recommend a model for a query with a load-scaled wait estimate
    ///
    /// Before any request has completed the estimate starts from the
    /// configured default instead of zero.
    pub async fn recommendations(&self, query: &str) -> Recommendation {
        let decision = self.router.route(query, Priority::default()).await;
        let stats = self.gate.stats();

        let average = if stats.completed_requests == 0 {
            self.config.default_wait_estimate_secs
        } else {
            stats.average_response_time_secs
        };

        Recommendation {
            query: decision.query,
            category: decision.category,
            recommended_model: decision.selected_model,
            estimated_wait_secs: estimate_wait(average, stats.current_load),
            current_load: stats.current_load,
        }
    }

    /// Aggregate request statistics
    #[must_use]
    pub fn statistics(&self) -> OrchestrationStatistics {
        OrchestrationStatistics::from_gate(
            self.gate.stats(),
            self.routing_stats.lock().clone(),
            self.gate.is_running(),
        )
    }

    /// Stop accepting work and wait for in-flight requests to drain
    pub async fn shutdown(&self) {
        info!("Orchestrator shutting down");
        self.gate.stop().await;
    }
}
