//! Concurrency gate
//!
//! Accepts or rejects new work against a fixed capacity and runs accepted
//! requests asynchronously without blocking the caller. Admission (the
//! capacity check plus the in-flight insert) happens under one lock, so the
//! in-flight count can never exceed capacity under concurrent submission.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use domain::Priority;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, oneshot};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::OrchestrationError;
use crate::ports::ModelBackend;
use crate::registry::ModelRegistry;

/// A request the gate has admitted but not yet completed
///
/// Owned exclusively by the gate while executing; removed on every
/// terminal outcome, including timeouts and faults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InFlightRequest {
    /// Unique request id
    pub request_id: Uuid,
    /// Query text being executed
    pub query: String,
    /// Target model
    pub model: String,
    /// Caller's priority hint
    pub priority: Priority,
    /// When the gate admitted the request
    pub submitted_at: DateTime<Utc>,
}

/// Uniform record for the three terminal outcomes of an execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Id of the request that produced this record
    pub request_id: String,
    /// Query text as executed
    pub query: String,
    /// Model the request ran against
    pub model: String,
    /// Generated text on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Error description on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock execution time in seconds
    pub response_time_secs: f64,
    /// When execution started
    pub timestamp: DateTime<Utc>,
    /// Whether the underlying call signalled success
    pub success: bool,
}

impl ExecutionRecord {
    /// Build a failure record outside the gate's execution path
    ///
    /// Used by callers that must hand out a resolved result without ever
    /// having admitted the request.
    #[must_use]
    pub fn failure(
        query: impl Into<String>,
        model: impl Into<String>,
        error: impl Into<String>,
        elapsed_secs: f64,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            query: query.into(),
            model: model.into(),
            response: None,
            error: Some(error.into()),
            response_time_secs: elapsed_secs,
            timestamp: Utc::now(),
            success: false,
        }
    }
}

/// Handle to an in-flight (or already resolved) execution
///
/// Awaiting the handle never raises; if the worker vanishes the handle
/// synthesizes a failure record from the context it kept.
#[derive(Debug)]
pub struct ExecutionHandle {
    rx: oneshot::Receiver<ExecutionRecord>,
    request_id: String,
    query: String,
    model: String,
}

impl ExecutionHandle {
    fn new(rx: oneshot::Receiver<ExecutionRecord>, request: &InFlightRequest) -> Self {
        Self {
            rx,
            request_id: request.request_id.to_string(),
            query: request.query.clone(),
            model: request.model.clone(),
        }
    }

    /// Wrap an already-terminal record in a resolved handle
    #[must_use]
    pub fn ready(record: ExecutionRecord) -> Self {
        let (tx, rx) = oneshot::channel();
        let request_id = record.request_id.clone();
        let query = record.query.clone();
        let model = record.model.clone();
        // Receiver is held right here; the send cannot fail
        let _ = tx.send(record);
        Self {
            rx,
            request_id,
            query,
            model,
        }
    }

    /// Id of the request this handle tracks
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Model the tracked request targets
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Wait for the terminal record
    pub async fn wait(self) -> ExecutionRecord {
        match self.rx.await {
            Ok(record) => record,
            Err(_) => {
                warn!(request_id = %self.request_id, "Execution task dropped before resolving");
                let mut record = ExecutionRecord::failure(
                    self.query,
                    self.model,
                    "execution task dropped",
                    0.0,
                );
                record.request_id = self.request_id;
                record
            }
        }
    }
}

/// Point-in-time gate statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateStatistics {
    /// Terminal outcomes observed
    pub total_requests: u64,
    /// Terminal outcomes with success == true
    pub completed_requests: u64,
    /// Terminal outcomes with success == false
    pub failed_requests: u64,
    /// Incremental mean of successful execution times, in seconds
    pub average_response_time_secs: f64,
    /// in-flight / capacity, in [0, 1]
    pub current_load: f64,
    /// Requests currently executing
    pub active_requests: usize,
    /// Fixed admission bound
    pub capacity: usize,
}

/// Running counters shared with the worker tasks
#[derive(Debug, Default)]
struct GateCounters {
    total_requests: u64,
    completed_requests: u64,
    failed_requests: u64,
    average_response_time_secs: f64,
}

impl GateCounters {
    /// Fold one terminal outcome into the counters
    ///
    /// The mean covers successful elapsed times only and is updated
    /// incrementally: `new = (old * (n - 1) + x) / n`.
    fn observe(&mut self, elapsed_secs: f64, success: bool) {
        self.total_requests += 1;
        if success {
            self.completed_requests += 1;
            #[allow(clippy::cast_precision_loss)]
            let n = self.completed_requests as f64;
            self.average_response_time_secs =
                (self.average_response_time_secs * (n - 1.0) + elapsed_secs) / n;
        } else {
            self.failed_requests += 1;
        }
    }
}

#[derive(Debug, Default)]
struct GateInner {
    in_flight: HashMap<Uuid, InFlightRequest>,
    counters: GateCounters,
}

/// Capacity-bounded executor for admitted requests
pub struct ConcurrencyGate {
    capacity: usize,
    execution_timeout: Duration,
    backend: Arc<dyn ModelBackend>,
    registry: Arc<ModelRegistry>,
    inner: Arc<Mutex<GateInner>>,
    drained: Arc<Notify>,
    running: AtomicBool,
}

impl std::fmt::Debug for ConcurrencyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrencyGate")
            .field("capacity", &self.capacity)
            .field("execution_timeout", &self.execution_timeout)
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl ConcurrencyGate {
    /// Create a gate with a fixed capacity
    #[must_use]
    pub fn new(
        capacity: usize,
        execution_timeout: Duration,
        backend: Arc<dyn ModelBackend>,
        registry: Arc<ModelRegistry>,
    ) -> Self {
        Self {
            capacity,
            execution_timeout,
            backend,
            registry,
            inner: Arc::new(Mutex::new(GateInner::default())),
            drained: Arc::new(Notify::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Whether a new submission would currently be admitted
    #[must_use]
    pub fn can_accept(&self) -> bool {
        self.inner.lock().in_flight.len() < self.capacity
    }

    /// in-flight / capacity, in [0, 1]
    #[must_use]
    pub fn current_load(&self) -> f64 {
        let in_flight = self.inner.lock().in_flight.len();
        #[allow(clippy::cast_precision_loss)]
        let load = in_flight as f64 / self.capacity.max(1) as f64;
        load
    }

    /// Snapshot of the requests currently executing
    #[must_use]
    pub fn in_flight_snapshot(&self) -> Vec<InFlightRequest> {
        self.inner.lock().in_flight.values().cloned().collect()
    }

    /// Mark the gate running; informational, does not affect admission
    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!(capacity = self.capacity, "Concurrency gate started");
    }

    /// Whether `start` has been called without a matching `stop`
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Flip the running flag and drain: wait for all in-flight executions
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        loop {
            let notified = self.drained.notified();
            if self.inner.lock().in_flight.is_empty() {
                break;
            }
            notified.await;
        }
        info!("Concurrency gate stopped");
    }

    /// Admit a request or fail fast with `AtCapacity`
    ///
    /// On admission the request executes on a spawned task bounded by the
    /// execution timeout; the returned handle resolves with the terminal
    /// record. The in-flight entry is removed on every terminal path
    /// before the handle resolves.
    #[instrument(skip(self, query), fields(model = %model, query_len = query.len()))]
    pub fn submit(
        &self,
        query: &str,
        model: &str,
        priority: Priority,
    ) -> Result<ExecutionHandle, OrchestrationError> {
        let request = InFlightRequest {
            request_id: Uuid::new_v4(),
            query: query.to_string(),
            model: model.to_string(),
            priority,
            submitted_at: Utc::now(),
        };

        // Check-and-insert under one lock: the admission decision is atomic
        {
            let mut inner = self.inner.lock();
            if inner.in_flight.len() >= self.capacity {
                debug!(capacity = self.capacity, "Rejecting submission at capacity");
                return Err(OrchestrationError::AtCapacity {
                    capacity: self.capacity,
                });
            }
            inner.in_flight.insert(request.request_id, request.clone());
        }

        let (tx, rx) = oneshot::channel();
        let handle = ExecutionHandle::new(rx, &request);

        let inner = Arc::clone(&self.inner);
        let drained = Arc::clone(&self.drained);
        let backend = Arc::clone(&self.backend);
        let registry = Arc::clone(&self.registry);
        let execution_timeout = self.execution_timeout;

        tokio::spawn(async move {
            let record = Self::execute(&*backend, &request, execution_timeout).await;

            // Guaranteed cleanup: remove from in-flight and fold stats under
            // the same lock, on every terminal path
            {
                let mut guard = inner.lock();
                guard.in_flight.remove(&request.request_id);
                guard
                    .counters
                    .observe(record.response_time_secs, record.success);
            }
            registry.record_performance(&request.model, record.response_time_secs, record.success);
            drained.notify_waiters();

            // Caller may have abandoned the handle; that is not an error
            let _ = tx.send(record);
        });

        Ok(handle)
    }

    /// Run one admitted request to a terminal outcome
    async fn execute(
        backend: &dyn ModelBackend,
        request: &InFlightRequest,
        execution_timeout: Duration,
    ) -> ExecutionRecord {
        let started_at = Utc::now();
        let start = Instant::now();

        let base = ExecutionRecord {
            request_id: request.request_id.to_string(),
            query: request.query.clone(),
            model: request.model.clone(),
            response: None,
            error: None,
            response_time_secs: 0.0,
            timestamp: started_at,
            success: false,
        };

        match tokio::time::timeout(
            execution_timeout,
            backend.invoke(&request.model, &request.query, execution_timeout),
        )
        .await
        {
            Ok(Ok(outcome)) => {
                let elapsed = start.elapsed().as_secs_f64();
                if outcome.success {
                    debug!(request_id = %request.request_id, elapsed_secs = elapsed, "Execution completed");
                    ExecutionRecord {
                        response: Some(outcome.output),
                        response_time_secs: elapsed,
                        success: true,
                        ..base
                    }
                } else {
                    let error = outcome
                        .detail
                        .unwrap_or_else(|| "model reported failure".to_string());
                    warn!(request_id = %request.request_id, error = %error, "Execution failed");
                    ExecutionRecord {
                        error: Some(error),
                        response_time_secs: elapsed,
                        ..base
                    }
                }
            }
            Ok(Err(e)) => {
                let elapsed = start.elapsed().as_secs_f64();
                warn!(request_id = %request.request_id, error = %e, "Execution fault");
                ExecutionRecord {
                    error: Some(e.to_string()),
                    response_time_secs: elapsed,
                    ..base
                }
            }
            Err(_) => {
                warn!(
                    request_id = %request.request_id,
                    bound_secs = execution_timeout.as_secs(),
                    "Execution timed out"
                );
                ExecutionRecord {
                    error: Some("Request timeout".to_string()),
                    response_time_secs: execution_timeout.as_secs_f64(),
                    ..base
                }
            }
        }
    }

    /// Point-in-time statistics; safe to call concurrently with submissions
    #[must_use]
    pub fn stats(&self) -> GateStatistics {
        let inner = self.inner.lock();
        #[allow(clippy::cast_precision_loss)]
        let current_load = inner.in_flight.len() as f64 / self.capacity.max(1) as f64;
        GateStatistics {
            total_requests: inner.counters.total_requests,
            completed_requests: inner.counters.completed_requests,
            failed_requests: inner.counters.failed_requests,
            average_response_time_secs: inner.counters.average_response_time_secs,
            current_load,
            active_requests: inner.in_flight.len(),
            capacity: self.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::InvokeOutcome;
    use async_trait::async_trait;

    /// Backend with a fixed per-invoke delay and outcome
    struct SlowBackend {
        delay: Duration,
        success: bool,
        fault: bool,
    }

    impl SlowBackend {
        fn instant() -> Self {
            Self {
                delay: Duration::ZERO,
                success: true,
                fault: false,
            }
        }

        fn sleeping(delay: Duration) -> Self {
            Self {
                delay,
                success: true,
                fault: false,
            }
        }

        fn failing() -> Self {
            Self {
                delay: Duration::ZERO,
                success: false,
                fault: false,
            }
        }

        fn faulting() -> Self {
            Self {
                delay: Duration::ZERO,
                success: true,
                fault: true,
            }
        }
    }

    #[async_trait]
    impl ModelBackend for SlowBackend {
        async fn active_models(&self) -> Result<Vec<String>, OrchestrationError> {
            Ok(vec![])
        }

        async fn invoke(
            &self,
            _model: &str,
            _prompt: &str,
            _timeout: Duration,
        ) -> Result<InvokeOutcome, OrchestrationError> {
            tokio::time::sleep(self.delay).await;
            if self.fault {
                return Err(OrchestrationError::Backend("connection reset".to_string()));
            }
            if self.success {
                Ok(InvokeOutcome::ok("generated text"))
            } else {
                Ok(InvokeOutcome::failed("model crashed"))
            }
        }
    }

    fn gate_with(capacity: usize, timeout: Duration, backend: SlowBackend) -> ConcurrencyGate {
        let backend: Arc<dyn ModelBackend> = Arc::new(backend);
        let registry = Arc::new(ModelRegistry::with_default_catalog(
            Arc::clone(&backend),
            Duration::from_secs(30),
        ));
        ConcurrencyGate::new(capacity, timeout, backend, registry)
    }

    #[tokio::test]
    async fn successful_execution_resolves_with_response() {
        let gate = gate_with(3, Duration::from_secs(60), SlowBackend::instant());
        let handle = gate
            .submit("Hello", "llama3.1:8b", Priority::Balanced)
            .expect("admitted");
        let record = handle.wait().await;
        assert!(record.success);
        assert_eq!(record.response.as_deref(), Some("generated text"));
        assert!(record.error.is_none());
        assert_eq!(record.model, "llama3.1:8b");
    }

    #[tokio::test]
    async fn capacity_is_never_exceeded() {
        let gate = gate_with(
            2,
            Duration::from_secs(60),
            SlowBackend::sleeping(Duration::from_millis(200)),
        );

        let first = gate.submit("a", "m", Priority::Balanced).expect("admitted");
        let second = gate.submit("b", "m", Priority::Balanced).expect("admitted");
        assert!(!gate.can_accept());

        let third = gate.submit("c", "m", Priority::Balanced);
        assert!(matches!(
            third,
            Err(OrchestrationError::AtCapacity { capacity: 2 })
        ));

        first.wait().await;
        second.wait().await;
        assert!(gate.can_accept());
    }

    #[tokio::test]
    async fn slot_frees_after_completion() {
        // Cleanup invariant: capacity+1 submissions succeed once one drains
        let gate = gate_with(
            1,
            Duration::from_secs(60),
            SlowBackend::sleeping(Duration::from_millis(50)),
        );
        let first = gate.submit("a", "m", Priority::Balanced).expect("admitted");
        assert!(gate.submit("b", "m", Priority::Balanced).is_err());

        first.wait().await;
        let retry = gate.submit("b", "m", Priority::Balanced);
        assert!(retry.is_ok());
        retry.expect("admitted").wait().await;
    }

    #[tokio::test]
    async fn failed_execution_is_cleaned_up() {
        let gate = gate_with(3, Duration::from_secs(60), SlowBackend::failing());
        let handle = gate
            .submit("Hello", "m", Priority::Balanced)
            .expect("admitted");
        let record = handle.wait().await;
        assert!(!record.success);
        assert_eq!(record.error.as_deref(), Some("model crashed"));
        assert!(gate.in_flight_snapshot().is_empty());

        let stats = gate.stats();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.failed_requests, 1);
        assert_eq!(stats.completed_requests, 0);
    }

    #[tokio::test]
    async fn fault_is_cleaned_up() {
        let gate = gate_with(3, Duration::from_secs(60), SlowBackend::faulting());
        let handle = gate
            .submit("Hello", "m", Priority::Balanced)
            .expect("admitted");
        let record = handle.wait().await;
        assert!(!record.success);
        assert!(record.error.as_deref().is_some_and(|e| e.contains("connection reset")));
        assert!(gate.in_flight_snapshot().is_empty());
    }

    #[tokio::test]
    async fn timeout_reports_the_bound_and_cleans_up() {
        let gate = gate_with(
            3,
            Duration::from_millis(50),
            SlowBackend::sleeping(Duration::from_millis(500)),
        );
        let handle = gate
            .submit("Hello", "m", Priority::Balanced)
            .expect("admitted");
        let record = handle.wait().await;
        assert!(!record.success);
        assert_eq!(record.error.as_deref(), Some("Request timeout"));
        assert!((record.response_time_secs - 0.05).abs() < 1e-9);
        assert!(gate.in_flight_snapshot().is_empty());
    }

    #[tokio::test]
    async fn load_reflects_in_flight_count() {
        let gate = gate_with(
            2,
            Duration::from_secs(60),
            SlowBackend::sleeping(Duration::from_millis(100)),
        );
        assert!((gate.current_load() - 0.0).abs() < f64::EPSILON);

        let handle = gate.submit("a", "m", Priority::Balanced).expect("admitted");
        assert!((gate.current_load() - 0.5).abs() < f64::EPSILON);

        handle.wait().await;
        assert!((gate.current_load() - 0.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn stop_waits_for_in_flight_work() {
        let gate = gate_with(
            2,
            Duration::from_secs(60),
            SlowBackend::sleeping(Duration::from_millis(100)),
        );
        gate.start();
        assert!(gate.is_running());

        let _handle = gate.submit("a", "m", Priority::Balanced).expect("admitted");
        gate.stop().await;

        assert!(!gate.is_running());
        assert!(gate.in_flight_snapshot().is_empty());
        assert_eq!(gate.stats().total_requests, 1);
    }

    #[tokio::test]
    async fn gate_feeds_registry_performance() {
        let backend: Arc<dyn ModelBackend> = Arc::new(SlowBackend::instant());
        let registry = Arc::new(ModelRegistry::with_default_catalog(
            Arc::clone(&backend),
            Duration::from_secs(30),
        ));
        let gate = ConcurrencyGate::new(
            3,
            Duration::from_secs(60),
            backend,
            Arc::clone(&registry),
        );

        gate.submit("Hello", "llama3.1:8b", Priority::Balanced)
            .expect("admitted")
            .wait()
            .await;

        let perf = registry.model_performance("llama3.1:8b").expect("recorded");
        assert_eq!(perf.total_requests, 1);
        assert_eq!(perf.successful_requests, 1);
    }

    #[tokio::test]
    async fn ready_handle_resolves_immediately() {
        let record = ExecutionRecord::failure("q", "m", "Orchestration failed: at capacity", 0.01);
        let handle = ExecutionHandle::ready(record);
        let resolved = handle.wait().await;
        assert!(!resolved.success);
        assert!(resolved.error.as_deref().is_some_and(|e| e.contains("at capacity")));
    }

    #[tokio::test]
    async fn dropped_worker_synthesizes_failure() {
        let (tx, rx) = oneshot::channel::<ExecutionRecord>();
        let request = InFlightRequest {
            request_id: Uuid::new_v4(),
            query: "q".to_string(),
            model: "m".to_string(),
            priority: Priority::Balanced,
            submitted_at: Utc::now(),
        };
        let handle = ExecutionHandle::new(rx, &request);
        drop(tx);

        let record = handle.wait().await;
        assert!(!record.success);
        assert_eq!(record.error.as_deref(), Some("execution task dropped"));
        assert_eq!(record.request_id, request.request_id.to_string());
    }

    #[test]
    fn incremental_mean_covers_successes_only() {
        let mut counters = GateCounters::default();
        counters.observe(1.0, true);
        counters.observe(2.0, true);
        counters.observe(100.0, false);
        counters.observe(3.0, true);

        assert_eq!(counters.total_requests, 4);
        assert_eq!(counters.completed_requests, 3);
        assert_eq!(counters.failed_requests, 1);
        assert!((counters.average_response_time_secs - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn concurrent_submissions_respect_capacity() {
        let gate = Arc::new(gate_with(
            3,
            Duration::from_secs(60),
            SlowBackend::sleeping(Duration::from_millis(200)),
        ));

        let mut accepted = 0;
        let mut handles = Vec::new();
        for i in 0..10 {
            match gate.submit(&format!("q{i}"), "m", Priority::Balanced) {
                Ok(handle) => {
                    accepted += 1;
                    handles.push(handle);
                }
                Err(OrchestrationError::AtCapacity { .. }) => {}
                Err(e) => unreachable!("unexpected error: {e}"),
            }
            assert!(gate.in_flight_snapshot().len() <= 3);
        }
        assert_eq!(accepted, 3);

        for handle in handles {
            handle.wait().await;
        }
        assert_eq!(gate.stats().total_requests, 3);
    }
}
