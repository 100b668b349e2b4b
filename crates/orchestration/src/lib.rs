//! Orchestration core for Switchboard
//!
//! Routes natural-language queries to the best available model, bounds
//! concurrent executions against a fixed capacity, and tracks running
//! statistics for load estimation.
//!
//! The four pieces compose in one direction:
//! [`ModelRegistry`] (catalog + live status) feeds [`ModelRouter`]
//! (classification + selection), the [`ConcurrencyGate`] admits and executes
//! requests against a [`ModelBackend`], and the [`Orchestrator`] ties the
//! request lifecycle together.

pub mod config;
pub mod error;
pub mod gate;
pub mod orchestrator;
pub mod ports;
pub mod registry;
pub mod router;

pub use config::OrchestratorConfig;
pub use error::OrchestrationError;
pub use gate::{ConcurrencyGate, ExecutionHandle, ExecutionRecord, GateStatistics, InFlightRequest};
pub use orchestrator::{
    ModelStatus, Orchestrator, OrchestrationStatistics, Recommendation, RoutingStatistics,
    SystemStatus,
};
pub use ports::{InvokeOutcome, ModelBackend};
pub use registry::{HealthReport, LoadState, ModelRegistry, PerformanceSnapshot};
pub use router::{ModelRouter, RoutingDecision, RoutingTable};
