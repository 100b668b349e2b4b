//! Application state shared across handlers

use std::sync::Arc;

use orchestration::Orchestrator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The orchestrator every handler talks to
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Wrap an orchestrator for handler sharing
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}
