//! Switchboard HTTP presentation layer
//!
//! Exposes the orchestration core over a small JSON API: query execution,
//! system status, health probes, and model recommendations.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
