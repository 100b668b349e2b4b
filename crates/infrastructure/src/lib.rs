//! Infrastructure layer - adapters for external systems
//!
//! Implements the orchestration core's backend port over the Ollama HTTP
//! API and loads application configuration from file and environment.

pub mod adapters;
pub mod config;

pub use adapters::OllamaBackend;
pub use config::{AppConfig, BackendConfig, ServerConfig};
