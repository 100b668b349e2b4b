//! Retrieval-augmented generation on top of the orchestration core
//!
//! Searches a document store, folds the hits into a context-enhanced
//! prompt, and routes that prompt through the orchestrator like any other
//! query.

pub mod augment;
pub mod error;
pub mod ports;
pub mod service;

pub use augment::build_augmented_prompt;
pub use error::RetrievalError;
pub use ports::{DocumentSearch, SearchResults};
pub use service::{ChatReply, RagAnswer, RagService};
