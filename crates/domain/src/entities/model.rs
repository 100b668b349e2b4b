//! Model catalog entry

use serde::{Deserialize, Serialize};

use crate::value_objects::ModelCategory;

/// Immutable description of a model in the catalog
///
/// Identity is the `name`; the registry rejects nothing at this level and
/// treats descriptors as fixed after construction. `size_gb` is
/// informational only and never used for routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Unique model identifier as known to the backend (e.g. "llama3.1:8b")
    pub name: String,
    /// Category this model serves
    pub category: ModelCategory,
    /// Approximate resource footprint in gigabytes
    pub size_gb: f64,
    /// Priority rank within the catalog (lower is preferred)
    pub priority: u8,
}

impl ModelDescriptor {
    /// Create a new descriptor
    pub fn new(
        name: impl Into<String>,
        category: ModelCategory,
        size_gb: f64,
        priority: u8,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            size_gb,
            priority,
        }
    }
}
