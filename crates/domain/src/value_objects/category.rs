//! Query category value object

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse intent classification of a query
///
/// Drives model selection: each category maps to an ordered list of
/// candidate models in the routing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelCategory {
    /// Short queries where latency matters more than quality
    Fast,
    /// Everyday questions without a stronger signal
    General,
    /// Programming tasks: code generation, debugging, scripts
    Coding,
    /// Comparison, evaluation, review
    Analysis,
    /// Long-form explanation and multi-step reasoning
    Reasoning,
}

impl ModelCategory {
    /// Stable lowercase name, matching the serde representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::General => "general",
            Self::Coding => "coding",
            Self::Analysis => "analysis",
            Self::Reasoning => "reasoning",
        }
    }

    /// All categories, in routing-table order
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [
            Self::Fast,
            Self::General,
            Self::Coding,
            Self::Analysis,
            Self::Reasoning,
        ]
    }
}

impl fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ModelCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "general" => Ok(Self::General),
            "coding" => Ok(Self::Coding),
            "analysis" => Ok(Self::Analysis),
            "reasoning" => Ok(Self::Reasoning),
            _ => Err(format!("Unknown category: {s}")),
        }
    }
}
