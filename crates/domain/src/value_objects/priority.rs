//! Routing priority value object

use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-supplied routing priority hint
///
/// Accepted by the router and threaded through selection for forward
/// compatibility. The current routing table does not weight candidates
/// by priority; it only records the hint in the routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Prefer the fastest answer
    Speed,
    /// Trade off latency and quality
    #[default]
    Balanced,
    /// Prefer the best answer regardless of latency
    Quality,
}

impl Priority {
    /// Stable lowercase name, matching the serde representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Speed => "speed",
            Self::Balanced => "balanced",
            Self::Quality => "quality",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_balanced() {
        assert_eq!(Priority::default(), Priority::Balanced);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", Priority::Speed), "speed");
        assert_eq!(format!("{}", Priority::Balanced), "balanced");
        assert_eq!(format!("{}", Priority::Quality), "quality");
    }

    #[test]
    fn serialization() {
        let json = serde_json::to_string(&Priority::Quality).expect("serialize");
        assert_eq!(json, "\"quality\"");

        let parsed: Priority = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, Priority::Quality);
    }
}
