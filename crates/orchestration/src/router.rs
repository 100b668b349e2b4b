//! Query router
//!
//! Classifies a query into a category with keyword heuristics and picks the
//! best available, healthy model for it. Routing never fails: when nothing
//! is available the decision still names the category's first candidate so
//! execution (or external loading) can be attempted anyway.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use domain::{ModelCategory, Priority};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::registry::ModelRegistry;

/// Keyword sets checked in order; first match wins. Coding intent is the
/// most specific signal and goes first.
const CODING_KEYWORDS: &[&str] = &[
    "python",
    "code",
    "function",
    "class",
    "debug",
    "programming",
    "script",
];

const ANALYSIS_KEYWORDS: &[&str] = &["analyze", "compare", "evaluate", "assessment", "review"];

const REASONING_KEYWORDS: &[&str] = &["explain", "complex", "detailed", "comprehensive", "theory"];

/// Queries at or below this word count default to the fast category
const SHORT_QUERY_WORDS: usize = 5;

/// Ordered candidate lists per category, most-preferred first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingTable {
    rules: HashMap<ModelCategory, Vec<String>>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        let mut rules = HashMap::new();
        rules.insert(
            ModelCategory::Coding,
            vec!["codellama:13b".to_string(), "llama3.1:8b".to_string()],
        );
        rules.insert(
            ModelCategory::Fast,
            vec![
                "neural-chat:7b-v3.3-q4_0".to_string(),
                "llama3.1:8b".to_string(),
            ],
        );
        rules.insert(
            ModelCategory::Analysis,
            vec![
                "mixtral:8x7b-instruct-v0.1-q4_0".to_string(),
                "llama3.1:70b".to_string(),
            ],
        );
        rules.insert(
            ModelCategory::Reasoning,
            vec![
                "llama3.1:70b".to_string(),
                "mixtral:8x7b-instruct-v0.1-q4_0".to_string(),
            ],
        );
        rules.insert(
            ModelCategory::General,
            vec![
                "llama3.1:8b".to_string(),
                "neural-chat:7b-v3.3-q4_0".to_string(),
            ],
        );
        Self { rules }
    }
}

impl RoutingTable {
    /// Candidates for a category, most-preferred first
    #[must_use]
    pub fn candidates(&self, category: ModelCategory) -> &[String] {
        self.rules.get(&category).map_or(&[], Vec::as_slice)
    }
}

/// One routing decision; produced per request, never persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// The query as received
    pub query: String,
    /// Detected category
    pub category: ModelCategory,
    /// Model the router picked
    pub selected_model: String,
    /// Caller's priority hint, recorded for forward compatibility
    pub priority: Priority,
    /// Snapshot of every currently available model name
    pub available_models: Vec<String>,
    /// When the decision was made
    pub decided_at: DateTime<Utc>,
}

/// Routes queries to models using the registry's live availability
pub struct ModelRouter {
    registry: Arc<ModelRegistry>,
    table: RoutingTable,
}

impl std::fmt::Debug for ModelRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRouter")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl ModelRouter {
    /// Create a router with the default routing table
    #[must_use]
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            table: RoutingTable::default(),
        }
    }

    /// Create a router with an explicit routing table
    #[must_use]
    pub fn with_table(registry: Arc<ModelRegistry>, table: RoutingTable) -> Self {
        Self { registry, table }
    }

    /// Classify a query into a category
    ///
    /// Pure and deterministic: case-insensitive substring match against the
    /// keyword sets in order, then the short-query fallback.
    #[must_use]
    pub fn classify(query: &str) -> ModelCategory {
        let lower = query.to_lowercase();

        if CODING_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return ModelCategory::Coding;
        }
        if ANALYSIS_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return ModelCategory::Analysis;
        }
        if REASONING_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return ModelCategory::Reasoning;
        }
        if query.split_whitespace().count() <= SHORT_QUERY_WORDS {
            return ModelCategory::Fast;
        }
        ModelCategory::General
    }

    /// Pick the best model for a category
    ///
    /// Walks the category's candidates and returns the first available one;
    /// falls back to any available model, then to the category's first
    /// configured candidate unconditionally. The priority hint is accepted
    /// but does not currently weight the choice.
    #[must_use]
    pub fn select_model(&self, category: ModelCategory, priority: Priority) -> String {
        let candidates = self.table.candidates(category);
        let available = self.registry.available_models(None);

        for candidate in candidates {
            if available.iter().any(|a| a == candidate) {
                debug!(model = %candidate, %category, %priority, "Selected preferred candidate");
                return candidate.clone();
            }
        }

        if let Some(first) = available.first() {
            debug!(model = %first, %category, "No candidate available, falling back to any available model");
            return first.clone();
        }

        // Nothing is available: name the preferred candidate anyway and let
        // execution fail or trigger external loading.
        let fallback = candidates.first().cloned().unwrap_or_default();
        debug!(model = %fallback, %category, "No model available, returning first configured candidate");
        fallback
    }

    /// Route a query: refresh status, classify, select, stamp a decision
    ///
    /// Always succeeds; the worst case is a decision naming an unavailable
    /// model.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn route(&self, query: &str, priority: Priority) -> RoutingDecision {
        self.registry.refresh_status().await;

        let category = Self::classify(query);
        let selected_model = self.select_model(category, priority);

        RoutingDecision {
            query: query.to_string(),
            category,
            selected_model,
            priority,
            available_models: self.registry.available_models(None),
            decided_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestrationError;
    use crate::ports::{InvokeOutcome, ModelBackend};
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedBackend {
        active: Vec<String>,
    }

    impl FixedBackend {
        fn new(models: &[&str]) -> Self {
            Self {
                active: models.iter().map(ToString::to_string).collect(),
            }
        }
    }

    #[async_trait]
    impl ModelBackend for FixedBackend {
        async fn active_models(&self) -> Result<Vec<String>, OrchestrationError> {
            Ok(self.active.clone())
        }

        async fn invoke(
            &self,
            _model: &str,
            _prompt: &str,
            _timeout: Duration,
        ) -> Result<InvokeOutcome, OrchestrationError> {
            Ok(InvokeOutcome::ok("ok"))
        }
    }

    fn router_with(models: &[&str]) -> ModelRouter {
        let registry = Arc::new(ModelRegistry::with_default_catalog(
            Arc::new(FixedBackend::new(models)),
            Duration::from_secs(30),
        ));
        ModelRouter::new(registry)
    }

    // === Classification ===

    #[test]
    fn coding_query_classifies_coding() {
        assert_eq!(
            ModelRouter::classify("Write a Python function to sort a list"),
            ModelCategory::Coding
        );
    }

    #[test]
    fn short_query_classifies_fast() {
        assert_eq!(ModelRouter::classify("Hi"), ModelCategory::Fast);
        assert_eq!(ModelRouter::classify("What is AI?"), ModelCategory::Fast);
    }

    #[test]
    fn analysis_query_classifies_analysis() {
        assert_eq!(
            ModelRouter::classify("Analyze the pros and cons of renewable energy"),
            ModelCategory::Analysis
        );
    }

    #[test]
    fn reasoning_query_classifies_reasoning() {
        assert_eq!(
            ModelRouter::classify("Explain quantum theory in detail"),
            ModelCategory::Reasoning
        );
    }

    #[test]
    fn long_plain_query_classifies_general() {
        assert_eq!(
            ModelRouter::classify(
                "Tell me about your day and your plans for the weekend trip"
            ),
            ModelCategory::General
        );
    }

    #[test]
    fn coding_beats_analysis_when_both_match() {
        // "debug" (coding) and "review" (analysis) both present
        assert_eq!(
            ModelRouter::classify("Please review and debug my program"),
            ModelCategory::Coding
        );
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(
            ModelRouter::classify("EXPLAIN the THEORY behind this phenomenon please"),
            ModelCategory::Reasoning
        );
    }

    // === Selection ===

    #[tokio::test]
    async fn select_prefers_first_candidate() {
        let router = router_with(&["codellama:13b", "llama3.1:8b"]);
        router.registry.refresh_status().await;
        let model = router.select_model(ModelCategory::Coding, Priority::Balanced);
        assert_eq!(model, "codellama:13b");
    }

    #[tokio::test]
    async fn select_walks_to_second_candidate() {
        let router = router_with(&["llama3.1:8b"]);
        router.registry.refresh_status().await;
        let model = router.select_model(ModelCategory::Coding, Priority::Balanced);
        assert_eq!(model, "llama3.1:8b");
    }

    #[tokio::test]
    async fn select_falls_back_to_any_available() {
        // Only the fast model is loaded; coding candidates are not
        let router = router_with(&["neural-chat:7b-v3.3-q4_0"]);
        router.registry.refresh_status().await;
        let model = router.select_model(ModelCategory::Coding, Priority::Balanced);
        assert_eq!(model, "neural-chat:7b-v3.3-q4_0");
    }

    #[tokio::test]
    async fn select_with_nothing_available_names_first_candidate() {
        let router = router_with(&[]);
        router.registry.refresh_status().await;
        let model = router.select_model(ModelCategory::Analysis, Priority::Balanced);
        assert_eq!(model, "mixtral:8x7b-instruct-v0.1-q4_0");
    }

    // === Routing ===

    #[tokio::test]
    async fn route_stamps_a_full_decision() {
        let router = router_with(&["codellama:13b"]);
        let decision = router
            .route("Write a Python function to sort a list", Priority::Quality)
            .await;
        assert_eq!(decision.category, ModelCategory::Coding);
        assert_eq!(decision.selected_model, "codellama:13b");
        assert_eq!(decision.priority, Priority::Quality);
        assert_eq!(decision.available_models, vec!["codellama:13b"]);
        assert_eq!(decision.query, "Write a Python function to sort a list");
    }

    #[tokio::test]
    async fn route_never_fails_with_empty_backend() {
        let router = router_with(&[]);
        let decision = router.route("Hi", Priority::default()).await;
        assert_eq!(decision.category, ModelCategory::Fast);
        assert_eq!(decision.selected_model, "neural-chat:7b-v3.3-q4_0");
        assert!(decision.available_models.is_empty());
    }

    #[test]
    fn routing_table_default_covers_all_categories() {
        let table = RoutingTable::default();
        for category in ModelCategory::all() {
            assert!(
                !table.candidates(category).is_empty(),
                "no candidates for {category}"
            );
        }
    }

    #[test]
    fn routing_decision_serialization() {
        let decision = RoutingDecision {
            query: "Hi".to_string(),
            category: ModelCategory::Fast,
            selected_model: "neural-chat:7b-v3.3-q4_0".to_string(),
            priority: Priority::Balanced,
            available_models: vec![],
            decided_at: Utc::now(),
        };
        let json = serde_json::to_string(&decision).expect("serialize");
        assert!(json.contains("\"category\":\"fast\""));
        assert!(json.contains("neural-chat"));
    }
}
