//! RAG service
//!
//! Composes a [`DocumentSearch`] store with the [`Orchestrator`]: retrieve,
//! augment, generate. Only the search step can error; generation failures
//! come back as unsuccessful answers.

use std::sync::Arc;
use std::time::Duration;

use domain::Priority;
use orchestration::Orchestrator;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::augment::build_augmented_prompt;
use crate::error::RetrievalError;
use crate::ports::DocumentSearch;

/// Documents retrieved per query when the caller does not say otherwise
const DEFAULT_RESULTS: usize = 3;

/// Full result of one retrieve-and-generate round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    /// The question as asked
    pub original_query: String,
    /// Texts of the retrieved documents
    pub retrieved_documents: Vec<String>,
    /// Distances aligned with the retrieved documents
    pub document_distances: Vec<f64>,
    /// The prompt actually sent to the model
    pub enhanced_prompt: String,
    /// Generated answer, empty on failure
    pub model_response: String,
    /// Model that served the request
    pub model_used: String,
    /// Generation time in seconds
    pub response_time_secs: f64,
    /// Whether generation succeeded
    pub success: bool,
    /// How many documents made it into the context
    pub n_documents_retrieved: usize,
}

/// Result of the simple chat interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    /// The question as asked
    pub original_query: String,
    /// Generated answer, empty on failure
    pub model_response: String,
    /// Model that served the request
    pub model_used: String,
    /// Generation time in seconds
    pub response_time_secs: f64,
    /// Whether generation succeeded
    pub success: bool,
    /// Whether retrieval context was used
    pub rag_used: bool,
}

/// Retrieval-augmented generation over the orchestrator
pub struct RagService {
    search: Arc<dyn DocumentSearch>,
    orchestrator: Arc<Orchestrator>,
}

impl std::fmt::Debug for RagService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagService").finish_non_exhaustive()
    }
}

impl RagService {
    /// Compose a search store with an orchestrator
    #[must_use]
    pub fn new(search: Arc<dyn DocumentSearch>, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            search,
            orchestrator,
        }
    }

    /// Retrieve context for `query`, augment, and generate an answer
    ///
    /// `n_results` falls back to three documents, `timeout` to the
    /// orchestrator's execution timeout.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn answer(
        &self,
        query: &str,
        n_results: Option<usize>,
        priority: Priority,
        timeout: Option<Duration>,
    ) -> Result<RagAnswer, RetrievalError> {
        let k = n_results.unwrap_or(DEFAULT_RESULTS);
        let results = self.search.search(query, k).await?;
        debug!(retrieved = results.len(), "Retrieved context documents");

        let enhanced_prompt = build_augmented_prompt(query, &results.documents);
        let record = self
            .orchestrator
            .process_sync(&enhanced_prompt, priority, None, timeout)
            .await;

        Ok(RagAnswer {
            original_query: query.to_string(),
            n_documents_retrieved: results.documents.len(),
            retrieved_documents: results.documents,
            document_distances: results.distances,
            enhanced_prompt,
            model_response: record.response.unwrap_or_default(),
            model_used: record.model,
            response_time_secs: record.response_time_secs,
            success: record.success,
        })
    }

    /// Chat with or without retrieval context
    ///
    /// With `use_rag` the reply is a condensed [`Self::answer`]; without it
    /// the query goes straight to the orchestrator.
    pub async fn chat(&self, query: &str, use_rag: bool) -> Result<ChatReply, RetrievalError> {
        if use_rag {
            let answer = self.answer(query, None, Priority::default(), None).await?;
            return Ok(ChatReply {
                original_query: answer.original_query,
                model_response: answer.model_response,
                model_used: answer.model_used,
                response_time_secs: answer.response_time_secs,
                success: answer.success,
                rag_used: true,
            });
        }

        let record = self
            .orchestrator
            .process_sync(query, Priority::default(), None, None)
            .await;
        Ok(ChatReply {
            original_query: query.to_string(),
            model_response: record.response.unwrap_or_default(),
            model_used: record.model,
            response_time_secs: record.response_time_secs,
            success: record.success,
            rag_used: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::SearchResults;
    use async_trait::async_trait;
    use orchestration::{
        InvokeOutcome, ModelBackend, OrchestrationError, OrchestratorConfig,
    };

    struct FixedSearch {
        results: Result<SearchResults, String>,
    }

    impl FixedSearch {
        fn with_documents(docs: &[&str]) -> Self {
            let documents: Vec<String> = docs.iter().map(ToString::to_string).collect();
            let distances = (0..documents.len()).map(|i| 0.1 * (i as f64 + 1.0)).collect();
            Self {
                results: Ok(SearchResults {
                    documents,
                    distances,
                    metadatas: vec![],
                }),
            }
        }

        fn failing(error: &str) -> Self {
            Self {
                results: Err(error.to_string()),
            }
        }
    }

    #[async_trait]
    impl DocumentSearch for FixedSearch {
        async fn search(&self, _query: &str, k: usize) -> Result<SearchResults, RetrievalError> {
            match &self.results {
                Ok(results) => {
                    let mut bounded = results.clone();
                    bounded.documents.truncate(k);
                    bounded.distances.truncate(k);
                    Ok(bounded)
                }
                Err(e) => Err(RetrievalError::Search(e.clone())),
            }
        }
    }

    struct EchoBackend;

    #[async_trait]
    impl ModelBackend for EchoBackend {
        async fn active_models(&self) -> Result<Vec<String>, OrchestrationError> {
            Ok(vec!["llama3.1:8b".to_string()])
        }

        async fn invoke(
            &self,
            _model: &str,
            prompt: &str,
            _timeout: Duration,
        ) -> Result<InvokeOutcome, OrchestrationError> {
            Ok(InvokeOutcome::ok(format!("answered: {}", prompt.len())))
        }
    }

    fn service_with(search: FixedSearch) -> RagService {
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(EchoBackend),
            OrchestratorConfig::default(),
        ));
        RagService::new(Arc::new(search), orchestrator)
    }

    #[tokio::test]
    async fn answer_assembles_the_full_result() {
        let service = service_with(FixedSearch::with_documents(&[
            "Rust is a systems language",
            "Cargo is its build tool",
        ]));
        let answer = service
            .answer("What is Rust?", None, Priority::Balanced, None)
            .await
            .expect("search succeeds");

        assert_eq!(answer.original_query, "What is Rust?");
        assert_eq!(answer.n_documents_retrieved, 2);
        assert_eq!(answer.retrieved_documents.len(), 2);
        assert_eq!(answer.document_distances.len(), 2);
        assert!(answer.enhanced_prompt.contains("Document 1: Rust is a systems language"));
        assert!(answer.enhanced_prompt.contains("Question: What is Rust?"));
        assert!(answer.success);
        assert_eq!(answer.model_used, "llama3.1:8b");
        assert!(answer.model_response.starts_with("answered:"));
    }

    #[tokio::test]
    async fn answer_respects_the_result_bound() {
        let service = service_with(FixedSearch::with_documents(&["a", "b", "c", "d", "e"]));
        let answer = service
            .answer("q", Some(2), Priority::Balanced, None)
            .await
            .expect("search succeeds");
        assert_eq!(answer.n_documents_retrieved, 2);
    }

    #[tokio::test]
    async fn search_failure_surfaces_as_error() {
        let service = service_with(FixedSearch::failing("index offline"));
        let result = service.answer("q", None, Priority::Balanced, None).await;
        assert!(matches!(result, Err(RetrievalError::Search(ref e)) if e == "index offline"));
    }

    #[tokio::test]
    async fn chat_without_rag_skips_retrieval() {
        // A failing search store must not matter when RAG is off
        let service = service_with(FixedSearch::failing("index offline"));
        let reply = service.chat("Hi", false).await.expect("direct path");
        assert!(!reply.rag_used);
        assert!(reply.success);
        assert_eq!(reply.original_query, "Hi");
    }

    #[tokio::test]
    async fn chat_with_rag_uses_retrieval() {
        let service = service_with(FixedSearch::with_documents(&["doc"]));
        let reply = service.chat("Hi", true).await.expect("rag path");
        assert!(reply.rag_used);
        assert!(reply.success);
    }
}
