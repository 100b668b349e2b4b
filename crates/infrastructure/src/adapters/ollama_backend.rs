//! Ollama backend adapter
//!
//! Implements the orchestration core's `ModelBackend` port over the Ollama
//! HTTP API: `GET /api/ps` for the set of loaded models and
//! `POST /api/generate` for one-shot generation.

use std::time::Duration;

use async_trait::async_trait;
use orchestration::{InvokeOutcome, ModelBackend, OrchestrationError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::BackendConfig;

/// Client for an Ollama-compatible server
pub struct OllamaBackend {
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for OllamaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaBackend")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Ollama generate request
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Ollama generate response
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[serde(default)]
    done: bool,
}

/// Ollama loaded-models response
#[derive(Debug, Deserialize)]
struct OllamaPsResponse {
    #[serde(default)]
    models: Vec<OllamaLoadedModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaLoadedModel {
    name: String,
}

impl OllamaBackend {
    /// Create a backend client for the configured server
    pub fn new(config: &BackendConfig) -> Result<Self, OrchestrationError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| OrchestrationError::Backend(e.to_string()))?;

        info!(base_url = %config.base_url, "Initialized Ollama backend");

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the API URL for a given endpoint
    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    #[instrument(skip(self))]
    async fn active_models(&self) -> Result<Vec<String>, OrchestrationError> {
        let response = self
            .client
            .get(self.api_url("ps"))
            .send()
            .await
            .map_err(|e| OrchestrationError::Probe(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(status = %status, "Status probe rejected");
            return Err(OrchestrationError::Probe(format!("status {status}")));
        }

        let parsed: OllamaPsResponse = response
            .json()
            .await
            .map_err(|e| OrchestrationError::Probe(e.to_string()))?;

        let names: Vec<String> = parsed.models.into_iter().map(|m| m.name).collect();
        debug!(loaded = names.len(), "Fetched loaded models");
        Ok(names)
    }

    #[instrument(skip(self, prompt), fields(model = %model, prompt_len = prompt.len()))]
    async fn invoke(
        &self,
        model: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<InvokeOutcome, OrchestrationError> {
        let request = OllamaGenerateRequest {
            model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(self.api_url("generate"))
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| OrchestrationError::Backend(e.to_string()))?;

        // An error status is a backend-reported failure, not a transport
        // fault: return an unsuccessful outcome with the body as detail
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Generation rejected");
            return Ok(InvokeOutcome::failed(format!("status {status}: {body}")));
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| OrchestrationError::Backend(e.to_string()))?;

        if !parsed.done {
            return Ok(InvokeOutcome::failed("generation did not complete"));
        }
        Ok(InvokeOutcome::ok(parsed.response))
    }
}
