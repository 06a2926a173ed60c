// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedder for OpenAI-compatible `/embeddings` endpoints.
//!
//! Inputs are split into requests of at most `max_batch_size` texts.
//! Transient failures (429, 500, 502, 503, 529) are retried up to the retry
//! budget carried by each [`EmbeddingInput`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use recall_config::model::EmbeddingConfig;
use recall_core::traits::{EmbeddingAdapter, PluginAdapter};
use recall_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use recall_core::RecallError;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(rename = "type", default)]
    type_: Option<String>,
}

/// HTTP embedding client.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_batch_size: usize,
    retry_delay: Duration,
}

fn provider_error(message: String) -> RecallError {
    RecallError::Embedding {
        message,
        source: None,
    }
}

impl OpenAiEmbedder {
    /// Creates a client for `base_url` (for example `https://api.openai.com/v1`).
    pub fn new(
        api_key: &str,
        base_url: impl Into<String>,
        model: impl Into<String>,
        max_batch_size: usize,
    ) -> Result<Self, RecallError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| RecallError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| RecallError::Embedding {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            max_batch_size: max_batch_size.max(1),
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Builds a client from configuration, reading the key from the
    /// environment variable named by `api_key_env`.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, RecallError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            RecallError::Config(format!(
                "embedding provider requires an API key in ${}",
                config.api_key_env
            ))
        })?;
        Self::new(
            &api_key,
            config.api_base.clone(),
            config.model_name(),
            config.max_batch_size,
        )
    }

    /// Sets the pause between retries.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        max_retries: u32,
    ) -> Result<Vec<Vec<f32>>, RecallError> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying embedding request after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(|e| RecallError::Embedding {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, texts = texts.len(), "embedding response received");

            if status.is_success() {
                let body: EmbeddingResponse =
                    response.json().await.map_err(|e| RecallError::Embedding {
                        message: format!("failed to parse embedding response: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                return order_embeddings(body, texts.len());
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < max_retries {
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(provider_error(format!("API returned {status}: {body}")));
                continue;
            }

            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!(
                    "embedding API error ({}): {}",
                    api_err.error.type_.as_deref().unwrap_or("unknown"),
                    api_err.error.message
                ),
                Err(_) => format!("API returned {status}: {body}"),
            };
            return Err(provider_error(message));
        }

        Err(last_error
            .unwrap_or_else(|| provider_error("embedding request failed after retries".into())))
    }
}

/// Puts response rows back in request order and checks the count.
fn order_embeddings(
    mut body: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, RecallError> {
    if body.data.len() != expected {
        return Err(provider_error(format!(
            "expected {expected} embeddings, provider returned {}",
            body.data.len()
        )));
    }
    body.data.sort_by_key(|row| row.index);
    Ok(body.data.into_iter().map(|row| row.embedding).collect())
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 529)
}

#[async_trait]
impl PluginAdapter for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, RecallError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RecallError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for OpenAiEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, RecallError> {
        let mut embeddings = Vec::with_capacity(input.texts.len());
        for batch in input.texts.chunks(self.max_batch_size) {
            embeddings.extend(self.embed_batch(batch, input.max_retries).await?);
        }
        let dimensions = embeddings.first().map_or(0, Vec::len);
        Ok(EmbeddingOutput {
            embeddings,
            dimensions,
        })
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_embedder(base_url: &str, max_batch_size: usize) -> OpenAiEmbedder {
        OpenAiEmbedder::new("test-key", base_url, "text-embedding-3-small", max_batch_size)
            .unwrap()
            .with_retry_delay(Duration::from_millis(1))
    }

    fn input(texts: &[&str], max_retries: u32) -> EmbeddingInput {
        EmbeddingInput {
            texts: texts.iter().map(|t| t.to_string()).collect(),
            max_retries,
        }
    }

    #[tokio::test]
    async fn embeds_and_restores_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"model": "text-embedding-3-small"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let output = test_embedder(&server.uri(), 16)
            .embed(input(&["first", "second"], 0))
            .await
            .unwrap();
        assert_eq!(output.embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(output.dimensions, 2);
    }

    #[tokio::test]
    async fn retries_on_429() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"type": "rate_limit_error", "message": "slow down"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [0.5]}]
            })))
            .mount(&server)
            .await;

        let output = test_embedder(&server.uri(), 16)
            .embed(input(&["x"], 3))
            .await
            .unwrap();
        assert_eq!(output.embeddings, vec![vec![0.5]]);
    }

    #[tokio::test]
    async fn retry_budget_bounds_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": {"type": "overloaded_error", "message": "busy"}
            })))
            .expect(3)
            .mount(&server)
            .await;

        let err = test_embedder(&server.uri(), 16)
            .embed(input(&["x"], 2))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("overloaded_error"), "got: {err}");
    }

    #[tokio::test]
    async fn fails_fast_on_400() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"type": "invalid_request_error", "message": "bad model"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_embedder(&server.uri(), 16)
            .embed(input(&["x"], 5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid_request_error"), "got: {err}");
    }

    #[tokio::test]
    async fn splits_requests_by_batch_size() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({"input": ["a", "b"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [1.0]}, {"index": 1, "embedding": [2.0]}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({"input": ["c"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [3.0]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let output = test_embedder(&server.uri(), 2)
            .embed(input(&["a", "b", "c"], 0))
            .await
            .unwrap();
        assert_eq!(output.embeddings, vec![vec![1.0], vec![2.0], vec![3.0]]);
    }

    #[tokio::test]
    async fn short_response_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let err = test_embedder(&server.uri(), 16)
            .embed(input(&["x"], 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RecallError::Embedding { .. }));
    }

    #[test]
    #[serial]
    fn from_config_requires_the_key_variable() {
        let config = EmbeddingConfig {
            api_key_env: "RECALL_TEST_MISSING_EMBED_KEY".into(),
            ..EmbeddingConfig::default()
        };
        // SAFETY: serialized with the other environment tests.
        unsafe { std::env::remove_var("RECALL_TEST_MISSING_EMBED_KEY") };
        let err = OpenAiEmbedder::from_config(&config).unwrap_err();
        assert!(matches!(err, RecallError::Config(_)));
    }

    #[test]
    #[serial]
    fn from_config_uses_provider_default_model() {
        let config = EmbeddingConfig {
            provider: recall_config::model::EmbeddingProvider::OpenAi,
            api_key_env: "RECALL_TEST_EMBED_KEY".into(),
            ..EmbeddingConfig::default()
        };
        // SAFETY: serialized with the other environment tests.
        unsafe { std::env::set_var("RECALL_TEST_EMBED_KEY", "sk-test") };
        let embedder = OpenAiEmbedder::from_config(&config).unwrap();
        unsafe { std::env::remove_var("RECALL_TEST_EMBED_KEY") };
        assert_eq!(embedder.model(), "text-embedding-3-small");
        assert_eq!(embedder.max_batch_size(), 256);
    }
}
