//! Embedding clients.
//!
//! Implements [`EmbeddingClient`] for:
//! - **[`OpenAIEmbedder`]**: `POST /v1/embeddings` with retry and backoff.
//! - **[`OllamaEmbedder`]**: a local Ollama instance's `/api/embed` endpoint.
//! - **[`DisabledEmbedder`]**: always fails; used when embeddings are not configured.
//!
//! Use [`create_embedder`] to build the one named by the configuration.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! An answer that parses but carries no usable vector fails with
//! [`MalformedResponse`] and is never retried.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use corpus_qa_core::embedding::EmbeddingClient;
use corpus_qa_core::MalformedResponse;

use crate::config::EmbeddingConfig;

/// Build the embedding client selected by `config.provider`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingClient>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// POST a JSON body, retrying rate limits, server errors and network errors.
pub(crate) async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
    service: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(service, attempt, delay_secs = delay.as_secs(), "retrying request");
            tokio::time::sleep(delay).await;
        }

        let mut req = client.post(url).json(body);
        if let Some(key) = bearer {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        match req.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json()
                        .await
                        .with_context(|| format!("{} returned a non-JSON body", service));
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        service,
                        status,
                        body_text
                    ));
                    continue;
                }

                bail!("{} API error {}: {}", service, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!("{} request failed: {}", service, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} request failed after retries", service)))
}

fn parse_vector(value: Option<&serde_json::Value>, service: &'static str) -> Result<Vec<f32>> {
    let items = value
        .and_then(|v| v.as_array())
        .ok_or_else(|| MalformedResponse::new(service, "missing embedding array"))?;
    if items.is_empty() {
        return Err(MalformedResponse::new(service, "empty embedding").into());
    }
    items
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| MalformedResponse::new(service, "non-numeric embedding value").into())
        })
        .collect()
}

fn check_dims(vector: Vec<f32>, dims: usize, service: &'static str) -> Result<Vec<f32>> {
    if vector.len() != dims {
        return Err(MalformedResponse::new(
            service,
            format!("expected {} dimensions, got {}", dims, vector.len()),
        )
        .into());
    }
    Ok(vector)
}

// ============ Disabled ============

/// An embedding client that always fails.
pub struct DisabledEmbedder;

#[async_trait]
impl EmbeddingClient for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ OpenAI ============

/// Embedding client for the OpenAI API.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });
        let json = post_json_with_retry(
            &self.client,
            "https://api.openai.com/v1/embeddings",
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;
        let vector = parse_openai_response(&json)?;
        check_dims(vector, self.dims, "openai-embeddings")
    }
}

/// Extract `data[0].embedding` from an OpenAI embeddings response.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let first = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .ok_or_else(|| MalformedResponse::new("openai-embeddings", "missing data array"))?;
    parse_vector(first.get("embedding"), "openai-embeddings")
}

// ============ Ollama ============

/// Embedding client for a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default: `http://localhost:11434`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let json = post_json_with_retry(
            &self.client,
            &format!("{}/api/embed", self.url),
            None,
            &body,
            self.max_retries,
            "Ollama",
        )
        .await
        .with_context(|| format!("is Ollama running at {}?", self.url))?;
        let vector = parse_ollama_response(&json)?;
        check_dims(vector, self.dims, "ollama-embeddings")
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let first = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .and_then(|e| e.first());
    parse_vector(first, "ollama-embeddings")
}
