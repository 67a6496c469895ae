//! Generation client trait.
//!
//! Two modes: plain completion from a system/user prompt pair, and an
//! internet-augmented mode where the upstream performs its own retrieval
//! against an external corpus.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// Per-call tuning for [`GenerationClient::complete`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    /// Model override; `None` uses the client's default.
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.3,
            max_tokens: 1000,
        }
    }
}

/// Structured reply requested from the internet-augmented mode.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WebAnswer {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
}

/// Result of [`GenerationClient::complete_with_external_retrieval`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalAnswer {
    Structured(WebAnswer),
    Raw(String),
}

impl ExternalAnswer {
    /// Interpret model output: JSON (optionally inside a code fence)
    /// becomes [`ExternalAnswer::Structured`], anything else stays raw.
    pub fn parse(text: &str) -> Self {
        let trimmed = strip_code_fence(text.trim());
        match serde_json::from_str::<WebAnswer>(trimmed) {
            Ok(parsed) if !parsed.content.trim().is_empty() => ExternalAnswer::Structured(parsed),
            _ => ExternalAnswer::Raw(text.trim().to_string()),
        }
    }

    /// The text to present as the answer.
    pub fn answer_text(&self) -> &str {
        match self {
            ExternalAnswer::Structured(w) => &w.content,
            ExternalAnswer::Raw(s) => s,
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Produces natural-language text.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Complete a system/user prompt pair. May return an empty string.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String>;

    /// Answer `question` with the upstream's own web retrieval.
    async fn complete_with_external_retrieval(&self, question: &str) -> Result<ExternalAnswer>;
}
