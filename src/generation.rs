//! OpenAI-compatible generation client.
//!
//! [`OpenAiGenerator`] implements both modes of
//! [`GenerationClient`]:
//!
//! - `complete` calls `{base_url}/chat/completions` with a system and a
//!   user message.
//! - `complete_with_external_retrieval` calls `{base_url}/responses` with
//!   the hosted web-search tool enabled and the configured instructions,
//!   then parses the reply with [`ExternalAnswer::parse`].
//!
//! Requests share the retry policy of the embedding clients. Requires the
//! `OPENAI_API_KEY` environment variable unless the base URL points at a
//! keyless local server.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use corpus_qa_core::generation::{CompletionOptions, ExternalAnswer, GenerationClient};
use corpus_qa_core::MalformedResponse;

use crate::config::{GenerationConfig, PromptsConfig};
use crate::embedding::post_json_with_retry;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    web_model: String,
    web_instructions: String,
    max_retries: u32,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig, prompts: &PromptsConfig, max_retries: u32) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model: config.answer_model.clone(),
            web_model: config.web_model.clone(),
            web_instructions: prompts.web_instructions.clone(),
            max_retries,
        })
    }

    fn chat_endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn responses_endpoint(&self) -> String {
        format!("{}/responses", self.base_url)
    }
}

#[async_trait]
impl GenerationClient for OpenAiGenerator {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String> {
        let model = options.model.as_deref().unwrap_or(&self.default_model);
        let messages = [
            Message {
                role: "system".to_string(),
                content: system_prompt.to_string(),
            },
            Message {
                role: "user".to_string(),
                content: user_prompt.to_string(),
            },
        ];
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        });

        let json = post_json_with_retry(
            &self.client,
            &self.chat_endpoint(),
            self.api_key.as_deref(),
            &body,
            self.max_retries,
            "chat",
        )
        .await?;

        parse_chat_response(&json)
    }

    async fn complete_with_external_retrieval(&self, question: &str) -> Result<ExternalAnswer> {
        let body = serde_json::json!({
            "model": self.web_model,
            "tools": [ { "type": "web_search_preview" } ],
            "instructions": self.web_instructions,
            "input": question,
        });

        let json = post_json_with_retry(
            &self.client,
            &self.responses_endpoint(),
            self.api_key.as_deref(),
            &body,
            self.max_retries,
            "responses",
        )
        .await?;

        let text = parse_responses_output(&json)?;
        Ok(ExternalAnswer::parse(&text))
    }
}

/// Extract `choices[0].message.content`. A null content is an empty answer.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    let message = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| MalformedResponse::new("chat-completions", "missing choices[0].message"))?;

    Ok(message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string())
}

/// Concatenate every `output_text` part of a Responses API reply.
fn parse_responses_output(json: &serde_json::Value) -> Result<String> {
    if let Some(text) = json.get("output_text").and_then(|t| t.as_str()) {
        return Ok(text.to_string());
    }

    let output = json
        .get("output")
        .and_then(|o| o.as_array())
        .ok_or_else(|| MalformedResponse::new("responses", "missing output array"))?;

    let text: String = output
        .iter()
        .filter_map(|item| item.get("content").and_then(|c| c.as_array()))
        .flatten()
        .filter(|part| part.get("type").and_then(|t| t.as_str()) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        return Err(MalformedResponse::new("responses", "no output_text in reply").into());
    }
    Ok(text)
}
