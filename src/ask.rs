//! Retrieval-augmented answering.
//!
//! [`Answerer::answer`] runs the cache-aside pipeline:
//!
//! ```text
//! validate → cache get ─hit─→ return (served_from_cache)
//!               │miss
//!               ▼
//!            embed → search top-k ─none─→ NoRelevantInfo
//!               │
//!               ▼
//!      join contents → generate → cache set → return
//! ```
//!
//! [`Answerer::answer_from_web`] swaps the embed/search/generate steps for
//! a single internet-augmented generation call and shares the cache key
//! space with `answer`, so a hit from either mode satisfies both.
//!
//! Upstream failures collapse into [`AskError::Processing`]; the only other
//! non-success outcomes are [`AskError::Validation`] and
//! [`AskError::NoRelevantInfo`]. Nothing is retried here.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use corpus_qa_core::embedding::EmbeddingClient;
use corpus_qa_core::generation::{CompletionOptions, GenerationClient};
use corpus_qa_core::models::{Answer, ScoredRecord};
use corpus_qa_core::store::VectorStore;
use corpus_qa_core::AskError;

use crate::cache::AnswerCache;
use crate::config::Config;

pub const NO_CONTENT: &str = "No content available";
pub const UNKNOWN_SOURCE: &str = "Unknown source";
pub const EMPTY_ANSWER: &str = "Sorry, I could not generate an answer.";

/// Knobs for the answering pipeline.
#[derive(Debug, Clone)]
pub struct AnswerSettings {
    pub top_k: usize,
    pub web_source_label: String,
    pub system_prompt: String,
    pub options: CompletionOptions,
}

impl AnswerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            web_source_label: config.retrieval.web_source_label.clone(),
            system_prompt: config.prompts.answer_system.clone(),
            options: CompletionOptions {
                model: Some(config.generation.answer_model.clone()),
                temperature: config.generation.temperature,
                max_tokens: config.generation.answer_max_tokens,
            },
        }
    }
}

pub struct Answerer {
    cache: Arc<AnswerCache>,
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn GenerationClient>,
    settings: AnswerSettings,
}

fn ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

impl Answerer {
    pub fn new(
        cache: Arc<AnswerCache>,
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn GenerationClient>,
        settings: AnswerSettings,
    ) -> Self {
        Self {
            cache,
            embedder,
            store,
            generator,
            settings,
        }
    }

    /// Answer `question` from the indexed corpus.
    pub async fn answer(&self, question: &str) -> Result<Answer, AskError> {
        let started = Instant::now();
        validate(question)?;

        if let Some(cached) = self.cache.get(question).await {
            tracing::info!(total_ms = ms(started), cached = true, "question answered");
            return Ok(Answer::from_cache(cached));
        }

        let step = Instant::now();
        let vector = self
            .embedder
            .embed(question)
            .await
            .map_err(AskError::Processing)?;
        let embedding_ms = ms(step);

        let step = Instant::now();
        let results = self
            .store
            .search(&vector, self.settings.top_k)
            .await
            .map_err(AskError::Processing)?;
        let search_ms = ms(step);

        if results.is_empty() {
            tracing::warn!(embedding_ms, search_ms, "no relevant information for question");
            return Err(AskError::NoRelevantInfo);
        }

        let context = build_context(&results);
        let source = top_source(&results);

        let step = Instant::now();
        let user_prompt = format!(
            "Based on the following information, please answer this question: \"{}\"\n\nInformation: {}",
            question, context
        );
        let generated = self
            .generator
            .complete(&self.settings.system_prompt, &user_prompt, &self.settings.options)
            .await
            .map_err(AskError::Processing)?;
        let generation_ms = ms(step);

        let answer = Answer {
            answer: non_empty_answer(generated),
            source,
            timestamp: Utc::now(),
            served_from_cache: false,
        };
        self.cache.set(question, &answer.to_cached()).await;

        tracing::info!(
            embedding_ms,
            search_ms,
            generation_ms,
            total_ms = ms(started),
            source = %answer.source,
            cached = false,
            "question answered"
        );
        Ok(answer)
    }

    /// Answer `question` with the generation client's own web retrieval.
    pub async fn answer_from_web(&self, question: &str) -> Result<Answer, AskError> {
        let started = Instant::now();
        validate(question)?;

        if let Some(cached) = self.cache.get(question).await {
            tracing::info!(total_ms = ms(started), cached = true, "web question answered");
            return Ok(Answer::from_cache(cached));
        }

        let step = Instant::now();
        let reply = self
            .generator
            .complete_with_external_retrieval(question)
            .await
            .map_err(AskError::Processing)?;
        let generation_ms = ms(step);

        let answer = Answer {
            answer: non_empty_answer(reply.answer_text().to_string()),
            source: self.settings.web_source_label.clone(),
            timestamp: Utc::now(),
            served_from_cache: false,
        };
        self.cache.set(question, &answer.to_cached()).await;

        tracing::info!(
            generation_ms,
            total_ms = ms(started),
            cached = false,
            "web question answered"
        );
        Ok(answer)
    }
}

fn validate(question: &str) -> Result<(), AskError> {
    if question.trim().is_empty() {
        return Err(AskError::Validation(
            "Please provide a question as a non-empty string.".to_string(),
        ));
    }
    Ok(())
}

/// Record contents in result order, blank ones replaced by a placeholder.
fn build_context(results: &[ScoredRecord]) -> String {
    results
        .iter()
        .map(|r| {
            if r.record.content.trim().is_empty() {
                NO_CONTENT
            } else {
                r.record.content.as_str()
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn top_source(results: &[ScoredRecord]) -> String {
    results
        .first()
        .map(|r| r.record.url.as_str())
        .filter(|url| !url.is_empty())
        .unwrap_or(UNKNOWN_SOURCE)
        .to_string()
}

fn non_empty_answer(text: String) -> String {
    if text.trim().is_empty() {
        EMPTY_ANSWER.to_string()
    } else {
        text
    }
}
