//! Ingestion pipeline orchestration.
//!
//! One crawl run walks a single crawl root and keeps the vector store
//! fresh:
//!
//! ```text
//! Launch → Discover → (Filter → [Skip | Fetch → Extract → Describe → Embed → Upsert])* → Teardown
//! ```
//!
//! URLs are handled one at a time through one browsing session. A URL is
//! skipped while the newest stored record for it is younger than the
//! freshness window. A failure on one URL is counted and logged and the
//! run moves on. The session is closed on every exit path, including
//! discovery failure and shutdown.
//!
//! Writes are appends: every processed URL gets a new record under a fresh
//! id, and older records for the same URL are left in place.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};

use corpus_qa_core::browse::{Browser, PageSession};
use corpus_qa_core::embedding::EmbeddingClient;
use corpus_qa_core::generation::{CompletionOptions, GenerationClient};
use corpus_qa_core::models::{ContentRecord, IngestReport};
use corpus_qa_core::store::VectorStore;

use crate::config::Config;
use crate::extract::{extract_links, extract_text};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, NoProgress};

/// Run-level ingestion failures. Per-URL failures never surface here.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("an ingestion run is already in progress")]
    AlreadyRunning,

    #[error("failed to launch browsing session")]
    Launch(#[source] anyhow::Error),

    #[error("failed to discover links")]
    Discover(#[source] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub sitemap_url: String,
    pub link_prefix: String,
    pub freshness_window: chrono::Duration,
    pub sitemap_timeout: Duration,
    pub page_timeout: Duration,
    pub delay: Duration,
    pub content_selectors: Vec<String>,
    pub description_input_chars: usize,
    pub max_description_chars: usize,
    pub description_system: String,
    pub description_options: CompletionOptions,
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Self {
        let ingest = &config.ingest;
        Self {
            sitemap_url: ingest.sitemap_url.clone(),
            link_prefix: ingest.link_prefix.clone(),
            freshness_window: chrono::Duration::hours(ingest.freshness_window_hours as i64),
            sitemap_timeout: Duration::from_secs(ingest.sitemap_timeout_secs),
            page_timeout: Duration::from_secs(ingest.page_timeout_secs),
            delay: Duration::from_millis(ingest.delay_ms),
            content_selectors: ingest.content_selectors.clone(),
            description_input_chars: ingest.description_input_chars,
            max_description_chars: ingest.max_description_chars,
            description_system: config.prompts.description_system.clone(),
            description_options: CompletionOptions {
                model: Some(config.generation.description_model.clone()),
                temperature: config.generation.temperature,
                max_tokens: config.generation.description_max_tokens,
            },
        }
    }
}

enum UrlOutcome {
    Indexed,
    Empty,
}

pub struct Ingestor {
    browser: Arc<dyn Browser>,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingClient>,
    generator: Arc<dyn GenerationClient>,
    settings: IngestSettings,
    progress: Arc<dyn IngestProgressReporter>,
    running: Mutex<()>,
}

impl Ingestor {
    pub fn new(
        browser: Arc<dyn Browser>,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingClient>,
        generator: Arc<dyn GenerationClient>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            browser,
            store,
            embedder,
            generator,
            settings,
            progress: Arc::new(NoProgress),
            running: Mutex::new(()),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn IngestProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// True while a run holds the overlap guard.
    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Perform one crawl run.
    ///
    /// Refuses to start while another run is in progress. Setting
    /// `shutdown` to `true` stops the run before the next URL; the report
    /// then has `aborted` set.
    pub async fn run(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<IngestReport, IngestError> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| IngestError::AlreadyRunning)?;

        tracing::info!(root = %self.settings.sitemap_url, "ingestion run started");
        let mut session = self
            .browser
            .launch()
            .await
            .map_err(IngestError::Launch)?;

        let result = self.crawl(session.as_mut(), &mut shutdown).await;

        if let Err(e) = session.close().await {
            tracing::warn!(error = %e, "failed to close browsing session");
        }

        match &result {
            Ok(report) => tracing::info!(
                discovered = report.discovered,
                processed = report.processed,
                skipped = report.skipped,
                empty = report.empty,
                errored = report.errored,
                aborted = report.aborted,
                "ingestion run finished"
            ),
            Err(e) => tracing::error!(error = ?e, "ingestion run failed"),
        }
        result
    }

    async fn crawl(
        &self,
        session: &mut dyn PageSession,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<IngestReport, IngestError> {
        let mut report = IngestReport::default();

        self.progress.report(IngestProgressEvent::Discovering {
            root: self.settings.sitemap_url.clone(),
        });
        let root = session
            .load(&self.settings.sitemap_url, self.settings.sitemap_timeout)
            .await
            .map_err(IngestError::Discover)?;
        let links = extract_links(&root.body, &root.url, &self.settings.link_prefix);
        report.discovered = links.len() as u64;
        tracing::info!(links = links.len(), "links discovered");

        let total = links.len() as u64;
        for (i, url) in links.iter().enumerate() {
            if *shutdown.borrow() {
                tracing::info!(remaining = links.len() - i, "ingestion aborted by shutdown");
                report.aborted = true;
                break;
            }

            self.progress.report(IngestProgressEvent::Crawling {
                n: i as u64 + 1,
                total,
            });

            if self.is_fresh(url).await {
                tracing::debug!(url = %url, "skipping recently processed url");
                report.skipped += 1;
                continue;
            }

            match self.process_url(session, url).await {
                Ok(UrlOutcome::Indexed) => {
                    tracing::debug!(url = %url, "processed");
                    report.processed += 1;
                }
                Ok(UrlOutcome::Empty) => {
                    tracing::warn!(url = %url, "no content found");
                    report.empty += 1;
                }
                Err(e) => {
                    tracing::error!(url = %url, error = %e, "failed to process url");
                    report.errored += 1;
                }
            }

            pause(self.settings.delay, shutdown).await;
        }

        Ok(report)
    }

    /// Whether the newest stored record for `url` is inside the freshness
    /// window. Lookup failures count as stale.
    async fn is_fresh(&self, url: &str) -> bool {
        match self.store.latest_by_field("url", url).await {
            Ok(Some(newest)) => Utc::now() - newest.updated_at < self.settings.freshness_window,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "freshness lookup failed; treating as stale");
                false
            }
        }
    }

    async fn process_url(
        &self,
        session: &mut dyn PageSession,
        url: &str,
    ) -> anyhow::Result<UrlOutcome> {
        let page = session.load(url, self.settings.page_timeout).await?;

        let content = extract_text(&page.body, &self.settings.content_selectors);
        if content.is_empty() {
            return Ok(UrlOutcome::Empty);
        }

        let description = self.describe(url, &content).await;
        tracing::debug!(url = %url, description = %description, "generated description");

        let vector = self.embedder.embed(&description).await?;
        let record = ContentRecord::new(url, description, content, vector);
        self.store.upsert(&record).await?;
        Ok(UrlOutcome::Indexed)
    }

    /// Generate a bounded description of `content`, falling back to a
    /// placeholder derived from `url`.
    async fn describe(&self, url: &str, content: &str) -> String {
        let excerpt: String = content
            .chars()
            .take(self.settings.description_input_chars)
            .collect();
        let prompt = format!(
            "Generate a concise description of what this page is about. The page URL is: {}\n\nPage content: {}",
            url, excerpt
        );

        match self
            .generator
            .complete(
                &self.settings.description_system,
                &prompt,
                &self.settings.description_options,
            )
            .await
        {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    fallback_description(url)
                } else {
                    text.chars()
                        .take(self.settings.max_description_chars)
                        .collect::<String>()
                        .trim_end()
                        .to_string()
                }
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "description generation failed");
                fallback_description(url)
            }
        }
    }
}

pub fn fallback_description(url: &str) -> String {
    format!("Content from {}", url)
}

/// Sleep for `delay`, returning early once shutdown is signalled.
async fn pause(delay: Duration, shutdown: &mut watch::Receiver<bool>) {
    if delay.is_zero() {
        return;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = wait_for_shutdown(shutdown) => {}
    }
}

pub(crate) async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        // Sender gone: nobody can ask us to stop any more.
        std::future::pending::<()>().await;
    }
}
