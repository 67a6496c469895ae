//! Fakes for the collaborator traits, shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use corpus_qa::config::Config;
use corpus_qa_core::browse::{Browser, PageSession};
use corpus_qa_core::embedding::EmbeddingClient;
use corpus_qa_core::generation::{CompletionOptions, ExternalAnswer, GenerationClient};
use corpus_qa_core::kv::CacheBackend;
use corpus_qa_core::models::{ContentRecord, FetchedPage, ScoredRecord};
use corpus_qa_core::store::{CollectionSpec, VectorStore};

pub const DIMS: usize = 3;
pub const ROOT: &str = "https://site.example/map";
pub const PREFIX: &str = "https://site.example/";

/// A config with in-memory backends and a 3-dimensional embedding.
pub fn test_config() -> Config {
    let raw = format!(
        r#"
[embedding]
provider = "ollama"
dims = {dims}

[store]
backend = "memory"

[cache]
backend = "memory"
key_prefix = "test:"

[ingest]
sitemap_url = "{root}"
link_prefix = "{prefix}"
delay_ms = 0

[schedule]
run_on_startup = false
interval_minutes = 0
"#,
        dims = DIMS,
        root = ROOT,
        prefix = PREFIX,
    );
    let config: Config = toml::from_str(&raw).unwrap();
    corpus_qa::config::validate(&config).unwrap();
    config
}

// ============ Embedding ============

pub struct FakeEmbedder {
    pub vector: Vec<f32>,
    pub fail: bool,
    pub calls: AtomicU64,
    pub inputs: Mutex<Vec<String>>,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self {
            vector: vec![1.0, 0.0, 0.0],
            fail: false,
            calls: AtomicU64::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingClient for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake"
    }

    fn dims(&self) -> usize {
        self.vector.len()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(text.to_string());
        if self.fail {
            bail!("embedding service unavailable");
        }
        Ok(self.vector.clone())
    }
}

// ============ Generation ============

#[derive(Debug, Clone)]
pub struct CompletionCall {
    pub system: String,
    pub user: String,
    pub options: CompletionOptions,
}

pub struct FakeGenerator {
    pub reply: String,
    pub web_reply: String,
    pub fail: bool,
    pub calls: Mutex<Vec<CompletionCall>>,
    pub web_calls: AtomicU64,
}

impl FakeGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            web_reply: String::new(),
            fail: false,
            calls: Mutex::new(Vec::new()),
            web_calls: AtomicU64::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::replying("")
        }
    }

    pub fn with_web_reply(mut self, reply: &str) -> Self {
        self.web_reply = reply.to_string();
        self
    }

    pub fn calls(&self) -> Vec<CompletionCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationClient for FakeGenerator {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(CompletionCall {
            system: system_prompt.to_string(),
            user: user_prompt.to_string(),
            options: options.clone(),
        });
        if self.fail {
            bail!("generation service unavailable");
        }
        Ok(self.reply.clone())
    }

    async fn complete_with_external_retrieval(&self, _question: &str) -> Result<ExternalAnswer> {
        self.web_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("generation service unavailable");
        }
        Ok(ExternalAnswer::parse(&self.web_reply))
    }
}

// ============ Vector store ============

/// Returns a fixed result list from `search`; everything else is a no-op.
pub struct FixedSearchStore {
    pub results: Vec<ScoredRecord>,
    pub searches: AtomicU64,
}

impl FixedSearchStore {
    pub fn new(hits: &[(&str, &str)]) -> Self {
        let results = hits
            .iter()
            .enumerate()
            .map(|(i, (url, content))| ScoredRecord {
                score: 1.0 - i as f32 * 0.1,
                record: ContentRecord::new(url, String::new(), content.to_string(), vec![]),
            })
            .collect();
        Self {
            results,
            searches: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl VectorStore for FixedSearchStore {
    async fn ensure_collection(&self, _spec: &CollectionSpec) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, _record: &ContentRecord) -> Result<()> {
        Ok(())
    }

    async fn search(&self, _vector: &[f32], top_k: usize) -> Result<Vec<ScoredRecord>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.iter().take(top_k).cloned().collect())
    }

    async fn find_by_field(
        &self,
        _field: &str,
        _value: &str,
        _limit: usize,
    ) -> Result<Vec<ContentRecord>> {
        Ok(Vec::new())
    }

    async fn latest_by_field(&self, _field: &str, _value: &str) -> Result<Option<ContentRecord>> {
        Ok(None)
    }
}

// ============ Cache backend ============

pub struct FailingCacheBackend;

#[async_trait]
impl CacheBackend for FailingCacheBackend {
    fn name(&self) -> &str {
        "failing"
    }

    async fn get_string(&self, _key: &str) -> Result<Option<String>> {
        bail!("connection refused")
    }

    async fn set_string_with_expiry(&self, _key: &str, _value: &str, _ttl: u64) -> Result<()> {
        bail!("connection refused")
    }

    async fn list_keys_by_prefix(&self, _prefix: &str) -> Result<Vec<String>> {
        bail!("connection refused")
    }

    async fn delete_keys(&self, _keys: &[String]) -> Result<u64> {
        bail!("connection refused")
    }
}

// ============ Browser ============

/// Serves canned pages. URLs without a page fail to load.
#[derive(Clone, Default)]
pub struct FakeBrowser {
    pages: Arc<HashMap<String, String>>,
    pub fail_launch: bool,
    pub launched: Arc<AtomicU64>,
    pub closed: Arc<AtomicU64>,
    pub loads: Arc<Mutex<Vec<String>>>,
    pub load_delay: Duration,
}

impl FakeBrowser {
    pub fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: Arc::new(
                pages
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_string()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// A crawl root linking to `links`, plus a page body for each link
    /// that has one.
    pub fn site(links: &[&str], bodies: &[(&str, String)]) -> Self {
        let anchors: String = links
            .iter()
            .map(|l| format!("<a href=\"{}\">{}</a>", l, l))
            .collect();
        let mut pages: HashMap<String, String> = bodies
            .iter()
            .map(|(url, body)| (url.to_string(), body.clone()))
            .collect();
        pages.insert(
            ROOT.to_string(),
            format!("<html><body>{}</body></html>", anchors),
        );
        Self {
            pages: Arc::new(pages),
            ..Self::default()
        }
    }

    pub fn launched(&self) -> u64 {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn launch(&self) -> Result<Box<dyn PageSession>> {
        if self.fail_launch {
            bail!("browser binary not found");
        }
        self.launched.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            browser: self.clone(),
        }))
    }
}

struct FakeSession {
    browser: FakeBrowser,
}

#[async_trait]
impl PageSession for FakeSession {
    async fn load(&mut self, url: &str, _timeout: Duration) -> Result<FetchedPage> {
        self.browser.loads.lock().unwrap().push(url.to_string());
        if !self.browser.load_delay.is_zero() {
            tokio::time::sleep(self.browser.load_delay).await;
        }
        let body = self
            .browser
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("navigation to {} timed out", url))?;
        Ok(FetchedPage {
            url: url.to_string(),
            body,
        })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.browser.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// An HTML page whose main region holds `text`.
pub fn page(text: &str) -> String {
    format!(
        "<html><body><nav>Menu</nav><main><p>{}</p></main></body></html>",
        text
    )
}
