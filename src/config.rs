//! TOML configuration parsing and validation.
//!
//! Every section except `[ingest]` has workable defaults, so a minimal
//! config names only the crawl root. Secrets are not read from the file:
//! `OPENAI_API_KEY` and `QDRANT_API_KEY` come from the environment (a
//! `.env` file is honoured by the binary).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use corpus_qa_core::store::Distance;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub ingest: IngestConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Include the underlying error message in 500 responses.
    #[serde(default)]
    pub expose_error_detail: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            expose_error_detail: false,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,
    #[serde(default = "default_answer_model")]
    pub answer_model: String,
    #[serde(default = "default_description_model")]
    pub description_model: String,
    #[serde(default = "default_answer_model")]
    pub web_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_answer_max_tokens")]
    pub answer_max_tokens: u32,
    #[serde(default = "default_description_max_tokens")]
    pub description_max_tokens: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_generation_base_url(),
            answer_model: default_answer_model(),
            description_model: default_description_model(),
            web_model: default_answer_model(),
            temperature: default_temperature(),
            answer_max_tokens: default_answer_max_tokens(),
            description_max_tokens: default_description_max_tokens(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_answer_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_description_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_answer_max_tokens() -> u32 {
    1000
}
fn default_description_max_tokens() -> u32 {
    100
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: String,
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub distance: Distance,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            url: default_qdrant_url(),
            collection: default_collection(),
            distance: Distance::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_store_backend() -> String {
    "qdrant".to_string()
}
fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}
fn default_collection() -> String {
    "tax_info".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_backend")]
    pub backend: String,
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Advisory only; capacity is left to the backend's own eviction.
    #[serde(default = "default_max_size")]
    pub max_size: u64,
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
            max_size: default_max_size(),
            ttl_minutes: default_ttl_minutes(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes * 60)
    }
}

fn default_cache_backend() -> String {
    "redis".to_string()
}
fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}
fn default_key_prefix() -> String {
    "tax_qa:".to_string()
}
fn default_max_size() -> u64 {
    1000
}
fn default_ttl_minutes() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Source attribution used by the internet-augmented mode.
    #[serde(default = "default_web_source_label")]
    pub web_source_label: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            web_source_label: default_web_source_label(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_web_source_label() -> String {
    "podatki.gov.pl".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Crawl root whose anchors form the link set.
    pub sitemap_url: String,
    /// Only links starting with this prefix are harvested.
    pub link_prefix: String,
    #[serde(default = "default_freshness_window_hours")]
    pub freshness_window_hours: u64,
    #[serde(default = "default_sitemap_timeout_secs")]
    pub sitemap_timeout_secs: u64,
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_content_selectors")]
    pub content_selectors: Vec<String>,
    #[serde(default = "default_description_input_chars")]
    pub description_input_chars: usize,
    #[serde(default = "default_max_description_chars")]
    pub max_description_chars: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_freshness_window_hours() -> u64 {
    4
}
fn default_sitemap_timeout_secs() -> u64 {
    60
}
fn default_page_timeout_secs() -> u64 {
    30
}
fn default_delay_ms() -> u64 {
    500
}
fn default_content_selectors() -> Vec<String> {
    vec!["main".to_string(), "article".to_string(), "body".to_string()]
}
fn default_description_input_chars() -> usize {
    4000
}
fn default_max_description_chars() -> usize {
    300
}
fn default_user_agent() -> String {
    format!("corpus-qa/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
    /// Minutes between scheduled runs; `0` turns the timer off.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            run_on_startup: true,
            interval_minutes: default_interval_minutes(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_interval_minutes() -> u64 {
    240
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptsConfig {
    #[serde(default = "default_answer_system")]
    pub answer_system: String,
    #[serde(default = "default_description_system")]
    pub description_system: String,
    #[serde(default = "default_web_instructions")]
    pub web_instructions: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            answer_system: default_answer_system(),
            description_system: default_description_system(),
            web_instructions: default_web_instructions(),
        }
    }
}

fn default_answer_system() -> String {
    "You are a helpful assistant that answers questions based on the information provided. \
     Your answers should be concise, accurate, and based only on the information provided."
        .to_string()
}
fn default_description_system() -> String {
    "You are a helpful assistant that generates concise and accurate descriptions of web pages. \
     Create a short description (max 150 characters) that summarizes what this page is about."
        .to_string()
}
fn default_web_instructions() -> String {
    "You are a helpful assistant who answers questions using authoritative websites. \
     Your answers should be concise and accurate. Return data in json format with the \
     following structure {\"content\": \"answer\", \"links\": [\"link to source\"], \
     \"title\": \"title based on content\", \"keywords\": [\"keyword\"]}"
        .to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Reject configurations the pipelines cannot run with.
pub fn validate(config: &Config) -> Result<()> {
    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }

    if config.cache.ttl_minutes == 0 {
        bail!("cache.ttl_minutes must be >= 1");
    }

    if config.ingest.freshness_window_hours == 0 {
        bail!("ingest.freshness_window_hours must be >= 1");
    }

    if config.ingest.content_selectors.is_empty() {
        bail!("ingest.content_selectors must not be empty");
    }

    if url::Url::parse(&config.ingest.sitemap_url).is_err() {
        bail!("ingest.sitemap_url is not a valid URL: '{}'", config.ingest.sitemap_url);
    }

    if config.embedding.is_enabled() && config.embedding.dims == 0 {
        bail!(
            "embedding.dims must be > 0 when provider is '{}'",
            config.embedding.provider
        );
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    match config.store.backend.as_str() {
        "qdrant" | "memory" => {}
        other => bail!("Unknown store backend: '{}'. Must be qdrant or memory.", other),
    }

    match config.cache.backend.as_str() {
        "redis" | "memory" | "disabled" => {}
        other => bail!(
            "Unknown cache backend: '{}'. Must be redis, memory, or disabled.",
            other
        ),
    }

    Ok(())
}
