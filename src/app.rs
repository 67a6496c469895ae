//! Application container.
//!
//! [`App`] owns every long-lived client, built explicitly from
//! configuration, and exposes the operations the transports call:
//! answering, ingestion, cache statistics and cache clearing. There are no
//! global singletons; tests assemble an `App` from fakes via
//! [`Components`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tokio::sync::watch;

use corpus_qa_core::browse::Browser;
use corpus_qa_core::embedding::EmbeddingClient;
use corpus_qa_core::generation::GenerationClient;
use corpus_qa_core::kv::memory::InMemoryCacheBackend;
use corpus_qa_core::kv::{CacheBackend, DisabledCacheBackend};
use corpus_qa_core::models::{Answer, CacheStats, IngestReport};
use corpus_qa_core::store::memory::InMemoryVectorStore;
use corpus_qa_core::store::{CollectionSpec, VectorStore};
use corpus_qa_core::AskError;

use crate::ask::{AnswerSettings, Answerer};
use crate::cache::AnswerCache;
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::fetch::HttpBrowser;
use crate::generation::OpenAiGenerator;
use crate::ingest::{IngestError, IngestSettings, Ingestor};
use crate::progress::{IngestProgressReporter, NoProgress};
use crate::qdrant::QdrantStore;
use crate::redis_cache::RedisBackend;

/// The collaborators an [`App`] is assembled from.
pub struct Components {
    pub embedder: Arc<dyn EmbeddingClient>,
    pub generator: Arc<dyn GenerationClient>,
    pub store: Arc<dyn VectorStore>,
    pub cache_backend: Arc<dyn CacheBackend>,
    pub browser: Arc<dyn Browser>,
    pub progress: Arc<dyn IngestProgressReporter>,
}

impl Components {
    /// Build the real clients named by `config`.
    ///
    /// An unreachable Redis does not fail startup: caching is switched off
    /// and the error is logged.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let generator: Arc<dyn GenerationClient> = Arc::new(OpenAiGenerator::new(
            &config.generation,
            &config.prompts,
            config.embedding.max_retries,
        )?);

        let store: Arc<dyn VectorStore> = match config.store.backend.as_str() {
            "qdrant" => Arc::new(QdrantStore::new(&config.store)?),
            "memory" => Arc::new(InMemoryVectorStore::new()),
            other => bail!("Unknown store backend: {}", other),
        };

        let cache_backend: Arc<dyn CacheBackend> = match config.cache.backend.as_str() {
            "redis" => match RedisBackend::connect(&config.cache.url).await {
                Ok(backend) => Arc::new(backend),
                Err(e) => {
                    tracing::error!(error = ?e, "redis unavailable; answer caching disabled");
                    Arc::new(DisabledCacheBackend)
                }
            },
            "memory" => Arc::new(InMemoryCacheBackend::new()),
            "disabled" => Arc::new(DisabledCacheBackend),
            other => bail!("Unknown cache backend: {}", other),
        };

        Ok(Self {
            embedder,
            generator,
            store,
            cache_backend,
            browser: Arc::new(HttpBrowser::new(config.ingest.user_agent.clone())),
            progress: Arc::new(NoProgress),
        })
    }
}

pub struct App {
    config: Config,
    cache: Arc<AnswerCache>,
    answerer: Answerer,
    ingestor: Arc<Ingestor>,
    shutdown: watch::Sender<bool>,
    started_at: Instant,
}

impl App {
    /// Build every client from `config` and bootstrap the collection.
    pub async fn init(config: Config) -> Result<Self> {
        let components = Components::from_config(&config).await?;
        Self::assemble(config, components).await
    }

    /// Wire an `App` from already-built collaborators.
    pub async fn assemble(config: Config, components: Components) -> Result<Self> {
        if config.embedding.is_enabled() {
            let spec = CollectionSpec {
                name: config.store.collection.clone(),
                vector_size: config.embedding.dims,
                distance: config.store.distance,
                indexed_fields: vec!["url".to_string()],
                ordered_fields: vec!["updated_at".to_string()],
            };
            components
                .store
                .ensure_collection(&spec)
                .await
                .with_context(|| format!("Failed to prepare collection '{}'", spec.name))?;
        } else {
            tracing::warn!("embedding provider disabled; answering and ingestion will fail");
        }

        let cache = Arc::new(AnswerCache::new(components.cache_backend, &config.cache));
        tracing::info!(
            backend = cache.backend_name(),
            max_size = config.cache.max_size,
            ttl_minutes = config.cache.ttl_minutes,
            "answer cache ready"
        );

        let answerer = Answerer::new(
            cache.clone(),
            components.embedder.clone(),
            components.store.clone(),
            components.generator.clone(),
            AnswerSettings::from_config(&config),
        );

        let ingestor = Arc::new(
            Ingestor::new(
                components.browser,
                components.store,
                components.embedder,
                components.generator,
                IngestSettings::from_config(&config),
            )
            .with_progress(components.progress),
        );

        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            cache,
            answerer,
            ingestor,
            shutdown,
            started_at: Instant::now(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn ingestor(&self) -> Arc<Ingestor> {
        self.ingestor.clone()
    }

    /// A receiver that flips to `true` once [`App::shutdown`] is called.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub async fn answer_question(&self, question: &str) -> Result<Answer, AskError> {
        self.answerer.answer(question).await
    }

    pub async fn answer_question_from_web(&self, question: &str) -> Result<Answer, AskError> {
        self.answerer.answer_from_web(question).await
    }

    pub async fn run_ingestion(&self) -> Result<IngestReport, IngestError> {
        self.ingestor.run(self.shutdown_signal()).await
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Returns the number of entries removed.
    pub async fn clear_cache(&self) -> u64 {
        self.cache.clear().await
    }

    /// Signal every in-flight ingestion run and the scheduler to stop.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        tracing::info!("shutdown requested");
    }
}
