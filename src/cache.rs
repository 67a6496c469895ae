//! Answer cache.
//!
//! Cache-aside storage of question → [`CachedAnswer`], keyed by
//! `key_prefix + fingerprint(question)` so that questions differing only
//! in case or whitespace share an entry. Values are JSON.
//!
//! The cache is fail-open: a backend error on read is a miss, a backend
//! error on write is dropped, and both are logged at `error`. Nothing in
//! this module returns an error to its caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use corpus_qa_core::fingerprint;
use corpus_qa_core::kv::CacheBackend;
use corpus_qa_core::models::{CacheStats, CachedAnswer};

use crate::config::CacheConfig;

pub struct AnswerCache {
    backend: Arc<dyn CacheBackend>,
    prefix: String,
    ttl: Duration,
    max_size: u64,
    hits: AtomicU64,
    misses: AtomicU64,
    last_size: AtomicU64,
}

impl AnswerCache {
    pub fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self::with_settings(backend, &config.key_prefix, config.ttl(), config.max_size)
    }

    pub fn with_settings(
        backend: Arc<dyn CacheBackend>,
        prefix: &str,
        ttl: Duration,
        max_size: u64,
    ) -> Self {
        Self {
            backend,
            prefix: prefix.to_string(),
            ttl,
            max_size,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            last_size: AtomicU64::new(0),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    fn key(&self, question: &str) -> String {
        format!("{}{}", self.prefix, fingerprint(question))
    }

    fn miss(&self) -> Option<CachedAnswer> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Look up the answer for `question`. Any failure is a miss.
    pub async fn get(&self, question: &str) -> Option<CachedAnswer> {
        let key = self.key(question);

        let raw = match self.backend.get_string(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return self.miss(),
            Err(e) => {
                tracing::error!(backend = self.backend.name(), error = %e, "cache read failed");
                return self.miss();
            }
        };

        match serde_json::from_str::<CachedAnswer>(&raw) {
            Ok(answer) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key, "cache hit");
                Some(answer)
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "unreadable cache entry");
                self.miss()
            }
        }
    }

    /// Store `answer` for `question`, replacing any previous entry.
    pub async fn set(&self, question: &str, answer: &CachedAnswer) {
        let key = self.key(question);

        let value = match serde_json::to_string(answer) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize cache entry");
                return;
            }
        };

        if let Err(e) = self
            .backend
            .set_string_with_expiry(&key, &value, self.ttl.as_secs())
            .await
        {
            tracing::error!(backend = self.backend.name(), error = %e, "cache write failed");
            return;
        }

        if let Some(size) = self.count().await {
            if size > self.max_size {
                tracing::warn!(
                    size,
                    max_size = self.max_size,
                    "answer cache above advisory size; relying on backend expiry"
                );
            }
        }
    }

    /// Count the entries under the prefix and remember the result.
    async fn count(&self) -> Option<u64> {
        match self.backend.list_keys_by_prefix(&self.prefix).await {
            Ok(keys) => {
                let size = keys.len() as u64;
                self.last_size.store(size, Ordering::Relaxed);
                Some(size)
            }
            Err(e) => {
                tracing::error!(backend = self.backend.name(), error = %e, "cache size lookup failed");
                None
            }
        }
    }

    /// Current counters plus a freshly counted size.
    ///
    /// If the backend cannot be listed, the last known size is reported.
    pub async fn stats(&self) -> CacheStats {
        let size = match self.count().await {
            Some(size) => size,
            None => self.last_size.load(Ordering::Relaxed),
        };

        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size,
        }
    }

    /// Remove every entry under this cache's prefix. Hit and miss counters
    /// are lifetime totals and are left alone. Returns how many entries
    /// were removed.
    pub async fn clear(&self) -> u64 {
        let keys = match self.backend.list_keys_by_prefix(&self.prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!(backend = self.backend.name(), error = %e, "cache clear failed");
                return 0;
            }
        };

        match self.backend.delete_keys(&keys).await {
            Ok(removed) => {
                self.last_size.store(0, Ordering::Relaxed);
                tracing::info!(removed, "answer cache cleared");
                removed
            }
            Err(e) => {
                tracing::error!(backend = self.backend.name(), error = %e, "cache clear failed");
                0
            }
        }
    }
}
