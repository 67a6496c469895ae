//! In-memory [`CacheBackend`] with passive TTL expiry.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;

use super::CacheBackend;

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory cache backend.
///
/// Expired entries are invisible to every operation and are dropped
/// lazily on the next write.
pub struct InMemoryCacheBackend {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> anyhow::Error {
    anyhow::anyhow!("in-memory cache lock poisoned")
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set_string_with_expiry(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.retain(|_, e| e.is_live(now));
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + Duration::from_secs(ttl_secs),
            },
        );
        Ok(())
    }

    async fn list_keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let now = Instant::now();
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<u64> {
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let mut removed = 0;
        for key in keys {
            if let Some(e) = entries.remove(key) {
                if e.is_live(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}
