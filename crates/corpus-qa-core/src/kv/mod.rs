//! Key-value backing store for the answer cache.
//!
//! A deliberately narrow contract: string get, string set with expiry,
//! prefix listing, and bulk delete. Key namespacing is the caller's job;
//! the backend stores whatever keys it is given. Expiry is passive and
//! enforced by the backend itself.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

/// String store with per-key expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short backend name for logs (e.g. `"redis"`).
    fn name(&self) -> &str;

    /// Get a live (non-expired) value.
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Set `key` to `value`, expiring after `ttl_secs` seconds. Overwrites.
    async fn set_string_with_expiry(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// List every live key that starts with `prefix`.
    async fn list_keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete `keys`, returning how many existed.
    async fn delete_keys(&self, keys: &[String]) -> Result<u64>;
}

/// A backend that stores nothing. Every read misses.
///
/// Used when caching is turned off in configuration.
pub struct DisabledCacheBackend;

#[async_trait]
impl CacheBackend for DisabledCacheBackend {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn get_string(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set_string_with_expiry(&self, _key: &str, _value: &str, _ttl_secs: u64) -> Result<()> {
        Ok(())
    }

    async fn list_keys_by_prefix(&self, _prefix: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn delete_keys(&self, _keys: &[String]) -> Result<u64> {
        Ok(0)
    }
}
