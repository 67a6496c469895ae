//! Redis [`CacheBackend`].
//!
//! Uses a multiplexed [`ConnectionManager`], which reconnects on its own,
//! so a Redis restart costs a few failed (fail-open) cache calls rather
//! than a process restart. Expiry is Redis' own `SETEX`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use corpus_qa_core::kv::CacheBackend;

pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    pub async fn connect(url: &str) -> Result<Self> {
        let client =
            redis::Client::open(url).with_context(|| format!("Invalid Redis URL: {}", url))?;
        let conn = client
            .get_connection_manager()
            .await
            .with_context(|| format!("Failed to connect to Redis at {}", url))?;
        tracing::info!(url, "connected to redis");
        Ok(Self { conn })
    }
}

/// Escape glob metacharacters so a prefix matches literally in `KEYS`.
fn glob_escape(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_string_with_expiry(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn list_keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", glob_escape(prefix));
        let keys: Vec<String> = conn.keys(pattern).await?;
        Ok(keys)
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(keys).await?;
        Ok(removed)
    }
}
