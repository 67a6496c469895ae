//! Core data models shared by the answering and ingestion pipelines.
//!
//! These types describe what flows through the system: cached answers and
//! their statistics, indexed content records, fetched pages, and the
//! outcomes reported upward to the transport layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An answer previously computed for a question, as held by the answer cache.
///
/// Serialized as JSON by cache backends. Replaced only by full overwrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAnswer {
    pub answer: String,
    /// URL of the best-matching record, or a fixed label for external retrieval.
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

/// Answer cache statistics.
///
/// `hits` and `misses` are process-lifetime counters; `size` is recomputed
/// from the backing store on every read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: u64,
}

/// One indexed unit of the corpus.
///
/// `url` is the natural external key, but the store may hold several
/// historical records for the same url. A record counts as current only
/// while `updated_at` falls inside the freshness window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    pub url: String,
    /// Short generated summary; this is what `vector` embeds.
    pub description: String,
    /// Full extracted page text.
    pub content: String,
    #[serde(skip)]
    pub vector: Vec<f32>,
    pub updated_at: DateTime<Utc>,
}

impl ContentRecord {
    /// Build a record under a freshly generated identifier, stamped now.
    pub fn new(url: &str, description: String, content: String, vector: Vec<f32>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.to_string(),
            description,
            content,
            vector,
            updated_at: Utc::now(),
        }
    }
}

/// A record returned from similarity search, with its score.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    /// Similarity score; higher is more similar.
    pub score: f32,
    pub record: ContentRecord,
}

/// Raw page body as returned by a [`crate::browse::PageSession`].
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    pub body: String,
}

/// The outcome of a successfully answered question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub served_from_cache: bool,
}

impl Answer {
    pub fn from_cache(cached: CachedAnswer) -> Self {
        Self {
            answer: cached.answer,
            source: cached.source,
            timestamp: cached.timestamp,
            served_from_cache: true,
        }
    }

    pub fn to_cached(&self) -> CachedAnswer {
        CachedAnswer {
            answer: self.answer.clone(),
            source: self.source.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// Run-level counters emitted when an ingestion run reaches teardown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Links discovered in the crawl root (after dedup).
    pub discovered: u64,
    /// Records written to the vector store.
    pub processed: u64,
    /// URLs skipped because a fresh record already exists.
    pub skipped: u64,
    /// URLs whose page yielded no text.
    pub empty: u64,
    /// URLs that failed somewhere between fetch and upsert.
    pub errored: u64,
    /// True if a shutdown signal stopped the run before the link set was exhausted.
    pub aborted: bool,
}
