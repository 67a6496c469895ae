//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the only way the pipelines touch indexed
//! content. Writes are appends under fresh identifiers: a newer record for
//! a url does not replace older ones, and freshness is decided by the
//! newest `updated_at` among a url's records, never by uniqueness.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{ContentRecord, ScoredRecord};

/// Similarity metric for a collection. Names match Qdrant's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

/// Parameters for [`VectorStore::ensure_collection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub vector_size: usize,
    pub distance: Distance,
    /// Payload fields that need an exact-match index (e.g. `"url"`).
    pub indexed_fields: Vec<String>,
    /// Timestamp payload fields that lookups order by (e.g. `"updated_at"`).
    pub ordered_fields: Vec<String>,
}

/// Abstract vector store backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_collection`](VectorStore::ensure_collection) | Create the collection and indexes if absent |
/// | [`upsert`](VectorStore::upsert) | Write one record |
/// | [`search`](VectorStore::search) | Top-k similarity search, most similar first |
/// | [`find_by_field`](VectorStore::find_by_field) | Exact-match payload lookup |
/// | [`latest_by_field`](VectorStore::latest_by_field) | Newest record matching a payload field |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotently create the collection described by `spec`.
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()>;

    /// Write `record` under `record.id`.
    async fn upsert(&self, record: &ContentRecord) -> Result<()>;

    /// Return at most `top_k` records ordered by descending similarity.
    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredRecord>>;

    /// Return at most `limit` records whose payload `field` equals `value`.
    ///
    /// Supported fields: `"url"`, `"id"`. Order is unspecified.
    async fn find_by_field(&self, field: &str, value: &str, limit: usize)
        -> Result<Vec<ContentRecord>>;

    /// Return the record with the greatest `updated_at` among all records
    /// whose payload `field` equals `value`, however many there are.
    ///
    /// Supported fields: `"url"`, `"id"`.
    async fn latest_by_field(&self, field: &str, value: &str) -> Result<Option<ContentRecord>>;
}
