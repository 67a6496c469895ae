//! In-memory [`VectorStore`] implementation for testing and local runs.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. Search is
//! brute-force over every stored vector using the collection's metric.

use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::{cosine_similarity, dot_product, neg_euclidean};
use crate::models::{ContentRecord, ScoredRecord};

use super::{CollectionSpec, Distance, VectorStore};

/// In-memory vector store.
pub struct InMemoryVectorStore {
    records: RwLock<Vec<ContentRecord>>,
    spec: RwLock<Option<CollectionSpec>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            spec: RwLock::new(None),
        }
    }

    /// Number of stored records, historical duplicates included.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored record.
    pub fn records(&self) -> Vec<ContentRecord> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }

    fn distance(&self) -> Distance {
        self.spec
            .read()
            .ok()
            .and_then(|s| s.as_ref().map(|s| s.distance))
            .unwrap_or_default()
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> anyhow::Error {
    anyhow::anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let mut current = self.spec.write().map_err(|_| poisoned())?;
        if current.is_none() {
            *current = Some(spec.clone());
        }
        Ok(())
    }

    async fn upsert(&self, record: &ContentRecord) -> Result<()> {
        if let Some(spec) = self.spec.read().map_err(|_| poisoned())?.as_ref() {
            if record.vector.len() != spec.vector_size {
                bail!(
                    "vector size mismatch: collection '{}' expects {}, got {}",
                    spec.name,
                    spec.vector_size,
                    record.vector.len()
                );
            }
        }
        let mut records = self.records.write().map_err(|_| poisoned())?;
        records.retain(|r| r.id != record.id);
        records.push(record.clone());
        Ok(())
    }

    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredRecord>> {
        let score: fn(&[f32], &[f32]) -> f32 = match self.distance() {
            Distance::Cosine => cosine_similarity,
            Distance::Dot => dot_product,
            Distance::Euclid => neg_euclidean,
        };
        let records = self.records.read().map_err(|_| poisoned())?;
        let mut scored: Vec<ScoredRecord> = records
            .iter()
            .map(|r| ScoredRecord {
                score: score(vector, &r.vector),
                record: r.clone(),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn find_by_field(
        &self,
        field: &str,
        value: &str,
        limit: usize,
    ) -> Result<Vec<ContentRecord>> {
        let matches = field_matcher(field, value)?;
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records
            .iter()
            .filter(|r| matches(*r))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn latest_by_field(&self, field: &str, value: &str) -> Result<Option<ContentRecord>> {
        let matches = field_matcher(field, value)?;
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records
            .iter()
            .filter(|r| matches(*r))
            .max_by_key(|r| r.updated_at)
            .cloned())
    }
}

fn field_matcher<'a>(field: &str, value: &'a str) -> Result<impl Fn(&ContentRecord) -> bool + 'a> {
    let by_url = match field {
        "url" => true,
        "id" => false,
        other => bail!("unsupported filter field: {}", other),
    };
    Ok(move |r: &ContentRecord| if by_url { r.url == value } else { r.id == value })
}
