//! Qdrant vector store over `qdrant-client`.
//!
//! Points carry the record id as the point id and the rest of the record
//! as payload:
//!
//! ```json
//! { "url": "...", "description": "...", "content": "...", "updated_at": "RFC 3339" }
//! ```
//!
//! `url` gets a keyword index and `updated_at` a datetime index, so the
//! newest record for a url is one ordered scroll away.
//! `QDRANT_API_KEY`, when set, is sent with every request.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, Direction, FieldType,
    Filter, OrderByBuilder, PointId, PointStruct, ScrollPointsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};

use corpus_qa_core::models::{ContentRecord, ScoredRecord};
use corpus_qa_core::store::{CollectionSpec, Distance, VectorStore};
use corpus_qa_core::MalformedResponse;

use crate::config::StoreConfig;

pub struct QdrantStore {
    client: Qdrant,
    collection: String,
}

impl QdrantStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let api_key = std::env::var("QDRANT_API_KEY").ok().filter(|k| !k.is_empty());
        let client = Qdrant::from_url(&config.url)
            .api_key(api_key)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .with_context(|| format!("Failed to build Qdrant client for {}", config.url))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
        })
    }

    async fn scroll(&self, builder: ScrollPointsBuilder) -> Result<Vec<ContentRecord>> {
        let response = self.client.scroll(builder).await.context("Qdrant scroll failed")?;
        response
            .result
            .into_iter()
            .map(|point| record_from_point(point.id, point.payload))
            .collect()
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()> {
        if spec.name != self.collection {
            bail!(
                "collection '{}' does not match configured collection '{}'",
                spec.name,
                self.collection
            );
        }

        let exists = self
            .client
            .collection_exists(spec.name.clone())
            .await
            .context("Qdrant collection lookup failed")?;

        if exists {
            tracing::debug!(collection = %spec.name, "collection already exists");
        } else {
            tracing::info!(
                collection = %spec.name,
                vector_size = spec.vector_size,
                distance = ?spec.distance,
                "creating collection"
            );
            self.client
                .create_collection(CreateCollectionBuilder::new(spec.name.clone()).vectors_config(
                    VectorParamsBuilder::new(spec.vector_size as u64, qdrant_distance(spec.distance)),
                ))
                .await
                .context("Qdrant create collection failed")?;
        }

        // Also runs for existing collections; re-creating an index is a no-op.
        let indexes = spec
            .indexed_fields
            .iter()
            .map(|f| (f, FieldType::Keyword))
            .chain(spec.ordered_fields.iter().map(|f| (f, FieldType::Datetime)));
        for (field, field_type) in indexes {
            self.client
                .create_field_index(
                    CreateFieldIndexCollectionBuilder::new(
                        spec.name.clone(),
                        field.clone(),
                        field_type,
                    )
                    .wait(true),
                )
                .await
                .with_context(|| format!("Qdrant payload index on '{}' failed", field))?;
        }

        Ok(())
    }

    async fn upsert(&self, record: &ContentRecord) -> Result<()> {
        let point = PointStruct::new(record.id.clone(), record.vector.clone(), payload_of(record));
        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection.clone(), vec![point]).wait(true))
            .await
            .context("Qdrant upsert failed")?;
        Ok(())
    }

    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredRecord>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(self.collection.clone(), vector.to_vec(), top_k as u64)
                    .with_payload(true),
            )
            .await
            .context("Qdrant search failed")?;

        response
            .result
            .into_iter()
            .map(|point| {
                Ok(ScoredRecord {
                    score: point.score,
                    record: record_from_point(point.id, point.payload)?,
                })
            })
            .collect()
    }

    async fn find_by_field(
        &self,
        field: &str,
        value: &str,
        limit: usize,
    ) -> Result<Vec<ContentRecord>> {
        self.scroll(
            ScrollPointsBuilder::new(self.collection.clone())
                .filter(field_filter(field, value)?)
                .limit(limit as u32)
                .with_payload(true)
                .with_vectors(false),
        )
        .await
    }

    async fn latest_by_field(&self, field: &str, value: &str) -> Result<Option<ContentRecord>> {
        let newest = self
            .scroll(
                ScrollPointsBuilder::new(self.collection.clone())
                    .filter(field_filter(field, value)?)
                    .order_by(OrderByBuilder::new("updated_at").direction(Direction::Desc.into()))
                    .limit(1)
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await?;
        Ok(newest.into_iter().next())
    }
}

fn qdrant_distance(distance: Distance) -> qdrant_client::qdrant::Distance {
    match distance {
        Distance::Cosine => qdrant_client::qdrant::Distance::Cosine,
        Distance::Dot => qdrant_client::qdrant::Distance::Dot,
        Distance::Euclid => qdrant_client::qdrant::Distance::Euclid,
    }
}

fn field_filter(field: &str, value: &str) -> Result<Filter> {
    let condition = match field {
        "url" => Condition::matches("url", value.to_string()),
        "id" => Condition::has_id([PointId::from(value.to_string())]),
        other => bail!("unsupported lookup field: {}", other),
    };
    Ok(Filter::must([condition]))
}

fn payload_of(record: &ContentRecord) -> Payload {
    let mut payload = Payload::new();
    payload.insert("url", record.url.clone());
    payload.insert("description", record.description.clone());
    payload.insert("content", record.content.clone());
    payload.insert("updated_at", record.updated_at.to_rfc3339());
    payload
}

/// Build a record from a point. Missing payload fields become empty
/// strings; an unreadable `updated_at` becomes the earliest representable
/// instant so the record never counts as fresh. Vectors are not fetched,
/// so `vector` is left empty.
fn record_from_point(id: Option<PointId>, payload: HashMap<String, Value>) -> Result<ContentRecord> {
    let id = match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => return Err(MalformedResponse::new("qdrant", "point without id").into()),
    };

    let text = |key: &str| match payload.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => s.clone(),
        _ => String::new(),
    };

    let raw_updated = text("updated_at");
    let updated_at = match DateTime::parse_from_rfc3339(&raw_updated) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(_) => {
            tracing::warn!(id = %id, updated_at = %raw_updated, "unparsable updated_at on point");
            DateTime::<Utc>::MIN_UTC
        }
    };

    Ok(ContentRecord {
        id,
        url: text("url"),
        description: text("description"),
        content: text("content"),
        vector: Vec::new(),
        updated_at,
    })
}
