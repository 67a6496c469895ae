//! # Corpus QA Core
//!
//! Runtime-agnostic contracts shared by the answering and ingestion
//! pipelines: data models, question fingerprinting, the error taxonomy,
//! and the narrow collaborator traits (embedding, generation, vector
//! store, cache backing store, page fetching).
//!
//! This crate contains no tokio, no HTTP client and no database driver.
//! Concrete clients live in the `corpus-qa` app crate; the in-memory
//! [`store::memory::InMemoryVectorStore`] and
//! [`kv::memory::InMemoryCacheBackend`] are provided here for tests and
//! local development.

pub mod browse;
pub mod embedding;
pub mod error;
pub mod fingerprint;
pub mod generation;
pub mod kv;
pub mod models;
pub mod store;

pub use error::{AskError, MalformedResponse};
pub use fingerprint::{fingerprint, normalize_question};
