//! # Corpus QA
//!
//! Cache-aside question answering over a crawled document corpus.
//!
//! Questions are answered from an answer cache when possible, otherwise
//! by retrieval-augmented generation against a vector store. A crawl
//! pipeline keeps the store fresh, re-describing and re-embedding only
//! pages whose newest record has aged out of the freshness window.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!  question ─────▶│ Answer cache │──hit──▶ answer
//!                 └──────┬───────┘
//!                        │miss
//!                        ▼
//!  ┌──────────┐   ┌──────────────┐   ┌────────────┐
//!  │ Embedder │──▶│ Vector store │──▶│ Generation │──▶ answer (cached)
//!  └──────────┘   └──────▲───────┘   └────────────┘
//!                        │ append
//!  ┌──────────┐   ┌──────┴───────┐
//!  │ Crawl    │──▶│  Ingestor    │  (scheduler / CLI / POST /api/ingest)
//!  │ root     │   │ describe+embed│
//!  └──────────┘   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`app`] | Component wiring and the operations transports call |
//! | [`ask`] | Retrieval-augmented answering pipeline |
//! | [`cache`] | Fail-open answer cache |
//! | [`ingest`] | Freshness-gated crawl pipeline |
//! | [`scheduler`] | Startup and periodic ingestion trigger |
//! | [`progress`] | Ingestion progress reporting |
//! | [`embedding`] | OpenAI / Ollama embedding clients |
//! | [`generation`] | OpenAI-compatible generation client |
//! | [`qdrant`] | Qdrant vector store (REST) |
//! | [`redis_cache`] | Redis cache backend |
//! | [`fetch`] | HTTP page fetching |
//! | [`extract`] | HTML text and link extraction |
//! | [`server`] | HTTP API |
//!
//! Data models and collaborator traits live in the `corpus-qa-core` crate.

pub mod app;
pub mod ask;
pub mod cache;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod fetch;
pub mod generation;
pub mod ingest;
pub mod progress;
pub mod qdrant;
pub mod redis_cache;
pub mod scheduler;
pub mod server;
