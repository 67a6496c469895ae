mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use corpus_qa::ask::{AnswerSettings, Answerer, EMPTY_ANSWER};
use corpus_qa::cache::AnswerCache;
use corpus_qa_core::kv::memory::InMemoryCacheBackend;
use corpus_qa_core::kv::CacheBackend;
use corpus_qa_core::AskError;

struct Harness {
    answerer: Answerer,
    cache: Arc<AnswerCache>,
    embedder: Arc<FakeEmbedder>,
    store: Arc<FixedSearchStore>,
    generator: Arc<FakeGenerator>,
}

fn harness_with(
    backend: Arc<dyn CacheBackend>,
    embedder: FakeEmbedder,
    store: FixedSearchStore,
    generator: FakeGenerator,
) -> Harness {
    let config = test_config();
    let cache = Arc::new(AnswerCache::new(backend, &config.cache));
    let embedder = Arc::new(embedder);
    let store = Arc::new(store);
    let generator = Arc::new(generator);
    let answerer = Answerer::new(
        cache.clone(),
        embedder.clone(),
        store.clone(),
        generator.clone(),
        AnswerSettings::from_config(&config),
    );
    Harness {
        answerer,
        cache,
        embedder,
        store,
        generator,
    }
}

fn harness(store: FixedSearchStore, generator: FakeGenerator) -> Harness {
    harness_with(
        Arc::new(InMemoryCacheBackend::new()),
        FakeEmbedder::new(),
        store,
        generator,
    )
}

#[tokio::test]
async fn cache_miss_uses_all_contexts_and_top_source() {
    let h = harness(
        FixedSearchStore::new(&[("a", "X"), ("b", "Y")]),
        FakeGenerator::replying("The answer"),
    );

    let answer = h.answerer.answer("What is VAT?").await.unwrap();

    assert_eq!(answer.answer, "The answer");
    assert_eq!(answer.source, "a");
    assert!(!answer.served_from_cache);

    let calls = h.generator.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].user.contains('X'));
    assert!(calls[0].user.contains('Y'));
    assert!(calls[0].user.contains("What is VAT?"));
    assert_eq!(h.embedder.inputs.lock().unwrap().as_slice(), ["What is VAT?"]);
}

#[tokio::test]
async fn second_ask_is_served_from_cache() {
    let h = harness(
        FixedSearchStore::new(&[("a", "X")]),
        FakeGenerator::replying("Cached answer"),
    );

    let first = h.answerer.answer("What is VAT?").await.unwrap();
    let second = h.answerer.answer("  what IS vat? ").await.unwrap();

    assert!(second.served_from_cache);
    assert_eq!(second.answer, first.answer);
    assert_eq!(second.source, first.source);
    assert_eq!(second.timestamp, first.timestamp);
    assert_eq!(h.embedder.calls(), 1);
    assert_eq!(h.generator.calls().len(), 1);

    let stats = h.cache.stats().await;
    assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));
}

#[tokio::test]
async fn empty_retrieval_is_no_relevant_info_without_generation() {
    let h = harness(FixedSearchStore::new(&[]), FakeGenerator::replying("unused"));

    let err = h.answerer.answer("Unknown topic").await.unwrap_err();

    assert!(matches!(err, AskError::NoRelevantInfo));
    assert_eq!(err.code(), "no_relevant_info");
    assert!(h.generator.calls().is_empty());
    assert_eq!(h.cache.stats().await.size, 0);
}

#[tokio::test]
async fn blank_question_is_rejected_without_side_effects() {
    let h = harness(
        FixedSearchStore::new(&[("a", "X")]),
        FakeGenerator::replying("unused"),
    );

    let err = h.answerer.answer("   ").await.unwrap_err();

    assert!(matches!(err, AskError::Validation(_)));
    assert_eq!(h.embedder.calls(), 0);
    let stats = h.cache.stats().await;
    assert_eq!((stats.hits, stats.misses), (0, 0));
}

#[tokio::test]
async fn embedding_failure_is_processing_error() {
    let h = harness_with(
        Arc::new(InMemoryCacheBackend::new()),
        FakeEmbedder::failing(),
        FixedSearchStore::new(&[("a", "X")]),
        FakeGenerator::replying("unused"),
    );

    let err = h.answerer.answer("What is VAT?").await.unwrap_err();

    assert!(matches!(err, AskError::Processing(_)));
    assert_eq!(h.store.searches.load(Ordering::SeqCst), 0);
    assert_eq!(h.cache.stats().await.size, 0);
}

#[tokio::test]
async fn generation_failure_is_processing_error() {
    let h = harness(FixedSearchStore::new(&[("a", "X")]), FakeGenerator::failing());

    let err = h.answerer.answer("What is VAT?").await.unwrap_err();

    assert_eq!(err.code(), "processing_failed");
    assert_eq!(h.cache.stats().await.size, 0);
}

#[tokio::test]
async fn broken_cache_never_blocks_an_answer() {
    let h = harness_with(
        Arc::new(FailingCacheBackend),
        FakeEmbedder::new(),
        FixedSearchStore::new(&[("a", "X")]),
        FakeGenerator::replying("Still answered"),
    );

    let first = h.answerer.answer("What is VAT?").await.unwrap();
    let second = h.answerer.answer("What is VAT?").await.unwrap();

    assert_eq!(first.answer, "Still answered");
    assert!(!second.served_from_cache);
    assert_eq!(h.generator.calls().len(), 2);
}

#[tokio::test]
async fn empty_generation_falls_back_and_blank_content_is_replaced() {
    let h = harness(
        FixedSearchStore::new(&[("", ""), ("b", "Y")]),
        FakeGenerator::replying(""),
    );

    let answer = h.answerer.answer("What is VAT?").await.unwrap();

    assert_eq!(answer.answer, EMPTY_ANSWER);
    assert_eq!(answer.source, "Unknown source");
    assert!(h.generator.calls()[0].user.contains("No content available"));
}

#[tokio::test]
async fn top_k_limits_context() {
    let h = harness(
        FixedSearchStore::new(&[("a", "one"), ("b", "two"), ("c", "three"), ("d", "four")]),
        FakeGenerator::replying("ok"),
    );

    h.answerer.answer("q").await.unwrap();

    let user = &h.generator.calls()[0].user;
    assert!(user.contains("three"));
    assert!(!user.contains("four"));
}

#[tokio::test]
async fn web_mode_uses_label_and_shares_cache() {
    let h = harness(
        FixedSearchStore::new(&[("a", "X")]),
        FakeGenerator::replying("indexed").with_web_reply(
            "```json\n{\"content\": \"From the web\", \"links\": [\"https://gov.example\"]}\n```",
        ),
    );

    let web = h.answerer.answer_from_web("What is PIT?").await.unwrap();
    assert_eq!(web.answer, "From the web");
    assert_eq!(web.source, "podatki.gov.pl");
    assert!(!web.served_from_cache);

    let indexed = h.answerer.answer("what is pit?").await.unwrap();
    assert!(indexed.served_from_cache);
    assert_eq!(indexed.answer, "From the web");
    assert_eq!(h.embedder.calls(), 0);
    assert_eq!(h.generator.web_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn web_mode_keeps_raw_text() {
    let h = harness(
        FixedSearchStore::new(&[]),
        FakeGenerator::replying("").with_web_reply("Plain prose answer."),
    );

    let web = h.answerer.answer_from_web("q").await.unwrap();
    assert_eq!(web.answer, "Plain prose answer.");
}

#[tokio::test]
async fn cached_answer_expires_after_ttl() {
    let backend = Arc::new(InMemoryCacheBackend::new());
    let cache = Arc::new(AnswerCache::with_settings(
        backend,
        "ttl:",
        Duration::from_secs(1),
        100,
    ));
    let embedder = Arc::new(FakeEmbedder::new());
    let generator = Arc::new(FakeGenerator::replying("fresh"));
    let answerer = Answerer::new(
        cache.clone(),
        embedder.clone(),
        Arc::new(FixedSearchStore::new(&[("a", "X")])),
        generator.clone(),
        AnswerSettings::from_config(&test_config()),
    );

    answerer.answer("q").await.unwrap();
    assert!(answerer.answer("q").await.unwrap().served_from_cache);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(!answerer.answer("q").await.unwrap().served_from_cache);
    assert_eq!(generator.calls().len(), 2);
}
