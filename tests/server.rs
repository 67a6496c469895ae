mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use common::*;
use corpus_qa::app::{App, Components};
use corpus_qa::progress::NoProgress;
use corpus_qa::server::build_router;
use corpus_qa_core::kv::memory::InMemoryCacheBackend;
use corpus_qa_core::store::memory::InMemoryVectorStore;
use corpus_qa_core::store::VectorStore;

struct TestServer {
    base: String,
    client: reqwest::Client,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

async fn start(
    store: Arc<dyn VectorStore>,
    generator: FakeGenerator,
    browser: FakeBrowser,
) -> TestServer {
    let components = Components {
        embedder: Arc::new(FakeEmbedder::new()),
        generator: Arc::new(generator),
        store,
        cache_backend: Arc::new(InMemoryCacheBackend::new()),
        browser: Arc::new(browser),
        progress: Arc::new(NoProgress),
    };
    let app = Arc::new(App::assemble(test_config(), components).await.unwrap());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(app)).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
    }
}

async fn start_answering(hits: &[(&str, &str)], generator: FakeGenerator) -> TestServer {
    start(
        Arc::new(FixedSearchStore::new(hits)),
        generator,
        FakeBrowser::new(&[]),
    )
    .await
}

#[tokio::test]
async fn health_reports_ok() {
    let server = start_answering(&[], FakeGenerator::replying("")).await;

    let (status, body) = server.get("/health").await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
    assert!(body["uptime_secs"].is_u64());
}

#[tokio::test]
async fn ask_answers_then_serves_from_cache() {
    let server = start_answering(&[("a", "X")], FakeGenerator::replying("VAT is 23%")).await;

    let (status, first) = server
        .post("/api/ask", json!({ "question": "What is VAT?" }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(first["answer"], "VAT is 23%");
    assert_eq!(first["source"], "a");
    assert!(first.get("cached").is_none());

    let (status, second) = server
        .post("/api/ask", json!({ "question": "what is vat?" }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(second["cached"], true);
    assert_eq!(second["answer"], first["answer"]);
    assert_eq!(second["timestamp"], first["timestamp"]);
}

#[tokio::test]
async fn ask_rejects_missing_or_non_string_question() {
    let server = start_answering(&[("a", "X")], FakeGenerator::replying("unused")).await;

    for body in [json!({}), json!({ "question": 42 }), json!({ "q": "x" })] {
        let (status, resp) = server.post("/api/ask", body).await;
        assert_eq!(status, 400);
        assert_eq!(resp["error"]["code"], "bad_request");
    }

    let resp = server
        .client
        .post(server.url("/api/ask"))
        .header("content-type", "application/json")
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn ask_without_relevant_content_is_404() {
    let server = start_answering(&[], FakeGenerator::replying("unused")).await;

    let (status, body) = server
        .post("/api/ask", json!({ "question": "Unknown topic" }))
        .await;

    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "no_relevant_info");
}

#[tokio::test]
async fn processing_failure_is_500_without_detail() {
    let server = start_answering(&[("a", "X")], FakeGenerator::failing()).await;

    let (status, body) = server
        .post("/api/ask", json!({ "question": "What is VAT?" }))
        .await;

    assert_eq!(status, 500);
    assert_eq!(body["error"]["code"], "processing_failed");
    let message = body["error"]["message"].as_str().unwrap();
    assert!(!message.contains("generation service unavailable"));
}

#[tokio::test]
async fn cache_stats_and_clear() {
    let server = start_answering(&[("a", "X")], FakeGenerator::replying("ok")).await;
    server
        .post("/api/ask", json!({ "question": "q1" }))
        .await;
    server
        .post("/api/ask", json!({ "question": "q1" }))
        .await;

    let (status, body) = server.get("/api/cache/stats").await;
    assert_eq!(status, 200);
    assert_eq!(body["stats"]["hits"], 1);
    assert_eq!(body["stats"]["misses"], 1);
    assert_eq!(body["stats"]["size"], 1);

    let (status, body) = server.post("/api/cache/clear", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Cache cleared successfully");

    let (_, body) = server.get("/api/cache/stats").await;
    assert_eq!(body["stats"]["size"], 0);
    assert_eq!(body["stats"]["hits"], 1);
}

#[tokio::test]
async fn ask_web_uses_web_source_label() {
    let server = start_answering(
        &[],
        FakeGenerator::replying("").with_web_reply("{\"content\": \"From the web\"}"),
    )
    .await;

    let (status, body) = server
        .post("/api/ask-web", json!({ "question": "What is PIT?" }))
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["answer"], "From the web");
    assert_eq!(body["source"], "podatki.gov.pl");
}

#[tokio::test]
async fn ingest_is_accepted_and_runs_in_background() {
    let store = Arc::new(InMemoryVectorStore::new());
    let browser = FakeBrowser::site(
        &["https://site.example/one"],
        &[("https://site.example/one", page("one"))],
    );
    let server = start(store.clone(), FakeGenerator::replying("desc"), browser).await;

    let (status, body) = server.post("/api/ingest", json!({})).await;
    assert_eq!(status, 202);
    assert_eq!(body["message"], "Ingestion started");

    for _ in 0..50 {
        if store.len() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn ingest_while_running_is_409() {
    let mut browser = FakeBrowser::site(
        &["https://site.example/one"],
        &[("https://site.example/one", page("one"))],
    );
    browser.load_delay = Duration::from_millis(300);
    let server = start(
        Arc::new(InMemoryVectorStore::new()),
        FakeGenerator::replying("desc"),
        browser,
    )
    .await;

    let (status, _) = server.post("/api/ingest", json!({})).await;
    assert_eq!(status, 202);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (status, body) = server.post("/api/ingest", json!({})).await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "busy");
}
