#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use serde_json::{json, Value};

pub const TEST_CORE_KEY: &str = "test-core-key";

/// Every test in a binary sees the same CORE key, so setting it once avoids env races.
pub fn init_env() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        std::env::set_var("CORE_API_KEY", TEST_CORE_KEY);
        std::env::remove_var("HOLO_CONFIG_PATH");
    });
}

/// Shared request counter for stub handlers.
#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// A base URL on which nothing is listening.
pub async fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub fn holo_json(core_url: &str, provider_url: &str) -> Value {
    json!({
        "name": "Test Holo",
        "core": { "url": core_url, "labels": ["label-1"] },
        "providers": { "name": "testai", "model": "test-model", "baseUrl": provider_url },
        "navigation": [
            { "group": "Getting Started", "pages": ["introduction"] },
            { "group": "Essays", "pages": ["CORE doc-1"] }
        ]
    })
}

pub fn write_holo_json(dir: &Path, config: &Value) {
    std::fs::write(
        dir.join("holo.json"),
        serde_json::to_string_pretty(config).unwrap(),
    )
    .unwrap();
}

pub fn json_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    match body {
        Some(val) => builder.body(Body::from(val.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_text(resp: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&bytes).to_string()
}

pub async fn body_json(resp: axum::response::Response) -> Value {
    let text = body_text(resp).await;
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

/// The `data:` payloads of an SSE body, in order.
pub fn sse_payloads(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim_start().to_string())
        .collect()
}

/// One OpenAI-style streaming chunk as an SSE event.
pub fn openai_event(delta: Value, finish_reason: Option<&str>) -> String {
    let chunk = json!({
        "id": "chatcmpl-test",
        "object": "chat.completion.chunk",
        "choices": [{ "index": 0, "delta": delta, "finish_reason": finish_reason }]
    });
    format!("data: {chunk}\n\n")
}
