mod helpers;

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use helpers::*;
use holo::config::ServerConfig;
use holo::persona::PersonaCache;
use holo::server::{router, AppState};
use holo::store::ChatStore;

const SEARCH_RESULT: &str = "I work on compilers";
const ANSWER: &str = "Mostly compilers, these days.";

#[derive(Clone, Default)]
struct Recorded {
    hits: Hits,
    bodies: Arc<Mutex<Vec<Value>>>,
}

impl Recorded {
    fn push(&self, body: Value) {
        self.hits.bump();
        self.bodies.lock().unwrap().push(body);
    }

    fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap().clone()
    }
}

#[derive(Clone, Default)]
struct CoreStub {
    me: Hits,
    search: Recorded,
}

async fn stub_core(stub: CoreStub) -> String {
    async fn me(State(stub): State<CoreStub>) -> Json<Value> {
        stub.me.bump();
        Json(json!({ "persona": "A compiler engineer who writes about parsing." }))
    }
    async fn search(State(stub): State<CoreStub>, Json(body): Json<Value>) -> Json<Value> {
        stub.search.push(body);
        Json(json!(SEARCH_RESULT))
    }

    let app = Router::new()
        .route("/api/v1/me", get(me))
        .route("/api/v1/search", post(search))
        .with_state(stub);
    spawn_stub(app).await
}

/// Answers with a search call until the conversation contains a tool result, then with text.
async fn stub_model(calls: Recorded) -> String {
    async fn completions(State(calls): State<Recorded>, Json(body): Json<Value>) -> Response {
        let has_tool_result = body["messages"]
            .as_array()
            .is_some_and(|msgs| msgs.iter().any(|m| m["role"] == "tool"));
        calls.push(body);

        let mut sse = String::new();
        if has_tool_result {
            sse.push_str(&openai_event(json!({ "role": "assistant", "content": "Mostly compilers," }), None));
            sse.push_str(&openai_event(json!({ "content": " these days." }), None));
            sse.push_str(&openai_event(json!({}), Some("stop")));
        } else {
            sse.push_str(&openai_event(
                json!({ "tool_calls": [{
                    "index": 0,
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": "search", "arguments": "{\"query\":\"What do I work on?\"}" }
                }]}),
                None,
            ));
            sse.push_str(&openai_event(json!({}), Some("tool_calls")));
        }
        sse.push_str("data: [DONE]\n\n");

        ([("content-type", "text/event-stream")], sse).into_response()
    }

    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(calls);
    format!("{}/v1", spawn_stub(app).await)
}

struct Harness {
    _dir: TempDir,
    app: Router,
    chats: Arc<ChatStore>,
    core: CoreStub,
    model: Recorded,
}

async fn harness() -> Harness {
    init_env();
    let core = CoreStub::default();
    let model = Recorded::default();
    let core_url = stub_core(core.clone()).await;
    let model_url = stub_model(model.clone()).await;

    let dir = TempDir::new().unwrap();
    write_holo_json(dir.path(), &holo_json(&core_url, &model_url));
    let chats = Arc::new(ChatStore::new());
    let state = AppState::with_parts(
        ServerConfig {
            config_dir: dir.path().to_path_buf(),
            ..Default::default()
        },
        reqwest::Client::new(),
        Arc::new(PersonaCache::default()),
        Arc::clone(&chats),
    );

    Harness {
        _dir: dir,
        app: router(state),
        chats,
        core,
        model,
    }
}

fn user_message(id: &str, text: &str) -> Value {
    json!({ "id": id, "role": "user", "parts": [{ "type": "text", "text": text }] })
}

fn chunk_types(payloads: &[String]) -> Vec<String> {
    payloads
        .iter()
        .filter_map(|p| serde_json::from_str::<Value>(p).ok())
        .filter_map(|v| v["type"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn chat_turn_streams_tool_call_and_answer() {
    let h = harness().await;

    let resp = h
        .app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/chat",
            Some(json!({ "id": "abc", "messages": [user_message("m1", "What do you work on?")] })),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()
            .get("x-vercel-ai-ui-message-stream")
            .and_then(|v| v.to_str().ok()),
        Some("v1")
    );

    let body = body_text(resp).await;
    let payloads = sse_payloads(&body);
    assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));

    let types = chunk_types(&payloads);
    assert_eq!(types.first().map(String::as_str), Some("start"));
    assert_eq!(types.last().map(String::as_str), Some("finish"));
    assert_eq!(types.iter().filter(|t| *t == "start-step").count(), 2);

    let output = payloads
        .iter()
        .filter_map(|p| serde_json::from_str::<Value>(p).ok())
        .find(|v| v["type"] == "tool-output-available")
        .expect("tool output chunk");
    assert_eq!(output["toolCallId"], "call_1");
    assert_eq!(output["output"], SEARCH_RESULT);

    // The configured labels replace whatever the model asked for.
    let searches = h.core.search.bodies();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0]["query"], "What do I work on?");
    assert_eq!(searches[0]["labelIds"], json!(["label-1"]));

    // First call carries the system prompt and the search tool.
    let requests = h.model.bodies();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0]["messages"][0]["role"], "system");
    assert_eq!(requests[0]["tools"][0]["function"]["name"], "search");

    let saved = h.chats.load("abc");
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[0].text_content(), "What do you work on?");
    assert_eq!(saved[1].text_content(), ANSWER);
}

#[tokio::test]
async fn second_turn_sends_prior_history() {
    let h = harness().await;

    for (id, text) in [("m1", "What do you work on?"), ("m2", "Anything else?")] {
        let resp = h
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/chat",
                Some(json!({ "id": "abc", "messages": [user_message(id, text)] })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        body_text(resp).await;
    }

    assert_eq!(h.chats.load("abc").len(), 4);
    assert_eq!(h.core.me.count(), 1, "persona is cached between turns");

    // Third model call opens the second turn and already sees the first exchange.
    let requests = h.model.bodies();
    let second_turn = &requests[2]["messages"];
    let user_texts: Vec<&str> = second_turn
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["role"] == "user")
        .filter_map(|m| m["content"].as_str())
        .collect();
    assert_eq!(user_texts, vec!["What do you work on?", "Anything else?"]);
}

#[tokio::test]
async fn invalid_messages_are_rejected_before_any_call() {
    let h = harness().await;

    let resp = h
        .app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/chat",
            Some(json!({ "id": "abc", "messages": [{ "role": "user", "parts": [] }] })),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("invalid messages"));
    assert_eq!(h.core.me.count(), 0);
    assert_eq!(h.model.hits.count(), 0);
    assert!(h.chats.is_empty());
}

#[tokio::test]
async fn missing_or_empty_chat_id_is_bad_request() {
    let h = harness().await;

    for body in [
        json!({ "messages": [user_message("m1", "hi")] }),
        json!({ "id": "  ", "messages": [user_message("m1", "hi")] }),
    ] {
        let resp = h
            .app
            .clone()
            .oneshot(json_request(Method::POST, "/api/chat", Some(body)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
    assert_eq!(h.core.me.count(), 0);
}

#[tokio::test]
async fn unreachable_local_provider_fails_the_request() {
    init_env();
    let core = CoreStub::default();
    let core_url = stub_core(core.clone()).await;
    let dir = TempDir::new().unwrap();
    write_holo_json(dir.path(), &holo_json(&core_url, &dead_url().await));

    let app = router(AppState::new(ServerConfig {
        config_dir: dir.path().to_path_buf(),
        ..Default::default()
    }));
    let resp = app
        .oneshot(json_request(
            Method::POST,
            "/api/chat",
            Some(json!({ "id": "abc", "messages": [user_message("m1", "hi")] })),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(resp).await;
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("No providers available"), "{error}");
    assert!(error.contains("TESTAI_API_KEY"), "{error}");
}

#[tokio::test]
async fn persona_failure_is_bad_gateway() {
    init_env();
    let core_url = spawn_stub(Router::new().route(
        "/api/v1/me",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    ))
    .await;
    let model_url = stub_model(Recorded::default()).await;
    let dir = TempDir::new().unwrap();
    write_holo_json(dir.path(), &holo_json(&core_url, &model_url));

    let app = router(AppState::new(ServerConfig {
        config_dir: dir.path().to_path_buf(),
        ..Default::default()
    }));
    let resp = app
        .oneshot(json_request(
            Method::POST,
            "/api/chat",
            Some(json!({ "id": "abc", "messages": [user_message("m1", "hi")] })),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "Failed to fetch persona: Internal Server Error");
}

#[tokio::test]
async fn missing_holo_json_is_server_error() {
    init_env();
    let dir = TempDir::new().unwrap();
    let app = router(AppState::new(ServerConfig {
        config_dir: dir.path().to_path_buf(),
        ..Default::default()
    }));

    let resp = app
        .oneshot(json_request(
            Method::POST,
            "/api/chat",
            Some(json!({ "id": "abc", "messages": [user_message("m1", "hi")] })),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("holo.json not found"));
}
