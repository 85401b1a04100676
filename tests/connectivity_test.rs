mod helpers;

use axum::Router;

use helpers::*;
use holo::ai::{create_client, is_local_url, ChatModel};
use holo::config::ProviderConnection;

fn provider(base_url: &str, api_key: Option<&str>) -> ProviderConnection {
    ProviderConnection {
        name: "ollama".into(),
        model: "llama3".into(),
        base_url: base_url.into(),
        api_key: api_key.map(str::to_string),
    }
}

#[tokio::test]
async fn refused_local_provider_is_unavailable() {
    let base = format!("{}/v1", dead_url().await);
    let err = create_client(reqwest::Client::new(), &provider(&base, None))
        .await
        .err()
        .expect("probe should fail");

    assert_eq!(err.provider, "ollama");
    assert_eq!(err.key_env, "OLLAMA_API_KEY");
    assert!(err.reason.contains("Server not accessible"));
    assert!(err.to_string().starts_with("No providers available"));
}

#[tokio::test]
async fn any_http_answer_counts_as_reachable() {
    // An empty router answers 404 to everything.
    let base = format!("{}/v1", spawn_stub(Router::new()).await);
    let client = create_client(reqwest::Client::new(), &provider(&base, None))
        .await
        .unwrap();
    assert_eq!(client.model_id(), "llama3");
}

#[tokio::test]
async fn hosted_provider_needs_a_key() {
    let err = create_client(
        reqwest::Client::new(),
        &provider("https://api.openai.com/v1", None),
    )
    .await
    .err()
    .expect("key is required");
    assert!(err.reason.contains("API key required"));

    assert!(create_client(
        reqwest::Client::new(),
        &provider("https://api.openai.com/v1", Some("sk-test")),
    )
    .await
    .is_ok());
}

#[test]
fn local_url_detection() {
    assert!(is_local_url("http://localhost:11434/v1"));
    assert!(is_local_url("http://127.0.0.1:8080"));
    assert!(is_local_url("http://[::1]:8080"));
    assert!(!is_local_url("https://api.openai.com/v1"));
}
