mod helpers;

use axum::extract::Path;
use axum::http::{Method, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use helpers::*;
use holo::config::ServerConfig;
use holo::server::{router, AppState};

async fn core_logs() -> String {
    let app = Router::new().route(
        "/api/v1/logs/{id}",
        get(|Path(id): Path<String>| async move {
            match id.as_str() {
                "doc-1" => Ok(Json(json!({
                    "log": {
                        "title": "On Parsing",
                        "data": { "episodeBody": "# On Parsing\n\nGrammars all the way down." }
                    }
                }))),
                _ => Err(StatusCode::NOT_FOUND),
            }
        }),
    );
    spawn_stub(app).await
}

struct Site {
    dir: TempDir,
    app: Router,
}

async fn site() -> Site {
    init_env();
    let dir = TempDir::new().unwrap();
    write_holo_json(dir.path(), &holo_json(&core_logs().await, "http://localhost:1/v1"));
    std::fs::write(
        dir.path().join("introduction.mdx"),
        "---\ntitle: Hello\ndescription: Who I am\norder: 1\n---\n\n# Hi there\n",
    )
    .unwrap();
    let app = router(AppState::new(ServerConfig {
        config_dir: dir.path().to_path_buf(),
        ..Default::default()
    }));
    Site { dir, app }
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(json_request(Method::GET, uri, None))
        .await
        .unwrap();
    let status = resp.status();
    (status, body_json(resp).await)
}

#[tokio::test]
async fn config_splits_frontmatter_from_source() {
    let s = site().await;
    let (status, body) = get_json(&s.app, "/api/config?fileName=introduction.mdx").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["frontmatter"]["title"], "Hello");
    assert_eq!(body["frontmatter"]["order"], 1);
    assert_eq!(body["source"], "# Hi there\n");
}

#[tokio::test]
async fn config_returns_json_files_parsed() {
    let s = site().await;
    let (status, body) = get_json(&s.app, "/api/config?fileName=holo.json").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Test Holo");
}

#[tokio::test]
async fn config_proxies_core_documents() {
    let s = site().await;
    let (status, body) = get_json(&s.app, "/api/config?fileName=CORE%20doc-1.mdx").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "# On Parsing\n\nGrammars all the way down.");
    assert_eq!(body["frontmatter"], json!({}));
}

#[tokio::test]
async fn bad_config_requests_are_not_found() {
    let s = site().await;
    for uri in [
        "/api/config",
        "/api/config?fileName=missing.mdx",
        "/api/config?fileName=..%2F..%2Fetc%2Fpasswd",
        "/api/config?fileName=CORE%20unknown",
        "/api/config?fileName=CORE%20..%2Fme",
    ] {
        let (status, body) = get_json(&s.app, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["error"], "File not found or invalid request");
    }
}

#[tokio::test]
async fn metadata_for_one_file() {
    let s = site().await;
    let (status, body) = get_json(&s.app, "/api/metadata?fileName=introduction.mdx").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "title": "Hello", "description": "Who I am", "order": 1 }));

    // Unreadable files still get a title derived from the name.
    let (status, body) = get_json(&s.app, "/api/metadata?fileName=my-post.mdx").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "title": "my-post", "description": "" }));
}

#[tokio::test]
async fn metadata_for_all_navigation_pages() {
    let s = site().await;
    let (status, body) = get_json(&s.app, "/api/metadata").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["introduction"]["title"], "Hello");
    assert_eq!(body["CORE doc-1"], json!({ "title": "On Parsing", "description": "" }));
}

#[tokio::test]
async fn empty_file_name_means_all_pages() {
    let s = site().await;
    let (status, body) = get_json(&s.app, "/api/metadata?fileName=").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["introduction"]["title"], "Hello");
    assert!(body.get("title").is_none());
}

#[tokio::test]
async fn metadata_without_holo_json_is_not_found() {
    let s = site().await;
    std::fs::remove_file(s.dir.path().join("holo.json")).unwrap();

    let (status, body) = get_json(&s.app, "/api/metadata").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Failed to fetch metadata");
}
