//! HTTP server: shared state, routes, and the listener loop.
//!
//! Routes:
//! - `POST /api/chat`: one chat turn, answered as a UI message stream over SSE.
//! - `GET /api/config?fileName=`: page source or JSON file.
//! - `GET /api/metadata?fileName=`: page metadata, or all navigation pages without `fileName`.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::HeaderValue;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;

use crate::chat::stream::{DONE_MARKER, UI_STREAM_HEADER, UI_STREAM_VERSION};
use crate::chat::{ChatPipeline, ChatRequest};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::pages::Pages;
use crate::persona::PersonaCache;
use crate::store::ChatStore;

/// State shared by every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<ServerConfig>,
    pub chat: ChatPipeline,
    pub pages: Pages,
}

impl AppState {
    pub fn new(settings: ServerConfig) -> Self {
        Self::with_parts(
            settings,
            reqwest::Client::new(),
            Arc::new(PersonaCache::default()),
            Arc::new(ChatStore::new()),
        )
    }

    /// Build state around existing caches, e.g. to inspect them from tests.
    pub fn with_parts(
        settings: ServerConfig,
        http: reqwest::Client,
        persona: Arc<PersonaCache>,
        chats: Arc<ChatStore>,
    ) -> Self {
        let chat = ChatPipeline::new(settings.config_dir.clone(), http.clone(), persona, chats);
        let pages = Pages::new(settings.config_dir.clone(), http);
        Self {
            settings: Arc::new(settings),
            chat,
            pages,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/config", get(page_config))
        .route("/api/metadata", get(page_metadata))
        .with_state(state)
}

async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(request) = body.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let turn = state.chat.start(request).await?;

    // The turn keeps running if this response is dropped; only delivery stops.
    let events = turn
        .chunks
        .map(|chunk| Event::default().json_data(chunk))
        .chain(stream::once(async {
            Ok::<_, axum::Error>(Event::default().data(DONE_MARKER))
        }));

    let mut response = Sse::new(events).into_response();
    response
        .headers_mut()
        .insert(UI_STREAM_HEADER, HeaderValue::from_static(UI_STREAM_VERSION));
    Ok(response)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageQuery {
    file_name: Option<String>,
}

async fn page_config(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, ServerError> {
    state
        .pages
        .config(query.file_name.as_deref())
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!(file = ?query.file_name, error = %e, "config request failed");
            ServerError::NotFound("File not found or invalid request")
        })
}

async fn page_metadata(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, ServerError> {
    state
        .pages
        .metadata(query.file_name.as_deref())
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!(file = ?query.file_name, error = %e, "metadata request failed");
            ServerError::NotFound("Failed to fetch metadata")
        })
}

/// Bind and serve until ctrl-c.
pub async fn serve(settings: ServerConfig) -> Result<()> {
    let bind_addr = settings.bind_addr();
    let holo_json = settings.holo_json_path();
    if !holo_json.exists() {
        tracing::warn!(path = %holo_json.display(), "holo.json not found; chat and pages will fail until it exists");
    }

    let app = router(AppState::new(settings));
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "Holo listening at http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
