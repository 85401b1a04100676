//! HTTP client for the CORE knowledge-graph API.
//!
//! Every endpoint the site and the CLI consume lives here: the persona (`/api/v1/me`),
//! search, single log lookup, labels, and the cursor-paginated document listing.
//! All requests use Bearer auth when an API key is configured.

use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::CoreConnection;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// CORE answered with a non-success status.
    #[error("CORE returned {status}: {reason}")]
    Status { status: StatusCode, reason: String },

    #[error("CORE request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected CORE response: {0}")]
    Decode(String),

    #[error("invalid CORE URL: {0}")]
    InvalidUrl(String),
}

impl CoreError {
    fn from_status(status: StatusCode) -> Self {
        Self::Status {
            status,
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }

    /// Status text of a non-success response, if that is what this error is.
    pub fn status_text(&self) -> Option<&str> {
        match self {
            Self::Status { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Me {
    pub persona: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentPage {
    #[serde(default)]
    logs: Vec<Document>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogEnvelope {
    log: LogEntry,
}

/// A single CORE log (ingested document or episode).
#[derive(Debug, Clone, Deserialize)]
pub struct LogEntry {
    pub title: Option<String>,
    #[serde(default)]
    pub data: LogData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogData {
    pub episode_body: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CoreClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoreClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_connection(http: reqwest::Client, conn: &CoreConnection) -> Self {
        Self::new(http, conn.url.clone(), conn.api_key.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.http.get(format!("{}{path}", self.base_url)))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        req: reqwest::RequestBuilder,
    ) -> Result<T, CoreError> {
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::from_status(status));
        }
        response
            .json()
            .await
            .map_err(|e| CoreError::Decode(e.to_string()))
    }

    /// `GET /api/v1/me`.
    pub async fn me(&self) -> Result<Me, CoreError> {
        Self::send_json(self.get("/api/v1/me")).await
    }

    /// `POST /api/v1/search`. The body is forwarded as-is; the result is returned
    /// unparsed. A JSON string body is unwrapped, anything else is passed through verbatim.
    pub async fn search<B: Serialize + ?Sized>(&self, body: &B) -> Result<String, CoreError> {
        let response = self
            .authorize(self.http.post(format!("{}/api/v1/search", self.base_url)))
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::from_status(status));
        }
        let text = response.text().await?;
        Ok(match serde_json::from_str::<Value>(&text) {
            Ok(Value::String(s)) => s,
            _ => text,
        })
    }

    /// `GET /api/v1/logs/:id`. The id is sent as one escaped path segment.
    pub async fn log(&self, id: &str) -> Result<LogEntry, CoreError> {
        let mut url = Url::parse(&format!("{}/api/v1/logs", self.base_url))
            .map_err(|e| CoreError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| CoreError::InvalidUrl(self.base_url.clone()))?
            .push(id);
        let envelope: LogEnvelope = Self::send_json(self.authorize(self.http.get(url))).await?;
        Ok(envelope.log)
    }

    /// `GET /api/v1/labels`.
    pub async fn labels(&self) -> Result<Vec<Label>, CoreError> {
        Self::send_json(self.get("/api/v1/labels")).await
    }

    /// All documents carrying `label_id`, following `nextCursor` until `hasMore` is false.
    pub async fn documents_for_label(&self, label_id: &str) -> Result<Vec<Document>, CoreError> {
        let mut documents = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![("label", label_id.to_string()), ("type", "DOCUMENT".to_string())];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let page: DocumentPage = Self::send_json(self.get("/api/v1/logs").query(&query)).await?;
            tracing::debug!(label = %label_id, count = page.logs.len(), has_more = page.has_more, "fetched document page");
            documents.extend(page.logs);

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                (true, _) => {
                    return Err(CoreError::Decode(
                        "hasMore set without a new nextCursor".into(),
                    ))
                }
                (false, _) => break,
            }
        }

        Ok(documents)
    }
}
