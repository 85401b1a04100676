//! Chat model access.
//!
//! Provides the [`ChatModel`] trait, an OpenAI-compatible implementation, and
//! [`create_client`], which probes the configured provider before handing out a client.

pub mod openai;
pub mod prompts;
mod types;

pub use openai::OpenAiCompatible;
pub use types::{FinishReason, ModelEvent, ModelMessage, ModelRequest, ToolCall, ToolDefinition};

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use reqwest::Url;

use crate::config::{provider_key_env, ProviderConnection};

/// Upper bound for the reachability check against a local provider.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Models that accept a reasoning effort hint.
pub const REASONING_MODELS: &[&str] = &["gpt-5.1-2025-11-13"];

pub fn is_reasoning_model(model: &str) -> bool {
    REASONING_MODELS.contains(&model)
}

pub type ModelStream = BoxStream<'static, Result<ModelEvent, AiError>>;

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("model request failed: {0}")]
    RequestFailed(String),
    #[error("model returned HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("model response parse error: {0}")]
    Parse(String),
    #[error("model request timed out")]
    Timeout,
    #[error("model server unreachable: {0}")]
    Unreachable(String),
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Unreachable(e.to_string())
        } else {
            Self::RequestFailed(e.to_string())
        }
    }
}

/// Raised when no usable client can be built for the configured provider.
#[derive(Debug, thiserror::Error)]
#[error(
    "No providers available: {provider}: {reason}\n\n\
     Check the `providers` section of holo.json and set {key_env} in .env."
)]
pub struct ProviderError {
    pub provider: String,
    pub reason: String,
    pub key_env: String,
}

/// Provider-agnostic chat model interface.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier for logging.
    fn model_id(&self) -> &str;

    /// Start a streamed completion.
    async fn stream(&self, request: &ModelRequest) -> Result<ModelStream, AiError>;

    /// Run a non-streamed completion and return the assistant text.
    async fn complete(&self, messages: &[ModelMessage]) -> Result<String, AiError>;
}

/// Probe the provider, then build a client for it.
///
/// Local base URLs must answer an HTTP request within [`PROBE_TIMEOUT`] (any status counts);
/// hosted ones need an API key.
pub async fn create_client(
    http: reqwest::Client,
    provider: &ProviderConnection,
) -> Result<OpenAiCompatible, ProviderError> {
    if let Err(reason) = test_provider_connection(&http, provider).await {
        tracing::warn!(provider = %provider.name, base_url = %provider.base_url, %reason, "provider unavailable");
        return Err(ProviderError {
            provider: provider.name.clone(),
            reason,
            key_env: provider_key_env(&provider.name),
        });
    }
    Ok(OpenAiCompatible::new(http, provider))
}

async fn test_provider_connection(
    http: &reqwest::Client,
    provider: &ProviderConnection,
) -> Result<(), String> {
    if is_local_url(&provider.base_url) {
        // 404 on the root is common; only a transport failure means the server is down.
        if let Err(e) = http
            .get(&provider.base_url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            tracing::debug!(error = %e, "connectivity probe failed");
            return Err(format!("Server not accessible at {}", provider.base_url));
        }
        return Ok(());
    }

    if provider.api_key.as_deref().unwrap_or("").is_empty() {
        return Err("API key required for hosted providers".into());
    }
    Ok(())
}

/// Whether a base URL points at this machine.
pub fn is_local_url(base_url: &str) -> bool {
    match Url::parse(base_url) {
        Ok(url) => matches!(
            url.host_str(),
            Some("localhost" | "127.0.0.1" | "[::1]" | "::1" | "0.0.0.0")
        ),
        Err(_) => base_url.contains("localhost"),
    }
}
