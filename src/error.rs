//! HTTP error type for the site API.
//!
//! Handlers return `Result<T, ServerError>`; the error renders as a JSON `{ "error": ... }`
//! body. Failures are logged before the response is built.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::chat::ChatError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Sent to the client as-is; the cause has already been logged.
    #[error("not found: {0}")]
    NotFound(&'static str),

    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, (*m).to_owned()),
            ServerError::Chat(e @ (ChatError::BadRequest(_) | ChatError::Validation(_))) => {
                warn!(error = %e, "rejected chat request");
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ServerError::Chat(e @ ChatError::Persona(_)) => {
                error!(error = %e, "persona unavailable");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            // Configuration and provider errors tell the site owner what to fix.
            ServerError::Chat(e) => {
                error!(error = %e, "chat turn could not start");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ValidationError;
    use crate::config::ConfigError;

    #[test]
    fn status_codes() {
        let cases = [
            (ServerError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ServerError::NotFound("gone"), StatusCode::NOT_FOUND),
            (
                ChatError::Validation(ValidationError("bad".into())).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                ChatError::Config(ConfigError::Missing("core.url")).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ChatError::Persona(crate::persona::PersonaFetchError::Missing).into(),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
