use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced to HTTP callers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Failures of the generation-service path. Always recovered by the formula fallback.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("model delegation disabled")]
    Disabled,

    #[error("generation request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("generation request timed out after {0} ms")]
    Timeout(u64),

    #[error("generation service returned HTTP {0}")]
    Status(u16),

    #[error("could not decode generation response: {0}")]
    Decode(String),

    #[error("could not parse float from LLM response: {raw}")]
    Parse { raw: String },
}

impl UpstreamError {
    /// Short label for logs and metric series.
    pub fn reason(&self) -> &'static str {
        match self {
            UpstreamError::Disabled => "disabled",
            UpstreamError::Transport(_) => "transport",
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::Status(_) => "status",
            UpstreamError::Decode(_) => "decode",
            UpstreamError::Parse { .. } => "parse",
        }
    }
}
