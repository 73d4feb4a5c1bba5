use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection not configured")]
    NotConfigured,
    #[error("unsupported database URL scheme '{0}'")]
    UnsupportedUrl(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder '{{{0}}}' in prompt template")]
    UnknownPlaceholder(String),
    #[error("prompt template is missing the '{{{0}}}' placeholder")]
    MissingPlaceholder(&'static str),
    #[error("unbalanced brace at byte {0} of prompt template")]
    Unbalanced(usize),
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("{message} (status {status})")]
    Api { status: u16, message: String },
    #[error("could not decode provider response: {0}")]
    Decode(String),
}

/// Errors that leave the request handler. Always rendered as `{"error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<TemplateError> for ApiError {
    fn from(_: TemplateError) -> Self {
        ApiError::Internal("Internal server error: prompt template formatting failed.".to_string())
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        ApiError::Internal(format!("Failed to get response from LLM: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
