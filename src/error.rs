//! Unified client error model and mapping helpers.
//! Every failure that crosses the crate boundary is normalized to the same
//! shape the remote API uses: `{message, status_code, timestamp, path}`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiError {
    /// Malformed input rejected by the server (4xx validation shape). Never retried.
    Validation { message: String, status_code: u16, timestamp: String, path: String },
    /// Invalid/expired credentials or token (401/403). Drives the refresh-then-retry path.
    Auth { message: String, status_code: u16, timestamp: String, path: String },
    /// Network, timeout or server-side failure. Surfaced as-is, no automatic retry.
    Transport { message: String, status_code: u16, timestamp: String, path: String },
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl ApiError {
    pub fn validation<S: Into<String>>(message: S, status_code: u16, path: S) -> Self {
        ApiError::Validation { message: message.into(), status_code, timestamp: now_rfc3339(), path: path.into() }
    }
    pub fn auth<S: Into<String>>(message: S, status_code: u16, path: S) -> Self {
        ApiError::Auth { message: message.into(), status_code, timestamp: now_rfc3339(), path: path.into() }
    }
    pub fn transport<S: Into<String>>(message: S, status_code: u16, path: S) -> Self {
        ApiError::Transport { message: message.into(), status_code, timestamp: now_rfc3339(), path: path.into() }
    }

    /// Normalize a non-success HTTP status into the matching taxonomy bucket.
    pub fn from_status(status: u16, message: String, path: &str) -> Self {
        match status {
            400 | 422 => ApiError::validation(message, status, path.to_string()),
            401 | 403 => ApiError::auth(message, status, path.to_string()),
            _ => ApiError::transport(message, status, path.to_string()),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation { message, .. }
            | ApiError::Auth { message, .. }
            | ApiError::Transport { message, .. } => message.as_str(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Validation { status_code, .. }
            | ApiError::Auth { status_code, .. }
            | ApiError::Transport { status_code, .. } => *status_code,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            ApiError::Validation { path, .. }
            | ApiError::Auth { path, .. }
            | ApiError::Transport { path, .. } => path.as_str(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth { .. })
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.path(), self.status_code(), self.message())
    }
}

impl std::error::Error for ApiError {}

pub type ApiResult<T> = Result<T, ApiError>;

/// Map low-level reqwest failures (connect refused, timeout, bad TLS) to the
/// transport bucket. The remote never answered, so the status defaults to 500
/// the same way the original client shape did.
pub fn transport_from(err: &reqwest::Error, path: &str) -> ApiError {
    ApiError::transport(err.to_string(), 500, path.to_string())
}

/// Normalize a non-2xx response. Prefers the API's own `message` field when the
/// body is the standard JSON error shape, falling back to the status reason.
pub async fn normalize_response(resp: reqwest::Response, path: &str) -> ApiError {
    let status = resp.status();
    let fallback = status.canonical_reason().unwrap_or("request failed").to_string();
    let message = resp
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(fallback);
    ApiError::from_status(status.as_u16(), message, path)
}
