//! Error types for the Bookworm client

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use validator::ValidationErrors;

/// Coarse error classification reported to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Network,
    NotFound,
    Authentication,
    Authorization,
    Rejected,
    Server,
    Disposed,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Network => "network",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Authorization => "authorization",
            ErrorKind::Rejected => "rejected",
            ErrorKind::Server => "server",
            ErrorKind::Disposed => "disposed",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{}", label)
    }
}

/// Main client error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Local form validation failed; nothing was sent to the backend
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// Backend refused the request for a business reason (message verbatim)
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The owning view was closed before the response arrived
    #[error("Response discarded: {0}")]
    Disposed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Network(_) => ErrorKind::Network,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Authentication(_) => ErrorKind::Authentication,
            AppError::Authorization(_) => ErrorKind::Authorization,
            AppError::Rejected(_) => ErrorKind::Rejected,
            AppError::Server { .. } => ErrorKind::Server,
            AppError::Disposed(_) => ErrorKind::Disposed,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Human readable message, without the kind prefix used by `Display`
    pub fn message(&self) -> String {
        match self {
            AppError::Validation(errors) => errors.to_string(),
            AppError::Conflict(msg)
            | AppError::Network(msg)
            | AppError::NotFound(msg)
            | AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::Rejected(msg)
            | AppError::Disposed(msg)
            | AppError::Internal(msg) => msg.clone(),
            AppError::Server { message, .. } => message.clone(),
        }
    }

    /// Field names carrying a local validation error, if any
    pub fn invalid_fields(&self) -> Vec<String> {
        match self {
            AppError::Validation(errors) => {
                let mut fields: Vec<String> = errors.field_errors().into_keys().map(|k| k.to_string()).collect();
                fields.sort_unstable();
                fields
            }
            _ => Vec::new(),
        }
    }

    /// Map a non-success HTTP response onto an error kind.
    ///
    /// `body` is the raw response text; the backend message is extracted from
    /// `{"error": ...}`, `{"detail": ...}` or a field-error map when present.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = ErrorBody::message_from(body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());

        match status {
            StatusCode::UNAUTHORIZED => AppError::Authentication(message),
            StatusCode::FORBIDDEN => AppError::Authorization(message),
            StatusCode::NOT_FOUND => AppError::NotFound(message),
            StatusCode::CONFLICT => AppError::Conflict(message),
            s if s.is_client_error() => AppError::Rejected(message),
            s => AppError::Server {
                status: s.as_u16(),
                message,
            },
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            tracing::error!("Failed to decode backend response: {:?}", e);
            AppError::Internal(format!("Unexpected response from backend: {}", e))
        } else {
            AppError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Internal(format!("Invalid JSON: {}", e))
    }
}

/// Error body shapes returned by the backend
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Error { error: String },
    Detail { detail: String },
    Fields(std::collections::BTreeMap<String, serde_json::Value>),
}

impl ErrorBody {
    fn message_from(body: &str) -> Option<String> {
        match serde_json::from_str::<ErrorBody>(body).ok()? {
            ErrorBody::Error { error } => Some(error),
            ErrorBody::Detail { detail } => Some(detail),
            ErrorBody::Fields(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(field, value)| match value {
                        serde_json::Value::Array(items) => {
                            let msgs: Vec<String> = items
                                .iter()
                                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                                .collect();
                            format!("{}: {}", field, msgs.join(" "))
                        }
                        serde_json::Value::String(s) => format!("{}: {}", field, s),
                        other => format!("{}: {}", field, other),
                    })
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("; "))
                }
            }
        }
    }
}

/// Result type alias for client operations
pub type AppResult<T> = Result<T, AppError>;
