//! Unified error handling for the backend API.
//!
//! Services and handlers return [`ApiError`]; it implements `IntoResponse` so
//! handlers can use `?` and still produce the right status and a short,
//! user-facing message. Internal error text is logged, never returned.

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Field name to messages, for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, Vec<String>>>,
}

/// Which rate-limit gate rejected the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitKind {
    /// Short-term per-IP throttle
    Ip,
    /// Global monthly usage ceiling
    Monthly,
}

impl RateLimitKind {
    pub fn message(&self) -> &'static str {
        match self {
            RateLimitKind::Ip => {
                "リクエストが多すぎます。しばらく待ってから再度お試しください。"
            }
            RateLimitKind::Monthly => {
                "今月のAPI利用上限に達しました。管理者にお問い合わせください。"
            }
        }
    }
}

/// Unified error type for API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request body or field rule violation
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, Vec<String>>,
    },

    /// Invalid request data
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Body or query string could not be parsed
    #[error("Invalid JSON: {0}")]
    JsonParse(String),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// The requested slot is no longer free
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited ({0:?})")]
    RateLimited(RateLimitKind),

    /// Maintenance mode, carrying the configured message
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Database connection pool error
    #[error("Database connection error")]
    ConnectionPool(#[source] diesel_async::pooled_connection::deadpool::PoolError),

    /// Database query error
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Generic store/calendar/anyhow error
    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Create a not found error with a custom message
    pub fn not_found(resource: impl Into<String>) -> Self {
        ApiError::NotFound(resource.into())
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    /// Validation error on a single field
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), vec![message.clone()]);
        ApiError::Validation { message, fields }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let fields: BTreeMap<String, Vec<String>> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                (camel_case(field), messages)
            })
            .collect();

        ApiError::Validation {
            message: "入力内容に誤りがあります".to_string(),
            fields,
        }
    }
}

/// Request bodies are camelCase on the wire; report fields the same way.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for ApiError {
    fn from(err: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        ApiError::ConnectionPool(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, details, fields) = match self {
            ApiError::Validation { message, fields } => {
                tracing::debug!(?fields, "Validation error: {}", message);
                (StatusCode::BAD_REQUEST, message, None, Some(fields))
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None, None),
            ApiError::JsonParse(details) => {
                tracing::warn!("JSON parse error: {}", details);
                (
                    StatusCode::BAD_REQUEST,
                    "リクエストの形式が正しくありません".to_string(),
                    Some(details),
                    None,
                )
            }
            ApiError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                format!("{}が見つかりません", resource),
                None,
                None,
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg, None, None),
            ApiError::RateLimited(kind) => {
                tracing::warn!(?kind, "Rate limit exceeded");
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    kind.message().to_string(),
                    None,
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, msg, None, None)
            }
            ApiError::ConnectionPool(e) => {
                tracing::error!("Connection pool error: {:?}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "データベースに接続できません".to_string(),
                    None,
                    None,
                )
            }
            ApiError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                match e {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        "リソースが見つかりません".to_string(),
                        None,
                        None,
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "データベース処理に失敗しました".to_string(),
                        None,
                        None,
                    ),
                }
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "サーバーエラーが発生しました".to_string(),
                    None,
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
            fields,
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
