// Error types for the unm gateway

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Whether error bodies may carry internal detail (disabled in production).
static EXPOSE_DETAILS: AtomicBool = AtomicBool::new(true);

/// Toggle inclusion of internal error detail in client-visible bodies.
pub fn set_expose_details(expose: bool) {
    EXPOSE_DETAILS.store(expose, Ordering::Relaxed);
}

fn expose_details() -> bool {
    EXPOSE_DETAILS.load(Ordering::Relaxed)
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Too many requests, retry after {retry_after} seconds")]
    RateLimitExceeded {
        limit: u64,
        retry_after: u64,
    },

    #[error("Config parsing error: {0}")]
    ConfigParsing(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable message shown to clients. Internal variants are collapsed.
    fn public_message(&self) -> String {
        match self {
            AppError::InvalidRequest(_)
            | AppError::NotFound(_)
            | AppError::RateLimitExceeded { .. } => self.to_string(),
            _ => "Internal server error".to_string(),
        }
    }

    fn data(&self) -> Value {
        let mut data = match self {
            AppError::RateLimitExceeded { limit, retry_after } => json!({
                "limit": limit,
                "retryAfter": retry_after,
            }),
            _ => Value::Null,
        };

        if expose_details() && self.status().is_server_error() {
            let detail = json!(self.to_string());
            match data {
                Value::Object(ref mut map) => {
                    map.insert("detail".to_string(), detail);
                }
                _ => data = json!({ "detail": detail }),
            }
        }

        data
    }
}

// Convert AppError to HTTP responses for Axum
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = json!({
            "code": status.as_u16(),
            "message": self.public_message(),
            "data": self.data(),
        });

        let mut response = (status, axum::Json(body)).into_response();

        if let AppError::RateLimitExceeded { retry_after, .. } = self {
            response
                .headers_mut()
                .insert("retry-after", HeaderValue::from(retry_after));
        }

        response
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
