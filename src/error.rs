//! Error types for signin-gate
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Unauthenticated access and malformed login state are deliberately
/// absent: the first is answered with a redirect, the second falls back
/// to the application root.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed request (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Identity provider rejected the sign-in (401)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Identity provider answered with something unusable (502)
    #[error("Identity provider error: {0}")]
    IdentityProvider(String),

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Session store error (500)
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// HTTP status and metric label for this error
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            AppError::AuthenticationFailed(_) => {
                (StatusCode::UNAUTHORIZED, "authentication_failed")
            }
            AppError::IdentityProvider(_) => (StatusCode::BAD_GATEWAY, "identity_provider"),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, "http_client"),
            AppError::Session(_) => (StatusCode::INTERNAL_SERVER_ERROR, "session"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_type) = self.classify();

        // Server-side details stay in the log, not in the response body.
        let error_message = match &self {
            AppError::Validation(msg) | AppError::AuthenticationFailed(msg) => msg.clone(),
            AppError::IdentityProvider(_) | AppError::HttpClient(_) => {
                "Identity provider unavailable".to_string()
            }
            AppError::Session(_) | AppError::Config(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self, error_type, "Request failed");
        } else {
            tracing::warn!(error = %self, error_type, "Request rejected");
        }

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[error_type])
            .inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
