use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Machine-readable codes carried in error bodies
/// (`{"code": "VALIDATION_FAILED", "message": "..."}`).
pub mod error_code {
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const UPSTREAM_UNAVAILABLE: &str = "UPSTREAM_UNAVAILABLE";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Error type shared by the library crates and the server.
///
/// The two decision routines never return one (their failures degrade to
/// default results). It covers configuration, start-up wiring and request
/// validation.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration file missing or malformed.
    #[error("config: {0}")]
    Config(String),

    /// Input data is invalid. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// A collaborator (directory, sink) could not be reached. HTTP 502.
    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Storage(String),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Config(_) => error_code::CONFIG_INVALID,
            ServiceError::Validation(_) => error_code::VALIDATION_FAILED,
            ServiceError::Unavailable(_) => error_code::UPSTREAM_UNAVAILABLE,
            ServiceError::Storage(_) => error_code::STORAGE_ERROR,
            ServiceError::Internal(_) => error_code::INTERNAL,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unavailable(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Config(_) | ServiceError::Storage(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}
