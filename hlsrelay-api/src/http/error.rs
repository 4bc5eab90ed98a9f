// HTTP error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hlsrelay_proxy::ProxyError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Application error with HTTP status code
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

/// Convert relay errors to HTTP errors
impl From<ProxyError> for AppError {
    fn from(err: ProxyError) -> Self {
        match &err {
            ProxyError::InvalidTarget { url, .. } => {
                tracing::warn!(url = %url, error = %err, "Malformed target URL");
                AppError::bad_gateway("Malformed target URL")
            }
            ProxyError::Upstream { url, .. }
            | ProxyError::InvalidRedirect { url, .. }
            | ProxyError::UpstreamBody { url, .. } => {
                tracing::error!(url = %url, error = %err, "Proxy error");
                AppError::bad_gateway("Upstream request failed")
            }
            ProxyError::GateClosed => {
                tracing::error!("Concurrency gate closed");
                AppError::service_unavailable("Service temporarily unavailable")
            }
            ProxyError::Client(_) | ProxyError::Response(_) => {
                tracing::error!(error = %err, "Internal relay error");
                AppError::internal_server_error("Internal server error")
            }
        }
    }
}
