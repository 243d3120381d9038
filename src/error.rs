//! Error types for the catalog cache
//!
//! Provides unified error handling using thiserror. Cache store operations
//! never fail; every error here originates from a loader, the retry/timeout
//! pipeline, or request validation at the HTTP surface.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Fetch Error Enum ==
/// Unified error type for fetches and the HTTP surface.
///
/// `Clone` so that every waiter on a shared in-flight load receives the error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The wrapped data call failed
    #[error("Loader failed: {0}")]
    Loader(String),

    /// The timeout race elapsed before the loader settled
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The upstream catalog API answered with a non-success status
    #[error("Upstream returned {status} for {url}")]
    Upstream { status: u16, url: String },

    /// A cached or shared value is not of the requested type
    #[error("Cached value for '{0}' has a different type")]
    TypeMismatch(String),

    /// Key not present in the cache
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Unknown catalog endpoint
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    /// Builds a loader failure from any displayable error.
    pub fn loader(err: impl std::fmt::Display) -> Self {
        FetchError::Loader(err.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Loader(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for FetchError {
    fn into_response(self) -> Response {
        let status = match &self {
            FetchError::Loader(_) => StatusCode::BAD_GATEWAY,
            FetchError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            FetchError::Upstream { status, .. } if *status == 404 => StatusCode::NOT_FOUND,
            FetchError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            FetchError::TypeMismatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FetchError::KeyNotFound(_) => StatusCode::NOT_FOUND,
            FetchError::UnknownEndpoint(_) => StatusCode::NOT_FOUND,
            FetchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;
