// ABOUTME: Unified error taxonomy for auth, sync, and storage failures
// ABOUTME: Maps each error to an HTTP status and a stable JSON envelope
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rinkside

//! # Error Handling
//!
//! Every fallible path in the crate surfaces an [`AppError`]. The variants
//! mirror the failure modes of the OAuth and sync layers: a failed CSRF
//! check is fatal to that login attempt, a dead refresh token requires a
//! full re-authentication, and exhausted rate-limit retries preserve any
//! partial data already fetched.

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Unified application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// CSRF state check failed; fatal to this login attempt
    #[error("invalid or expired OAuth state parameter")]
    InvalidState,

    /// Upstream rejected the authorization code or client credentials
    #[error("upstream authorization failed: {0}")]
    UpstreamAuth(String),

    /// Refresh token was rejected; the user must redo the full login flow
    #[error("refresh token rejected, full re-authentication required")]
    ReauthRequired,

    /// Upstream throttling outlasted the retry budget
    #[error("upstream rate limit exceeded after {retries} retries")]
    RateLimitExceeded {
        /// Number of retries attempted before giving up
        retries: u32,
    },

    /// Upstream outage or persistent transient failure
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Local persistence failure; fatal to the request
    #[error("storage failure: {0}")]
    Storage(String),

    /// Requested resource does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid request input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration is missing or invalid
    #[error("configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Stable machine-readable error code for API clients
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidState => "INVALID_STATE",
            Self::UpstreamAuth(_) => "UPSTREAM_AUTH_FAILED",
            Self::ReauthRequired => "REAUTH_REQUIRED",
            Self::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Self::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::NotFound(_) => "RESOURCE_NOT_FOUND",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidState | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamAuth(_) | Self::ReauthRequired => StatusCode::UNAUTHORIZED,
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// JSON error envelope returned to API clients
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorResponseDetails,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponseDetails {
    pub code: &'static str,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: error.code(),
                message: error.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        let body = ErrorResponse::from(&self);
        (status, Json(body)).into_response()
    }
}
