// ABOUTME: Fantasy sports provider abstraction and provider-level error type
// ABOUTME: Distinguishes rate limiting and transient faults for retry policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rinkside

//! # Fantasy Provider Layer
//!
//! The [`FantasyApi`] trait is the only surface the sync layer talks to.
//! Provider errors keep rate limiting, auth failures, and transient faults
//! distinct because each gets a different retry treatment upstream.

pub mod yahoo;

pub use yahoo::YahooFantasyClient;

use crate::errors::AppError;
use crate::models::EntityKind;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// One page of a paginated upstream collection
#[derive(Debug, Clone)]
pub struct CollectionPage {
    /// Raw item payloads in upstream order
    pub items: Vec<Value>,
    /// Whether the upstream reports more items past this page
    pub has_more: bool,
    /// Total collection size, when the upstream reports one
    pub total: Option<u32>,
}

/// Errors from a fantasy provider request
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP 429; `retry_after_secs` comes from the Retry-After header
    #[error("rate limited by upstream")]
    RateLimited {
        /// Upstream-suggested wait, if present
        retry_after_secs: Option<u64>,
    },

    /// HTTP 401; the access token was not accepted
    #[error("access token rejected by upstream")]
    Unauthorized,

    /// Non-retryable upstream API error
    #[error("upstream API error {status}: {message}")]
    Api {
        status: u16,
        message: String,
    },

    /// Connection-level failure (DNS, reset, timeout)
    #[error("network error: {0}")]
    Network(String),

    /// HTTP 5xx from the upstream
    #[error("upstream server error {status}")]
    Server {
        status: u16,
    },

    /// Response body could not be parsed
    #[error("malformed upstream response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Whether this failure is worth a bounded linear retry
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }
}

impl From<ProviderError> for AppError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::RateLimited { .. } => Self::RateLimitExceeded { retries: 0 },
            ProviderError::Unauthorized => Self::UpstreamAuth("access token rejected".into()),
            other => Self::UpstreamUnavailable(other.to_string()),
        }
    }
}

/// Read operations against the upstream fantasy API
#[async_trait]
pub trait FantasyApi: Send + Sync {
    /// Leagues the authenticated user belongs to, optionally by game code
    async fn user_leagues(
        &self,
        access_token: &str,
        game_code: Option<&str>,
    ) -> Result<Vec<Value>, ProviderError>;

    /// Metadata for a single league
    async fn league_info(
        &self,
        access_token: &str,
        league_key: &str,
    ) -> Result<Value, ProviderError>;

    /// One page of a league sub-collection, addressed by offset and count
    async fn fetch_collection(
        &self,
        access_token: &str,
        league_key: &str,
        kind: EntityKind,
        start: u32,
        count: u32,
    ) -> Result<CollectionPage, ProviderError>;

    /// League transactions (trades, adds, drops), newest first
    async fn league_transactions(
        &self,
        access_token: &str,
        league_key: &str,
    ) -> Result<Vec<Value>, ProviderError>;

    /// Season stats for one player
    async fn player_stats(
        &self,
        access_token: &str,
        player_key: &str,
    ) -> Result<Value, ProviderError>;
}
