// ABOUTME: OAuth2 authorization-code flow types and the identity provider trait
// ABOUTME: The provider trait keeps Yahoo specifics out of the session manager
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rinkside

//! # OAuth Integration
//!
//! Authorization-code flow against the upstream identity provider. The
//! [`IdentityProvider`] trait isolates wire details (endpoints, form
//! encoding) so the session manager in [`manager`] can be tested against
//! mocks, and another provider could be slotted in without touching the
//! flow logic.

pub mod manager;
pub mod yahoo;

pub use manager::AuthManager;
pub use yahoo::YahooIdentityProvider;

use crate::errors::AppResult;
use crate::models::Credential;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Response to an authorization request: where to send the user's browser
#[derive(Debug, Serialize)]
pub struct AuthorizationResponse {
    /// Full upstream authorization URL including the state parameter
    pub authorization_url: String,
    /// CSRF state token bound to this login attempt
    pub state: String,
    /// Minutes until the state token expires
    pub expires_in_minutes: i64,
}

/// Response after a completed OAuth callback
#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    /// Internal user id the credential was stored under
    pub user_id: Uuid,
    /// When the new access token expires
    pub expires_at: DateTime<Utc>,
    pub message: String,
}

/// Identity of the upstream account, from the OpenID userinfo endpoint
#[derive(Debug, Clone)]
pub struct UpstreamUser {
    /// Stable upstream account identifier (Yahoo GUID)
    pub guid: String,
}

/// Upstream identity provider operations
///
/// Implementations perform the actual HTTP exchanges; the session manager
/// owns state validation and credential persistence.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Build the authorization URL the user's browser is redirected to
    ///
    /// # Errors
    ///
    /// Returns an error if the configured authorization endpoint is invalid
    fn authorization_url(&self, state: &str) -> AppResult<String>;

    /// Exchange an authorization code for a credential
    ///
    /// # Errors
    ///
    /// Returns `UpstreamAuth` if the provider rejects the code
    async fn exchange_code(&self, code: &str) -> AppResult<Credential>;

    /// Exchange a refresh token for a fresh credential
    ///
    /// # Errors
    ///
    /// Returns `ReauthRequired` if the provider rejects the refresh token,
    /// `UpstreamUnavailable` on outages
    async fn refresh_token(&self, refresh_token: &str) -> AppResult<Credential>;

    /// Resolve the upstream account identity for an access token
    ///
    /// # Errors
    ///
    /// Returns `UpstreamAuth` if the token is not accepted
    async fn user_info(&self, access_token: &str) -> AppResult<UpstreamUser>;
}
