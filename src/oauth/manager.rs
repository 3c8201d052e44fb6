// ABOUTME: OAuth session manager: CSRF state lifecycle and credential refresh
// ABOUTME: Guarantees single-use state tokens and at most one refresh per request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rinkside

//! Session manager for the authorization-code flow.
//!
//! State tokens are random, single-use, and expire after ten minutes.
//! `get_valid_token` refreshes eagerly inside a configurable skew window
//! and performs at most one refresh attempt per call; a rejected refresh
//! leaves the stored credential untouched so a later attempt (or explicit
//! re-login) starts from the same place.

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::Credential;
use crate::oauth::{AuthorizationResponse, CallbackResponse, IdentityProvider};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How long a pending login's state token stays valid
const STATE_TTL_MINUTES: i64 = 10;

/// A login attempt awaiting its callback
#[derive(Debug, Clone)]
struct PendingLogin {
    created_at: DateTime<Utc>,
}

impl PendingLogin {
    fn is_expired(&self) -> bool {
        Utc::now() - self.created_at > Duration::minutes(STATE_TTL_MINUTES)
    }
}

/// Manages OAuth sessions: state tokens, code exchange, token refresh
pub struct AuthManager {
    database: Arc<Database>,
    provider: Arc<dyn IdentityProvider>,
    pending: RwLock<HashMap<String, PendingLogin>>,
    refresh_skew: Duration,
}

impl AuthManager {
    /// Create a manager with the default five-minute refresh skew
    pub fn new(database: Arc<Database>, provider: Arc<dyn IdentityProvider>) -> Self {
        Self::with_refresh_skew(database, provider, 5)
    }

    /// Create a manager with an explicit refresh skew in minutes
    pub fn with_refresh_skew(
        database: Arc<Database>,
        provider: Arc<dyn IdentityProvider>,
        skew_minutes: i64,
    ) -> Self {
        Self {
            database,
            provider,
            pending: RwLock::new(HashMap::new()),
            refresh_skew: Duration::minutes(skew_minutes),
        }
    }

    /// Start a login attempt: mint a state token and build the redirect URL
    ///
    /// # Errors
    ///
    /// Returns an error if the authorization URL cannot be constructed
    pub async fn begin_authorization(&self) -> AppResult<AuthorizationResponse> {
        let state = generate_state();
        let authorization_url = self.provider.authorization_url(&state)?;

        {
            let mut pending = self.pending.write().await;
            // Opportunistic cleanup keeps the map bounded without a timer task
            pending.retain(|_, login| !login.is_expired());
            pending.insert(
                state.clone(),
                PendingLogin {
                    created_at: Utc::now(),
                },
            );
        }

        debug!("Created OAuth state token for new login attempt");
        Ok(AuthorizationResponse {
            authorization_url,
            state,
            expires_in_minutes: STATE_TTL_MINUTES,
        })
    }

    /// Complete a login attempt from the provider callback
    ///
    /// Consumes the state token (single use), exchanges the code, resolves
    /// the upstream identity, and persists the encrypted credential.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` for unknown, reused, or expired state tokens;
    /// `UpstreamAuth` if the code exchange fails
    pub async fn complete_authorization(
        &self,
        code: &str,
        state: &str,
    ) -> AppResult<CallbackResponse> {
        let login = {
            let mut pending = self.pending.write().await;
            pending.remove(state)
        };
        match login {
            Some(login) if !login.is_expired() => {}
            Some(_) => {
                warn!("OAuth callback with expired state token");
                return Err(AppError::InvalidState);
            }
            None => {
                warn!("OAuth callback with unknown state token");
                return Err(AppError::InvalidState);
            }
        }

        let credential = self.provider.exchange_code(code).await?;
        let upstream = self.provider.user_info(&credential.access_token).await?;
        let user_id = self.database.get_or_create_user(&upstream.guid).await?;
        self.database.save_credential(user_id, &credential).await?;

        info!(user_id = %user_id, "OAuth login completed");
        Ok(CallbackResponse {
            user_id,
            expires_at: credential.expires_at,
            message: "Authentication successful".into(),
        })
    }

    /// Return a usable access token for the user, refreshing if needed
    ///
    /// Performs at most one refresh attempt. A rejected refresh surfaces as
    /// `ReauthRequired` and the stored credential is left unmodified.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no credential is stored, `ReauthRequired` if
    /// the refresh token was rejected
    pub async fn get_valid_token(&self, user_id: Uuid) -> AppResult<String> {
        let credential = self.database.get_credential(user_id).await?;

        if !credential.needs_refresh(self.refresh_skew) {
            return Ok(credential.access_token);
        }

        debug!(user_id = %user_id, "Access token within refresh window, refreshing");
        let refreshed = self.provider.refresh_token(&credential.refresh_token).await?;
        self.database.save_credential(user_id, &refreshed).await?;

        info!(user_id = %user_id, expires_at = %refreshed.expires_at, "Access token refreshed");
        Ok(refreshed.access_token)
    }

    /// Decrypted credential for the user, without triggering a refresh
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no credential is stored
    pub async fn stored_credential(&self, user_id: Uuid) -> AppResult<Credential> {
        self.database.get_credential(user_id).await
    }

    /// Discard the user's stored credential
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure
    pub async fn logout(&self, user_id: Uuid) -> AppResult<()> {
        self.database.clear_credential(user_id).await?;
        info!(user_id = %user_id, "Credential cleared");
        Ok(())
    }
}

/// Random 32-byte URL-safe state token
fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_tokens_are_unique_and_urlsafe() {
        let a = generate_state();
        let b = generate_state();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        // 32 bytes base64url without padding
        assert_eq!(a.len(), 43);
    }

    #[test]
    fn test_pending_login_expiry() {
        let fresh = PendingLogin {
            created_at: Utc::now(),
        };
        assert!(!fresh.is_expired());

        let stale = PendingLogin {
            created_at: Utc::now() - Duration::minutes(STATE_TTL_MINUTES + 1),
        };
        assert!(stale.is_expired());
    }
}
