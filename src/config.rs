// ABOUTME: Environment-only server configuration for Rinkside
// ABOUTME: Covers Yahoo OAuth credentials, database, HTTP, and sync tuning
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rinkside

//! Server configuration loaded exclusively from environment variables.
//!
//! Yahoo OAuth endpoints default to the production URLs; client credentials
//! must be provided via `YAHOO_CLIENT_ID` / `YAHOO_CLIENT_SECRET`.

use crate::errors::{AppError, AppResult};
use crate::sync::fetcher::FetchConfig;
use sha2::{Digest, Sha256};
use std::env;
use tracing::{info, warn};

/// Default Yahoo OAuth2 authorization endpoint
pub const YAHOO_AUTH_URL: &str = "https://api.login.yahoo.com/oauth2/request_auth";
/// Default Yahoo OAuth2 token endpoint
pub const YAHOO_TOKEN_URL: &str = "https://api.login.yahoo.com/oauth2/get_token";
/// Default Yahoo OpenID userinfo endpoint
pub const YAHOO_USERINFO_URL: &str = "https://api.login.yahoo.com/openid/v1/userinfo";
/// Default Yahoo Fantasy Sports API base URL
pub const YAHOO_API_BASE_URL: &str = "https://fantasysports.yahooapis.com/fantasy/v2";

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP bind port
    pub http_port: u16,
    /// Allowed CORS origins for the UI; empty means permissive (dev mode)
    pub cors_origins: Vec<String>,
    /// SQLite database URL
    pub database_url: String,
    /// AES-256-GCM key for credential encryption at rest
    pub encryption_key: Vec<u8>,
    /// Yahoo OAuth provider configuration
    pub oauth: OAuthProviderConfig,
    /// Minutes before expiry at which tokens are refreshed eagerly
    pub token_refresh_skew_minutes: i64,
    /// Pagination and retry tuning for upstream fetches
    pub fetch: FetchConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if required OAuth credentials are missing or the
    /// encryption key is malformed
    pub fn from_env() -> AppResult<Self> {
        let http_port = env::var("HTTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8081);

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:./data/rinkside.db".into());

        let token_refresh_skew_minutes = env::var("TOKEN_REFRESH_SKEW_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            http_port,
            cors_origins,
            database_url,
            encryption_key: load_encryption_key()?,
            oauth: OAuthProviderConfig::from_env()?,
            token_refresh_skew_minutes,
            fetch: FetchConfig::from_env(),
        })
    }

    /// One-line startup summary for logging
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "http_port={} database={} oauth_redirect={} page_size={}",
            self.http_port, self.database_url, self.oauth.redirect_uri, self.fetch.page_size
        )
    }
}

/// Yahoo OAuth provider configuration
#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Registered redirect URI; must match the authorization request exactly
    pub redirect_uri: String,
    /// Authorization endpoint
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
    /// OpenID userinfo endpoint
    pub userinfo_url: String,
    /// Fantasy API base URL
    pub api_base_url: String,
    /// Requested OAuth scopes; Yahoo applies app-configured defaults if empty
    pub scopes: Vec<String>,
}

impl OAuthProviderConfig {
    /// Load Yahoo OAuth configuration from environment
    ///
    /// # Errors
    ///
    /// Returns an error if client credentials or the redirect URI are missing
    pub fn from_env() -> AppResult<Self> {
        let client_id = require_env("YAHOO_CLIENT_ID")?;
        let client_secret = require_env("YAHOO_CLIENT_SECRET")?;
        let redirect_uri = require_env("YAHOO_REDIRECT_URI")?;

        let scopes = env::var("YAHOO_SCOPES")
            .map(|v| {
                v.split(' ')
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            auth_url: env::var("YAHOO_AUTH_URL").unwrap_or_else(|_| YAHOO_AUTH_URL.into()),
            token_url: env::var("YAHOO_TOKEN_URL").unwrap_or_else(|_| YAHOO_TOKEN_URL.into()),
            userinfo_url: env::var("YAHOO_USERINFO_URL")
                .unwrap_or_else(|_| YAHOO_USERINFO_URL.into()),
            api_base_url: env::var("YAHOO_API_BASE_URL")
                .unwrap_or_else(|_| YAHOO_API_BASE_URL.into()),
            scopes,
        })
    }

    /// SHA256 fingerprint of the client secret (first 8 hex chars)
    ///
    /// Allows comparing configured secrets in logs without exposing values.
    #[must_use]
    pub fn secret_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.client_secret.as_bytes());
        let result = hasher.finalize();
        format!("{result:x}").chars().take(8).collect()
    }

    /// Log credential diagnostics at startup
    pub fn log_diagnostics(&self) {
        info!(
            "Yahoo OAuth configured: client_id_len={} secret_fingerprint={} redirect={}",
            self.client_id.len(),
            self.secret_fingerprint(),
            self.redirect_uri
        );
    }
}

fn require_env(name: &str) -> AppResult<String> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::Config(format!("{name} is not set"))),
    }
}

/// Load the 32-byte credential encryption key from `TOKEN_ENCRYPTION_KEY`
/// (hex-encoded), generating an ephemeral key if unset.
///
/// An ephemeral key means stored credentials do not survive a restart, so
/// it is only acceptable for development.
///
/// # Errors
///
/// Returns an error if the configured key is not 64 hex characters
pub fn load_encryption_key() -> AppResult<Vec<u8>> {
    match env::var("TOKEN_ENCRYPTION_KEY") {
        Ok(hex_key) => {
            let key = hex::decode(hex_key.trim())
                .map_err(|e| AppError::Config(format!("TOKEN_ENCRYPTION_KEY is not hex: {e}")))?;
            if key.len() != 32 {
                return Err(AppError::Config(format!(
                    "TOKEN_ENCRYPTION_KEY must be 32 bytes, got {}",
                    key.len()
                )));
            }
            Ok(key)
        }
        Err(_) => {
            warn!("TOKEN_ENCRYPTION_KEY not set, generating ephemeral key (dev only)");
            Ok(crate::models::generate_encryption_key().to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_fingerprint_is_stable() {
        let config = OAuthProviderConfig {
            client_id: "id".into(),
            client_secret: "secret".into(),
            redirect_uri: "https://localhost/callback".into(),
            auth_url: YAHOO_AUTH_URL.into(),
            token_url: YAHOO_TOKEN_URL.into(),
            userinfo_url: YAHOO_USERINFO_URL.into(),
            api_base_url: YAHOO_API_BASE_URL.into(),
            scopes: vec![],
        };

        let fp1 = config.secret_fingerprint();
        let fp2 = config.secret_fingerprint();
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.len(), 8);
    }
}
