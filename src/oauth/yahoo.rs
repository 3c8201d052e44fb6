// ABOUTME: Yahoo OAuth2 identity provider: code exchange, refresh, userinfo
// ABOUTME: Maps Yahoo HTTP failures onto the crate error taxonomy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rinkside

//! Yahoo implementation of [`IdentityProvider`].
//!
//! Token requests are standard OAuth2 form posts. A 4xx on refresh means
//! the refresh token is dead and the user must log in again; 5xx and
//! network failures are reported as upstream unavailability so callers can
//! retry later without discarding the stored credential.

use crate::config::OAuthProviderConfig;
use crate::errors::{AppError, AppResult};
use crate::models::Credential;
use crate::oauth::{IdentityProvider, UpstreamUser};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

/// Yahoo's documented default access token lifetime
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
    #[allow(dead_code)]
    token_type: Option<String>,
}

/// OpenID userinfo response; only the subject is needed
#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    sub: String,
}

/// Yahoo OAuth2 identity provider
pub struct YahooIdentityProvider {
    http: reqwest::Client,
    config: OAuthProviderConfig,
}

impl YahooIdentityProvider {
    #[must_use]
    pub fn new(config: OAuthProviderConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn token_request(
        &self,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.http
            .post(&self.config.token_url)
            .form(params)
            .send()
            .await
    }

    fn credential_from_response(
        token: TokenResponse,
        previous_refresh_token: Option<&str>,
    ) -> Credential {
        let expires_in = token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        // Yahoo may omit the refresh token on refresh; the old one stays valid
        let refresh_token = token
            .refresh_token
            .or_else(|| previous_refresh_token.map(String::from))
            .unwrap_or_default();

        Credential {
            access_token: token.access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
            scope: token.scope.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl IdentityProvider for YahooIdentityProvider {
    fn authorization_url(&self, state: &str) -> AppResult<String> {
        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AppError::Config(format!("invalid auth_url: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", &self.config.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("state", state);
            if !self.config.scopes.is_empty() {
                query.append_pair("scope", &self.config.scopes.join(" "));
            }
        }

        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> AppResult<Credential> {
        let response = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
                ("redirect_uri", &self.config.redirect_uri),
            ])
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("token endpoint: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Authorization code exchange rejected");
            return Err(AppError::UpstreamAuth(format!(
                "code exchange failed with status {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::UpstreamAuth(format!("malformed token response: {e}")))?;

        debug!("Authorization code exchanged for access token");
        Ok(Self::credential_from_response(token, None))
    }

    async fn refresh_token(&self, refresh_token: &str) -> AppResult<Credential> {
        let response = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
                ("redirect_uri", &self.config.redirect_uri),
            ])
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("token endpoint: {e}")))?;

        let status = response.status();
        if status.is_client_error() {
            warn!(status = %status, "Refresh token rejected, re-authentication required");
            return Err(AppError::ReauthRequired);
        }
        if !status.is_success() {
            return Err(AppError::UpstreamUnavailable(format!(
                "token endpoint returned {status}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("malformed token response: {e}")))?;

        debug!("Access token refreshed");
        Ok(Self::credential_from_response(token, Some(refresh_token)))
    }

    async fn user_info(&self, access_token: &str) -> AppResult<UpstreamUser> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("userinfo endpoint: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UpstreamAuth(format!(
                "userinfo request failed with status {status}"
            )));
        }

        let info: UserInfoResponse = response
            .json()
            .await
            .map_err(|e| AppError::UpstreamAuth(format!("malformed userinfo response: {e}")))?;

        Ok(UpstreamUser { guid: info.sub })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        YAHOO_API_BASE_URL, YAHOO_AUTH_URL, YAHOO_TOKEN_URL, YAHOO_USERINFO_URL,
    };

    fn test_config() -> OAuthProviderConfig {
        OAuthProviderConfig {
            client_id: "client-id".into(),
            client_secret: "client-secret".into(),
            redirect_uri: "https://localhost:8081/api/auth/callback".into(),
            auth_url: YAHOO_AUTH_URL.into(),
            token_url: YAHOO_TOKEN_URL.into(),
            userinfo_url: YAHOO_USERINFO_URL.into(),
            api_base_url: YAHOO_API_BASE_URL.into(),
            scopes: vec!["fspt-r".into()],
        }
    }

    #[test]
    fn test_authorization_url_contains_required_params() {
        let provider = YahooIdentityProvider::new(test_config());
        let url = provider.authorization_url("state-token-xyz").unwrap();

        assert!(url.starts_with(YAHOO_AUTH_URL));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("state=state-token-xyz"));
        assert!(url.contains("scope=fspt-r"));
        // Redirect URI must be percent-encoded
        assert!(url.contains("redirect_uri=https%3A%2F%2Flocalhost"));
    }

    #[test]
    fn test_refresh_token_preserved_when_omitted() {
        let token = TokenResponse {
            access_token: "new-access".into(),
            refresh_token: None,
            expires_in: None,
            scope: None,
            token_type: None,
        };
        let credential =
            YahooIdentityProvider::credential_from_response(token, Some("old-refresh"));

        assert_eq!(credential.access_token, "new-access");
        assert_eq!(credential.refresh_token, "old-refresh");

        let remaining = credential.expires_at - Utc::now();
        assert!(remaining > Duration::seconds(DEFAULT_EXPIRES_IN_SECS - 5));
        assert!(remaining <= Duration::seconds(DEFAULT_EXPIRES_IN_SECS));
    }
}
