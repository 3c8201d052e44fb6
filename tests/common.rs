// ABOUTME: Shared test fixtures: in-memory database, mock identity provider,
// ABOUTME: and a scriptable fantasy API for pagination and sync scenarios

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rinkside::database::Database;
use rinkside::errors::{AppError, AppResult};
use rinkside::models::{generate_encryption_key, Credential, EntityKind};
use rinkside::oauth::{AuthManager, IdentityProvider, UpstreamUser};
use rinkside::providers::{CollectionPage, FantasyApi, ProviderError};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Fresh in-memory database with a random encryption key
pub async fn test_database() -> Arc<Database> {
    let key = generate_encryption_key().to_vec();
    Arc::new(Database::new("sqlite::memory:", key).await.unwrap())
}

/// Identity provider double with controllable token lifetime and refresh
/// behavior
pub struct MockIdentityProvider {
    /// Lifetime of tokens issued by `exchange_code`, in seconds
    pub exchange_ttl_secs: i64,
    /// When set, refresh attempts are rejected as they would be for a
    /// revoked refresh token
    pub fail_refresh: AtomicBool,
    /// Number of refresh attempts observed
    pub refresh_calls: AtomicU32,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self {
            exchange_ttl_secs: 3600,
            fail_refresh: AtomicBool::new(false),
            refresh_calls: AtomicU32::new(0),
        }
    }

    /// Provider whose issued access tokens are already expired
    pub fn with_expired_tokens() -> Self {
        Self {
            exchange_ttl_secs: 0,
            ..Self::new()
        }
    }

    pub fn refresh_call_count(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    fn authorization_url(&self, state: &str) -> AppResult<String> {
        Ok(format!("https://auth.example/request_auth?state={state}"))
    }

    async fn exchange_code(&self, code: &str) -> AppResult<Credential> {
        Ok(Credential {
            access_token: format!("at-{code}"),
            refresh_token: format!("rt-{code}"),
            expires_at: Utc::now() + Duration::seconds(self.exchange_ttl_secs),
            scope: "fspt-r".into(),
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> AppResult<Credential> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(AppError::ReauthRequired);
        }
        Ok(Credential {
            access_token: format!("at-refreshed-{call}"),
            refresh_token: refresh_token.to_owned(),
            expires_at: Utc::now() + Duration::hours(1),
            scope: "fspt-r".into(),
        })
    }

    async fn user_info(&self, _access_token: &str) -> AppResult<UpstreamUser> {
        Ok(UpstreamUser {
            guid: "mock-guid".into(),
        })
    }
}

/// Run the full authorization-code flow against a mock provider and return
/// the logged-in user's id
pub async fn login(auth: &AuthManager) -> uuid::Uuid {
    let authorization = auth.begin_authorization().await.unwrap();
    auth.complete_authorization("test-code", &authorization.state)
        .await
        .unwrap()
        .user_id
}

/// One scripted response for a collection fetch
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Serve `items` items starting at the requested offset
    Page { items: usize, has_more: bool },
    /// Respond with HTTP 429
    RateLimited,
    /// Respond with HTTP 503
    ServerError,
}

/// Fantasy API double that serves scripted responses per entity type.
///
/// Item payloads carry deterministic natural keys derived from the
/// requested offset, so re-fetching an offset yields identical keys and
/// upserts stay idempotent.
pub struct ScriptedApi {
    scripts: Mutex<HashMap<EntityKind, VecDeque<Scripted>>>,
    league_info_script: Mutex<VecDeque<Scripted>>,
    transactions: Mutex<Vec<Value>>,
    /// When the script queue is empty: serve endless full pages instead of
    /// an empty final page
    pub default_full_pages: bool,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            league_info_script: Mutex::new(VecDeque::new()),
            transactions: Mutex::new(Vec::new()),
            default_full_pages: false,
        }
    }

    pub fn endless() -> Self {
        Self {
            default_full_pages: true,
            ..Self::new()
        }
    }

    pub fn script(&self, kind: EntityKind, responses: Vec<Scripted>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(kind, responses.into());
    }

    /// Queue failures ahead of the league metadata fetch; once drained,
    /// the fetch succeeds
    pub fn script_league_info(&self, responses: Vec<Scripted>) {
        *self.league_info_script.lock().unwrap() = responses.into();
    }

    pub fn set_transactions(&self, transactions: Vec<Value>) {
        *self.transactions.lock().unwrap() = transactions;
    }

    fn make_items(kind: EntityKind, start: u32, n: usize) -> Vec<Value> {
        (0..n)
            .map(|i| {
                let index = start as usize + i;
                match kind {
                    EntityKind::Teams => json!({
                        "team_key": format!("427.l.1.t.{index}"),
                        "name": format!("Team {index}"),
                        "wins": index,
                    }),
                    EntityKind::Players => json!({
                        "player_key": format!("427.p.{index}"),
                        "name": format!("Player {index}"),
                        "position": "C",
                    }),
                    EntityKind::DraftPicks => json!({
                        "pick": index + 1,
                        "round": index / 12 + 1,
                        "team_key": format!("427.l.1.t.{}", index % 12),
                    }),
                }
            })
            .collect()
    }
}

#[async_trait]
impl FantasyApi for ScriptedApi {
    async fn user_leagues(
        &self,
        _access_token: &str,
        _game_code: Option<&str>,
    ) -> Result<Vec<Value>, ProviderError> {
        Ok(vec![json!({
            "league_key": "427.l.1",
            "name": "Test League",
            "season": 2025,
            "game_code": "nhl",
        })])
    }

    async fn league_info(
        &self,
        _access_token: &str,
        _league_key: &str,
    ) -> Result<Value, ProviderError> {
        let next = self.league_info_script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::RateLimited) => {
                return Err(ProviderError::RateLimited {
                    retry_after_secs: None,
                })
            }
            Some(Scripted::ServerError) => return Err(ProviderError::Server { status: 503 }),
            _ => {}
        }
        Ok(json!({
            "name": "Test League",
            "season": 2025,
            "game_code": "nhl",
            "league_type": "private",
        }))
    }

    async fn fetch_collection(
        &self,
        _access_token: &str,
        _league_key: &str,
        kind: EntityKind,
        start: u32,
        count: u32,
    ) -> Result<CollectionPage, ProviderError> {
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&kind)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Scripted::Page { items, has_more }) => Ok(CollectionPage {
                items: Self::make_items(kind, start, items),
                has_more,
                total: None,
            }),
            Some(Scripted::RateLimited) => Err(ProviderError::RateLimited {
                retry_after_secs: None,
            }),
            Some(Scripted::ServerError) => Err(ProviderError::Server { status: 503 }),
            None if self.default_full_pages => Ok(CollectionPage {
                items: Self::make_items(kind, start, count as usize),
                has_more: true,
                total: None,
            }),
            None => Ok(CollectionPage {
                items: Vec::new(),
                has_more: false,
                total: None,
            }),
        }
    }

    async fn league_transactions(
        &self,
        _access_token: &str,
        _league_key: &str,
    ) -> Result<Vec<Value>, ProviderError> {
        Ok(self.transactions.lock().unwrap().clone())
    }

    async fn player_stats(
        &self,
        _access_token: &str,
        player_key: &str,
    ) -> Result<Value, ProviderError> {
        Ok(json!({
            "player_key": player_key,
            "player_stats": {
                "coverage_type": "season",
                "stats": [{"stat": {"stat_id": "1", "value": "40"}}],
            },
        }))
    }
}
