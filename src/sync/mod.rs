// ABOUTME: Sync orchestration: streams upstream pages into natural-key upserts
// ABOUTME: Per-(user, league) locking and per-entity partial-success reporting
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rinkside

//! # Sync Orchestration
//!
//! A league sync fetches teams, players, and draft picks page by page and
//! upserts each item under its upstream natural key, so re-running a sync
//! updates rows in place instead of duplicating them. Entity types fail
//! independently: an upstream error on one is recorded in the report while
//! the others proceed. Storage errors abort the whole sync. Concurrent
//! syncs of the same (user, league) pair serialize on an async mutex.

pub mod fetcher;

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{DraftPick, EntityKind, League, Player, Team};
use crate::oauth::AuthManager;
use crate::providers::FantasyApi;
use crate::sync::fetcher::{call_with_retry, fetch_pages, FetchConfig};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of syncing one entity type
#[derive(Debug, Clone, Serialize)]
pub struct EntityStatus {
    /// Entity type this status describes
    pub entity: EntityKind,
    /// Items upserted before completion or failure
    pub synced: u64,
    /// Upstream error that stopped this entity's sync, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Report for one league sync, entity by entity
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub league_key: String,
    pub started_at: DateTime<Utc>,
    pub entities: Vec<EntityStatus>,
}

impl SyncReport {
    /// Whether every entity type completed without an upstream error
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.entities.iter().all(|e| e.error.is_none())
    }
}

/// Orchestrates league synchronization
pub struct SyncService {
    database: Arc<Database>,
    auth: Arc<AuthManager>,
    api: Arc<dyn FantasyApi>,
    fetch_config: FetchConfig,
    // One lock per (user, league); entries are tiny and never removed
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SyncService {
    pub fn new(
        database: Arc<Database>,
        auth: Arc<AuthManager>,
        api: Arc<dyn FantasyApi>,
        fetch_config: FetchConfig,
    ) -> Self {
        Self {
            database,
            auth,
            api,
            fetch_config,
            locks: DashMap::new(),
        }
    }

    fn sync_lock(&self, user_id: Uuid, league_key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(format!("{user_id}:{league_key}"))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Sync a league's teams, players, and draft picks from the upstream
    ///
    /// Entity types are synced independently; upstream failures land in the
    /// report while the remaining types still run. Committed pages survive
    /// later failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the access token cannot be obtained, the league
    /// metadata fetch fails, or storage fails
    pub async fn sync_league(&self, user_id: Uuid, league_key: &str) -> AppResult<SyncReport> {
        let lock = self.sync_lock(user_id, league_key);
        let _guard = lock.lock().await;

        let started_at = Utc::now();
        let access_token = self.auth.get_valid_token(user_id).await?;

        // League metadata first; without it there is nothing to attach
        // entities to. Same retry policy as page fetches, a single 429
        // here must not abort the sync.
        let raw_league = call_with_retry(&self.fetch_config, || {
            self.api.league_info(&access_token, league_key)
        })
        .await?;
        let league = League::from_upstream(user_id, league_key, &raw_league);
        self.database.upsert_league(&league).await?;

        let mut entities = Vec::with_capacity(EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            let status = self
                .sync_entity(&access_token, league_key, kind)
                .await?;
            entities.push(status);
        }

        let report = SyncReport {
            league_key: league_key.to_owned(),
            started_at,
            entities,
        };
        info!(
            user_id = %user_id,
            league_key,
            complete = report.is_complete(),
            "League sync finished"
        );
        Ok(report)
    }

    /// Sync one entity type, committing each page as it arrives.
    ///
    /// Upstream errors are captured in the returned status; storage errors
    /// propagate because continuing would misreport persisted state.
    async fn sync_entity(
        &self,
        access_token: &str,
        league_key: &str,
        kind: EntityKind,
    ) -> AppResult<EntityStatus> {
        let mut synced: u64 = 0;
        let mut upstream_error = None;

        let mut pages = fetch_pages(
            self.api.as_ref(),
            access_token,
            league_key,
            kind,
            &self.fetch_config,
        );

        while let Some(result) = pages.next().await {
            match result {
                Ok(page) => {
                    for item in &page.items {
                        if self.upsert_item(league_key, kind, item).await? {
                            synced += 1;
                        }
                    }
                }
                Err(err @ AppError::Storage(_)) => return Err(err),
                Err(err) => {
                    warn!(
                        league_key,
                        entity = %kind,
                        synced,
                        error = %err,
                        "Entity sync stopped by upstream error, keeping partial data"
                    );
                    upstream_error = Some(err.to_string());
                    break;
                }
            }
        }

        Ok(EntityStatus {
            entity: kind,
            synced,
            error: upstream_error,
        })
    }

    /// Upsert one raw item; returns false for items without a natural key
    async fn upsert_item(
        &self,
        league_key: &str,
        kind: EntityKind,
        raw: &serde_json::Value,
    ) -> AppResult<bool> {
        match kind {
            EntityKind::Teams => match Team::from_upstream(league_key, raw) {
                Some(team) => {
                    self.database.upsert_team(&team).await?;
                    Ok(true)
                }
                None => {
                    warn!(league_key, "Skipping team without team_key");
                    Ok(false)
                }
            },
            EntityKind::Players => match Player::from_upstream(league_key, raw) {
                Some(player) => {
                    self.database.upsert_player(&player).await?;
                    Ok(true)
                }
                None => {
                    warn!(league_key, "Skipping player without player_key");
                    Ok(false)
                }
            },
            EntityKind::DraftPicks => match DraftPick::from_upstream(league_key, raw) {
                Some(pick) => {
                    self.database.upsert_draft_pick(&pick).await?;
                    Ok(true)
                }
                None => {
                    warn!(league_key, "Skipping draft result without pick number");
                    Ok(false)
                }
            },
        }
    }
}
