// ABOUTME: HTTP handlers for league listing, sync, entities, and analysis views
// ABOUTME: Reads serve stored snapshots; sync is the only upstream write path
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rinkside

use crate::errors::{AppError, AppResult};
use crate::models::{League, Player, Team};
use crate::routes::{bearer_user_id, AppState};
use crate::sync::SyncReport;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

/// Query parameters for the league listing
#[derive(Debug, Deserialize)]
pub struct LeagueListParams {
    /// Yahoo game code filter, e.g. `nhl`
    pub game_code: Option<String>,
}

/// `GET /api/leagues` — the caller's leagues, live from the upstream
pub async fn list_leagues(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<LeagueListParams>,
) -> AppResult<Json<Value>> {
    let user_id = bearer_user_id(&headers)?;
    let access_token = state.auth.get_valid_token(user_id).await?;

    let leagues = state
        .api
        .user_leagues(&access_token, params.game_code.as_deref())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({ "leagues": leagues })))
}

/// `GET /api/league/:league_key` — stored league snapshot
pub async fn get_league(
    State(state): State<AppState>,
    Path(league_key): Path<String>,
) -> AppResult<Json<League>> {
    let league = state
        .database
        .get_league(&league_key)
        .await?
        .ok_or_else(|| AppError::NotFound("league".into()))?;
    Ok(Json(league))
}

/// `POST /api/league/:league_key/sync` — pull the league from the upstream
pub async fn sync_league(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(league_key): Path<String>,
) -> AppResult<Json<SyncReport>> {
    let user_id = bearer_user_id(&headers)?;
    let report = state.sync.sync_league(user_id, &league_key).await?;
    Ok(Json(report))
}

/// `GET /api/league/:league_key/teams` — stored teams, by standing
pub async fn league_teams(
    State(state): State<AppState>,
    Path(league_key): Path<String>,
) -> AppResult<Json<Vec<Team>>> {
    Ok(Json(state.database.league_teams(&league_key).await?))
}

/// `GET /api/league/:league_key/players` — stored players
pub async fn league_players(
    State(state): State<AppState>,
    Path(league_key): Path<String>,
) -> AppResult<Json<Vec<Player>>> {
    Ok(Json(state.database.league_players(&league_key).await?))
}

/// `GET /api/league/:league_key/analysis/draft` — draft results and grades
///
/// Grading heuristics are not implemented yet; the endpoint serves the
/// stored draft board with empty scoring fields so the UI renders.
pub async fn draft_analysis(
    State(state): State<AppState>,
    Path(league_key): Path<String>,
) -> AppResult<Json<Value>> {
    let picks = state.database.league_draft_picks(&league_key).await?;
    let total_picks = picks.len();

    Ok(Json(json!({
        "draft_results": picks,
        "best_picks": [],
        "worst_picks": [],
        "draft_grades": {},
        "total_picks": total_picks,
    })))
}

/// `GET /api/league/:league_key/analysis/trades` — trade activity view
///
/// Serves live transaction data (trades, adds, drops) from the upstream.
/// The over/underperformer scoring is not implemented; those fields stay
/// empty so the UI renders.
pub async fn trade_analysis(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(league_key): Path<String>,
) -> AppResult<Json<Value>> {
    let user_id = bearer_user_id(&headers)?;
    let access_token = state.auth.get_valid_token(user_id).await?;

    let transactions = state
        .api
        .league_transactions(&access_token, &league_key)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "transactions": transactions,
        "overperformers": [],
        "underperformers": [],
        "recommendations": [],
    })))
}

/// Query parameters for the player performance view
#[derive(Debug, Deserialize)]
pub struct PerformanceParams {
    /// League key for context
    pub league_key: Option<String>,
}

/// `GET /api/player/:player_key/performance` — per-player stat view
///
/// Serves the player's upstream season stats. Projection and comparison
/// scoring is not implemented; those fields stay empty.
pub async fn player_performance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(player_key): Path<String>,
    Query(_params): Query<PerformanceParams>,
) -> AppResult<Json<Value>> {
    let user_id = bearer_user_id(&headers)?;
    let access_token = state.auth.get_valid_token(user_id).await?;

    let stats = state
        .api
        .player_stats(&access_token, &player_key)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "player_key": player_key,
        "stats": stats,
        "projection": {},
        "actual": {},
        "comparison": {},
    })))
}

/// `GET /api/league/:league_key/history` — league metadata with past seasons
pub async fn league_history(
    State(state): State<AppState>,
    Path(league_key): Path<String>,
) -> AppResult<Json<Value>> {
    let league = state
        .database
        .get_league(&league_key)
        .await?
        .ok_or_else(|| AppError::NotFound("league".into()))?;

    Ok(Json(json!({
        "metadata": league,
        "seasons": [],
    })))
}
