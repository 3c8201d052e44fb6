// ABOUTME: HTTP router assembly, shared application state, and health check
// ABOUTME: Wires auth and league handlers under /api with tracing and CORS
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rinkside

//! # HTTP Routes
//!
//! Thin axum handlers over the auth, sync, and storage layers. Protected
//! endpoints identify the caller by a bearer token carrying the internal
//! user id issued at the end of the OAuth callback.

pub mod auth;
pub mod leagues;

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::oauth::AuthManager;
use crate::providers::FantasyApi;
use crate::sync::SyncService;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use http::HeaderValue;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Shared state available to all handlers
#[derive(Clone)]
pub struct AppState {
    pub database: Arc<Database>,
    pub auth: Arc<AuthManager>,
    pub sync: Arc<SyncService>,
    pub api: Arc<dyn FantasyApi>,
}

/// Build the full application router
#[must_use]
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    let api_routes = Router::new()
        .route("/auth/login", get(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/logout", get(auth::logout).post(auth::logout))
        .route("/leagues", get(leagues::list_leagues))
        .route("/league/:league_key", get(leagues::get_league))
        .route("/league/:league_key/sync", post(leagues::sync_league))
        .route("/league/:league_key/teams", get(leagues::league_teams))
        .route("/league/:league_key/players", get(leagues::league_players))
        .route(
            "/league/:league_key/analysis/draft",
            get(leagues::draft_analysis),
        )
        .route(
            "/league/:league_key/analysis/trades",
            get(leagues::trade_analysis),
        )
        .route("/league/:league_key/history", get(leagues::league_history))
        .route(
            "/player/:player_key/performance",
            get(leagues::player_performance),
        );

    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        // Dev mode: no origins configured, accept anything
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Liveness probe
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Resolve the calling user from `Authorization: Bearer <user_id>`
///
/// # Errors
///
/// Returns `InvalidInput` when the header is missing or not a user id
pub fn bearer_user_id(headers: &HeaderMap) -> AppResult<Uuid> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::InvalidInput("missing bearer token".into()))?;

    Uuid::parse_str(token.trim())
        .map_err(|_| AppError::InvalidInput("malformed bearer token".into()))
}
