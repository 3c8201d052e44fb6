// ABOUTME: HTTP handlers for the OAuth login, callback, and logout endpoints
// ABOUTME: Delegates all flow logic to the session manager
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rinkside

use crate::errors::AppResult;
use crate::oauth::{AuthorizationResponse, CallbackResponse};
use crate::routes::{bearer_user_id, AppState};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

/// Query parameters of the provider callback redirect
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

/// `GET /api/auth/login` — begin the authorization flow
pub async fn login(State(state): State<AppState>) -> AppResult<Json<AuthorizationResponse>> {
    let response = state.auth.begin_authorization().await?;
    Ok(Json(response))
}

/// `GET /api/auth/callback` — complete the flow from the provider redirect
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> AppResult<Json<CallbackResponse>> {
    let response = state
        .auth
        .complete_authorization(&params.code, &params.state)
        .await?;
    Ok(Json(response))
}

/// `GET|POST /api/auth/logout` — discard the caller's stored credential
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = bearer_user_id(&headers)?;
    state.auth.logout(user_id).await?;
    Ok(Json(json!({ "message": "Logged out" })))
}
