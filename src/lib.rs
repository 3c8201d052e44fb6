// ABOUTME: Main library entry point for the Rinkside fantasy hockey backend
// ABOUTME: Exposes OAuth, sync, storage, and HTTP route modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rinkside

#![deny(unsafe_code)]

//! # Rinkside
//!
//! Backend for a fantasy hockey dashboard. Authenticates users against the
//! Yahoo Fantasy Sports API via OAuth2, pulls league, team, player, and draft
//! data through Yahoo's paginated REST endpoints, and persists everything in
//! SQLite so the single-page UI can read stable snapshots.
//!
//! ## Architecture
//!
//! - **oauth**: authorization-code and refresh flows, CSRF state handling,
//!   and the token lifecycle (`get_valid_token` refreshes lazily on demand)
//! - **providers**: the upstream fantasy API behind a trait so the concrete
//!   client is swappable in tests
//! - **sync**: paginated fetching with rate-limit backoff plus the league
//!   sync orchestrator with natural-key upserts
//! - **database**: SQLite storage, including encrypted OAuth credentials
//! - **routes**: the axum HTTP surface consumed by the UI

/// Environment-based server configuration
pub mod config;

/// SQLite storage for users, credentials, and league entities
pub mod database;

/// Application error taxonomy and HTTP error responses
pub mod errors;

/// Structured logging setup built on tracing
pub mod logging;

/// Domain models and credential encryption
pub mod models;

/// OAuth2 flows and token lifecycle management
pub mod oauth;

/// Upstream fantasy sports API clients
pub mod providers;

/// HTTP route handlers for the dashboard UI
pub mod routes;

/// Paginated fetching and league synchronization
pub mod sync;
