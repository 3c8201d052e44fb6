// ABOUTME: SQLite storage for users, encrypted credentials, and league entities
// ABOUTME: Natural-key upserts keep repeated syncs idempotent
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rinkside

//! # Database Management
//!
//! Single SQLite-backed storage layer. OAuth credentials live on the user
//! row and are encrypted before they touch disk. League entities are
//! upserted by their upstream natural key, preserving internal row ids so
//! re-syncs never duplicate rows.

use crate::errors::{AppError, AppResult};
use crate::models::{
    Credential, DraftPick, EncryptedCredential, EntityKind, League, Player, Team,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Database handle for user and league data
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    encryption_key: Vec<u8>,
}

impl Database {
    /// Open (creating if necessary) the database and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or migration fails
    pub async fn new(database_url: &str, encryption_key: Vec<u8>) -> AppResult<Self> {
        // Ensure SQLite creates the database file if it doesn't exist
        let connection_options = if database_url.starts_with("sqlite:")
            && !database_url.contains(":memory:")
        {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_owned()
        };

        // Every pooled connection to :memory: would get its own empty
        // database, so pin in-memory pools to a single connection
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(&connection_options)
                .await?
        } else {
            SqlitePool::connect(&connection_options).await?
        };

        let db = Self {
            pool,
            encryption_key,
        };
        db.migrate().await?;
        Ok(db)
    }

    /// Run idempotent schema migrations
    ///
    /// # Errors
    ///
    /// Returns an error if any DDL statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                yahoo_guid TEXT UNIQUE NOT NULL,
                access_token TEXT,
                refresh_token TEXT,
                token_expires_at TEXT,
                token_scope TEXT,
                created_at TEXT NOT NULL,
                last_active TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_guid ON users(yahoo_guid)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS leagues (
                id TEXT PRIMARY KEY,
                league_key TEXT UNIQUE NOT NULL,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                season INTEGER,
                game_code TEXT NOT NULL,
                league_type TEXT,
                raw_data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS teams (
                id TEXT PRIMARY KEY,
                team_key TEXT UNIQUE NOT NULL,
                league_key TEXT NOT NULL,
                name TEXT NOT NULL,
                manager TEXT,
                wins INTEGER NOT NULL DEFAULT 0,
                losses INTEGER NOT NULL DEFAULT 0,
                ties INTEGER NOT NULL DEFAULT 0,
                points_for REAL NOT NULL DEFAULT 0,
                points_against REAL NOT NULL DEFAULT 0,
                standing INTEGER,
                raw_data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_teams_league ON teams(league_key)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS players (
                id TEXT PRIMARY KEY,
                player_key TEXT UNIQUE NOT NULL,
                league_key TEXT NOT NULL,
                name TEXT NOT NULL,
                position TEXT,
                nhl_team TEXT,
                status TEXT,
                raw_data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_players_league ON players(league_key)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS draft_picks (
                id TEXT PRIMARY KEY,
                league_key TEXT NOT NULL,
                pick INTEGER NOT NULL,
                round INTEGER,
                team_key TEXT,
                player_key TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (league_key, pick)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Users & credentials (TokenStore) ───────────────────────────────

    /// Look up a user by Yahoo GUID, creating one if unknown
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure
    pub async fn get_or_create_user(&self, yahoo_guid: &str) -> AppResult<Uuid> {
        let row = sqlx::query("SELECT id FROM users WHERE yahoo_guid = ?1")
            .bind(yahoo_guid)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            let id: String = row.try_get("id")?;
            return Uuid::parse_str(&id)
                .map_err(|e| AppError::Storage(format!("corrupt user id: {e}")));
        }

        let user_id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO users (id, yahoo_guid, created_at, last_active) VALUES (?1, ?2, ?3, ?3)",
        )
        .bind(user_id.to_string())
        .bind(yahoo_guid)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(user_id)
    }

    /// Persist a user's OAuth credential, replacing any previous one
    ///
    /// The whole credential is replaced atomically in a single UPDATE, so
    /// concurrent refreshes resolve last-writer-wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the user does not exist or storage fails
    pub async fn save_credential(&self, user_id: Uuid, credential: &Credential) -> AppResult<()> {
        let encrypted = EncryptedCredential::new(credential, &self.encryption_key)?;

        let result = sqlx::query(
            r"
            UPDATE users
            SET access_token = ?1, refresh_token = ?2, token_expires_at = ?3,
                token_scope = ?4, last_active = ?5
            WHERE id = ?6
            ",
        )
        .bind(&encrypted.access_token)
        .bind(&encrypted.refresh_token)
        .bind(encrypted.expires_at.to_rfc3339())
        .bind(&encrypted.scope)
        .bind(Utc::now().to_rfc3339())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("user".into()));
        }
        Ok(())
    }

    /// Fetch and decrypt a user's OAuth credential
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user has no stored credential
    pub async fn get_credential(&self, user_id: Uuid) -> AppResult<Credential> {
        let row = sqlx::query(
            "SELECT access_token, refresh_token, token_expires_at, token_scope
             FROM users WHERE id = ?1",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("credential".into()))?;

        let access_token: Option<String> = row.try_get("access_token")?;
        let refresh_token: Option<String> = row.try_get("refresh_token")?;
        let expires_at: Option<String> = row.try_get("token_expires_at")?;
        let scope: Option<String> = row.try_get("token_scope")?;

        let (Some(access), Some(refresh), Some(expires)) =
            (access_token, refresh_token, expires_at)
        else {
            return Err(AppError::NotFound("credential".into()));
        };

        let encrypted = EncryptedCredential {
            access_token: access,
            refresh_token: refresh,
            expires_at: parse_timestamp(&expires)?,
            scope: scope.unwrap_or_default(),
        };
        encrypted.decrypt(&self.encryption_key)
    }

    /// Remove a user's OAuth credential (logout)
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure
    pub async fn clear_credential(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE users
             SET access_token = NULL, refresh_token = NULL,
                 token_expires_at = NULL, token_scope = NULL
             WHERE id = ?1",
        )
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ── Leagues ────────────────────────────────────────────────────────

    /// Upsert a league by its upstream key
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure
    pub async fn upsert_league(&self, league: &League) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r"
            INSERT INTO leagues (id, league_key, user_id, name, season, game_code,
                                 league_type, raw_data, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            ON CONFLICT(league_key) DO UPDATE SET
                name = excluded.name,
                season = excluded.season,
                game_code = excluded.game_code,
                league_type = excluded.league_type,
                raw_data = excluded.raw_data,
                updated_at = excluded.updated_at
            ",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&league.league_key)
        .bind(league.user_id.to_string())
        .bind(&league.name)
        .bind(league.season)
        .bind(&league.game_code)
        .bind(&league.league_type)
        .bind(league.raw.to_string())
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch a league snapshot by key
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure
    pub async fn get_league(&self, league_key: &str) -> AppResult<Option<League>> {
        let row = sqlx::query(
            "SELECT league_key, user_id, name, season, game_code, league_type, raw_data
             FROM leagues WHERE league_key = ?1",
        )
        .bind(league_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| league_from_row(&row)).transpose()
    }

    /// List leagues synced by a user, optionally filtered by game code
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure
    pub async fn list_leagues(
        &self,
        user_id: Uuid,
        game_code: Option<&str>,
    ) -> AppResult<Vec<League>> {
        let rows = match game_code {
            Some(code) => {
                sqlx::query(
                    "SELECT league_key, user_id, name, season, game_code, league_type, raw_data
                     FROM leagues WHERE user_id = ?1 AND game_code = ?2 ORDER BY league_key",
                )
                .bind(user_id.to_string())
                .bind(code)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT league_key, user_id, name, season, game_code, league_type, raw_data
                     FROM leagues WHERE user_id = ?1 ORDER BY league_key",
                )
                .bind(user_id.to_string())
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(league_from_row).collect()
    }

    // ── Teams / players / draft picks ──────────────────────────────────

    /// Upsert a team by its upstream key, preserving the internal row id
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure
    pub async fn upsert_team(&self, team: &Team) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r"
            INSERT INTO teams (id, team_key, league_key, name, manager, wins, losses,
                               ties, points_for, points_against, standing, raw_data,
                               created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
            ON CONFLICT(team_key) DO UPDATE SET
                name = excluded.name,
                manager = excluded.manager,
                wins = excluded.wins,
                losses = excluded.losses,
                ties = excluded.ties,
                points_for = excluded.points_for,
                points_against = excluded.points_against,
                standing = excluded.standing,
                raw_data = excluded.raw_data,
                updated_at = excluded.updated_at
            ",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&team.team_key)
        .bind(&team.league_key)
        .bind(&team.name)
        .bind(&team.manager)
        .bind(team.wins)
        .bind(team.losses)
        .bind(team.ties)
        .bind(team.points_for)
        .bind(team.points_against)
        .bind(team.standing)
        .bind(team.raw.to_string())
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert a player by its upstream key
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure
    pub async fn upsert_player(&self, player: &Player) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r"
            INSERT INTO players (id, player_key, league_key, name, position, nhl_team,
                                 status, raw_data, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            ON CONFLICT(player_key) DO UPDATE SET
                name = excluded.name,
                position = excluded.position,
                nhl_team = excluded.nhl_team,
                status = excluded.status,
                raw_data = excluded.raw_data,
                updated_at = excluded.updated_at
            ",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&player.player_key)
        .bind(&player.league_key)
        .bind(&player.name)
        .bind(&player.position)
        .bind(&player.nhl_team)
        .bind(&player.status)
        .bind(player.raw.to_string())
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert a draft pick by (league, pick number)
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure
    pub async fn upsert_draft_pick(&self, pick: &DraftPick) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r"
            INSERT INTO draft_picks (id, league_key, pick, round, team_key, player_key,
                                     created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ON CONFLICT(league_key, pick) DO UPDATE SET
                round = excluded.round,
                team_key = excluded.team_key,
                player_key = excluded.player_key,
                updated_at = excluded.updated_at
            ",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&pick.league_key)
        .bind(pick.pick)
        .bind(pick.round)
        .bind(&pick.team_key)
        .bind(&pick.player_key)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All teams in a league, ordered by standing
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure
    pub async fn league_teams(&self, league_key: &str) -> AppResult<Vec<Team>> {
        let rows = sqlx::query(
            "SELECT team_key, league_key, name, manager, wins, losses, ties,
                    points_for, points_against, standing, raw_data
             FROM teams WHERE league_key = ?1 ORDER BY standing, team_key",
        )
        .bind(league_key)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Team {
                    team_key: row.try_get("team_key")?,
                    league_key: row.try_get("league_key")?,
                    name: row.try_get("name")?,
                    manager: row.try_get("manager")?,
                    wins: row.try_get("wins")?,
                    losses: row.try_get("losses")?,
                    ties: row.try_get("ties")?,
                    points_for: row.try_get("points_for")?,
                    points_against: row.try_get("points_against")?,
                    standing: row.try_get("standing")?,
                    raw: parse_raw(row.try_get("raw_data")?)?,
                })
            })
            .collect()
    }

    /// All players in a league, ordered by key
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure
    pub async fn league_players(&self, league_key: &str) -> AppResult<Vec<Player>> {
        let rows = sqlx::query(
            "SELECT player_key, league_key, name, position, nhl_team, status, raw_data
             FROM players WHERE league_key = ?1 ORDER BY player_key",
        )
        .bind(league_key)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Player {
                    player_key: row.try_get("player_key")?,
                    league_key: row.try_get("league_key")?,
                    name: row.try_get("name")?,
                    position: row.try_get("position")?,
                    nhl_team: row.try_get("nhl_team")?,
                    status: row.try_get("status")?,
                    raw: parse_raw(row.try_get("raw_data")?)?,
                })
            })
            .collect()
    }

    /// All draft picks in a league, in pick order
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure
    pub async fn league_draft_picks(&self, league_key: &str) -> AppResult<Vec<DraftPick>> {
        let rows = sqlx::query(
            "SELECT league_key, pick, round, team_key, player_key
             FROM draft_picks WHERE league_key = ?1 ORDER BY pick",
        )
        .bind(league_key)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(DraftPick {
                    league_key: row.try_get("league_key")?,
                    pick: row.try_get("pick")?,
                    round: row.try_get("round")?,
                    team_key: row.try_get("team_key")?,
                    player_key: row.try_get("player_key")?,
                })
            })
            .collect()
    }

    /// Count stored rows for one entity type in a league
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure
    pub async fn entity_count(&self, kind: EntityKind, league_key: &str) -> AppResult<i64> {
        let sql = match kind {
            EntityKind::Teams => "SELECT COUNT(*) AS n FROM teams WHERE league_key = ?1",
            EntityKind::Players => "SELECT COUNT(*) AS n FROM players WHERE league_key = ?1",
            EntityKind::DraftPicks => {
                "SELECT COUNT(*) AS n FROM draft_picks WHERE league_key = ?1"
            }
        };
        let row = sqlx::query(sql)
            .bind(league_key)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}

fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Storage(format!("corrupt timestamp: {e}")))
}

fn parse_raw(value: String) -> AppResult<serde_json::Value> {
    serde_json::from_str(&value).map_err(|e| AppError::Storage(format!("corrupt raw_data: {e}")))
}

fn league_from_row(row: &sqlx::sqlite::SqliteRow) -> AppResult<League> {
    let user_id: String = row.try_get("user_id")?;
    Ok(League {
        league_key: row.try_get("league_key")?,
        user_id: Uuid::parse_str(&user_id)
            .map_err(|e| AppError::Storage(format!("corrupt user id: {e}")))?,
        name: row.try_get("name")?,
        season: row.try_get("season")?,
        game_code: row.try_get("game_code")?,
        league_type: row.try_get("league_type")?,
        raw: parse_raw(row.try_get("raw_data")?)?,
    })
}
