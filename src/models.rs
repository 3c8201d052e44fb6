// ABOUTME: Domain models for users, credentials, and league entities
// ABOUTME: Includes AES-256-GCM credential encryption for at-rest storage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rinkside

//! Core data structures shared across the crate.
//!
//! OAuth credentials are encrypted at rest using AES-256-GCM; each encrypted
//! field carries its own nonce prepended to the ciphertext. League entities
//! are identified by Yahoo-assigned natural keys and keep the raw upstream
//! payload alongside the parsed columns.

use crate::errors::{AppError, AppResult};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Generate a random 32-byte AES-256-GCM key
#[must_use]
pub fn generate_encryption_key() -> [u8; 32] {
    let rng = SystemRandom::new();
    let mut key = [0u8; 32];
    // SystemRandom fill only fails on catastrophic RNG failure
    if rng.fill(&mut key).is_err() {
        unreachable!("system RNG failure");
    }
    key
}

/// Decrypted OAuth credential for upstream API calls
///
/// Never stored in this form; only exists in memory during requests.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Plain text access token
    pub access_token: String,
    /// Plain text refresh token
    pub refresh_token: String,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
    /// Granted scope string
    pub scope: String,
}

impl Credential {
    /// Check if the access token is already expired
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Check if the token should be refreshed given a skew window
    #[must_use]
    pub fn needs_refresh(&self, skew: chrono::Duration) -> bool {
        Utc::now() + skew >= self.expires_at
    }
}

/// Encrypted OAuth credential as stored in SQLite
///
/// Each token is encrypted independently; the 12-byte nonce is prepended to
/// the ciphertext and the whole blob is base64 encoded.
#[derive(Debug, Clone)]
pub struct EncryptedCredential {
    /// Encrypted access token (base64: \[nonce\]\[ciphertext\])
    pub access_token: String,
    /// Encrypted refresh token (base64: \[nonce\]\[ciphertext\])
    pub refresh_token: String,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
    /// Granted scope string (not sensitive, stored in clear)
    pub scope: String,
}

impl EncryptedCredential {
    /// Encrypt a credential for storage
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails or the key is invalid
    pub fn new(credential: &Credential, encryption_key: &[u8]) -> AppResult<Self> {
        Ok(Self {
            access_token: seal(&credential.access_token, encryption_key)?,
            refresh_token: seal(&credential.refresh_token, encryption_key)?,
            expires_at: credential.expires_at,
            scope: credential.scope.clone(),
        })
    }

    /// Decrypt the stored credential
    ///
    /// # Errors
    ///
    /// Returns an error if decryption fails or the key is incorrect
    pub fn decrypt(&self, encryption_key: &[u8]) -> AppResult<Credential> {
        Ok(Credential {
            access_token: open(&self.access_token, encryption_key)?,
            refresh_token: open(&self.refresh_token, encryption_key)?,
            expires_at: self.expires_at,
            scope: self.scope.clone(),
        })
    }
}

fn seal(plaintext: &str, encryption_key: &[u8]) -> AppResult<String> {
    let rng = SystemRandom::new();
    let mut nonce_bytes = [0u8; 12];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| AppError::Storage("credential encryption: rng failure".into()))?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let unbound_key = UnboundKey::new(&AES_256_GCM, encryption_key)
        .map_err(|_| AppError::Storage("credential encryption: invalid key".into()))?;
    let key = LessSafeKey::new(unbound_key);

    let mut data = plaintext.as_bytes().to_vec();
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut data)
        .map_err(|_| AppError::Storage("credential encryption failed".into()))?;

    // Prepend nonce to ciphertext
    let mut combined = nonce_bytes.to_vec();
    combined.extend(data);
    Ok(general_purpose::STANDARD.encode(combined))
}

fn open(encrypted: &str, encryption_key: &[u8]) -> AppResult<String> {
    let combined = general_purpose::STANDARD
        .decode(encrypted)
        .map_err(|e| AppError::Storage(format!("credential decryption: bad base64: {e}")))?;
    if combined.len() < 12 {
        return Err(AppError::Storage(
            "credential decryption: ciphertext too short".into(),
        ));
    }

    let (nonce_bytes, ciphertext) = combined.split_at(12);
    let nonce_array: [u8; 12] = nonce_bytes
        .try_into()
        .map_err(|_| AppError::Storage("credential decryption: bad nonce".into()))?;
    let nonce = Nonce::assume_unique_for_key(nonce_array);

    let unbound_key = UnboundKey::new(&AES_256_GCM, encryption_key)
        .map_err(|_| AppError::Storage("credential decryption: invalid key".into()))?;
    let key = LessSafeKey::new(unbound_key);

    let mut data = ciphertext.to_vec();
    let plaintext = key
        .open_in_place(nonce, Aad::empty(), &mut data)
        .map_err(|_| AppError::Storage("credential decryption failed".into()))?;

    String::from_utf8(plaintext.to_vec())
        .map_err(|e| AppError::Storage(format!("credential decryption: invalid utf8: {e}")))
}

/// Entity types synchronized from the upstream API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Teams,
    Players,
    DraftPicks,
}

impl EntityKind {
    /// All entity types, in sync order
    pub const ALL: [Self; 3] = [Self::Teams, Self::Players, Self::DraftPicks];

    /// Snake-case name used in logs and reports
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Teams => "teams",
            Self::Players => "players",
            Self::DraftPicks => "draft_picks",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fantasy league owned by a user, keyed by Yahoo's league key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct League {
    /// Upstream-assigned league key, e.g. `427.l.12345`
    pub league_key: String,
    /// Internal user that synced this league
    pub user_id: Uuid,
    pub name: String,
    pub season: Option<i64>,
    pub game_code: String,
    pub league_type: Option<String>,
    /// Raw upstream payload
    pub raw: Value,
}

impl League {
    /// Build a league from an upstream payload
    #[must_use]
    pub fn from_upstream(user_id: Uuid, league_key: &str, raw: &Value) -> Self {
        Self {
            league_key: league_key.to_owned(),
            user_id,
            name: str_field(raw, "name").unwrap_or_default(),
            season: int_field(raw, "season"),
            game_code: str_field(raw, "game_code").unwrap_or_else(|| "nhl".into()),
            league_type: str_field(raw, "league_type"),
            raw: raw.clone(),
        }
    }
}

/// Team within a league, keyed by Yahoo's team key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// Upstream-assigned team key, e.g. `427.l.12345.t.3`
    pub team_key: String,
    pub league_key: String,
    pub name: String,
    pub manager: Option<String>,
    pub wins: i64,
    pub losses: i64,
    pub ties: i64,
    pub points_for: f64,
    pub points_against: f64,
    pub standing: Option<i64>,
    /// Raw upstream payload
    pub raw: Value,
}

impl Team {
    /// Build a team from an upstream payload; `None` if the natural key
    /// is missing (such items are never persisted)
    #[must_use]
    pub fn from_upstream(league_key: &str, raw: &Value) -> Option<Self> {
        let team_key = str_field(raw, "team_key")?;
        Some(Self {
            team_key,
            league_key: league_key.to_owned(),
            name: str_field(raw, "name").unwrap_or_default(),
            manager: str_field(raw, "manager"),
            wins: int_field(raw, "wins").unwrap_or(0),
            losses: int_field(raw, "losses").unwrap_or(0),
            ties: int_field(raw, "ties").unwrap_or(0),
            points_for: float_field(raw, "points_for").unwrap_or(0.0),
            points_against: float_field(raw, "points_against").unwrap_or(0.0),
            standing: int_field(raw, "standing"),
            raw: raw.clone(),
        })
    }
}

/// Player within a league, keyed by Yahoo's player key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Upstream-assigned player key, e.g. `427.p.8281`
    pub player_key: String,
    pub league_key: String,
    pub name: String,
    pub position: Option<String>,
    /// NHL team abbreviation
    pub nhl_team: Option<String>,
    /// Availability status (available, injured, ...)
    pub status: Option<String>,
    /// Raw upstream payload
    pub raw: Value,
}

impl Player {
    /// Build a player from an upstream payload; `None` if the natural key
    /// is missing
    #[must_use]
    pub fn from_upstream(league_key: &str, raw: &Value) -> Option<Self> {
        let player_key = str_field(raw, "player_key")?;
        Some(Self {
            player_key,
            league_key: league_key.to_owned(),
            name: str_field(raw, "name").unwrap_or_default(),
            position: str_field(raw, "position"),
            nhl_team: str_field(raw, "editorial_team_abbr").or_else(|| str_field(raw, "team")),
            status: str_field(raw, "status"),
            raw: raw.clone(),
        })
    }
}

/// Draft result, naturally keyed by (league, pick number)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftPick {
    pub league_key: String,
    /// Overall pick number; part of the natural key
    pub pick: i64,
    pub round: Option<i64>,
    pub team_key: Option<String>,
    pub player_key: Option<String>,
}

impl DraftPick {
    /// Build a draft pick from an upstream payload; `None` if the pick
    /// number is missing
    #[must_use]
    pub fn from_upstream(league_key: &str, raw: &Value) -> Option<Self> {
        let pick = int_field(raw, "pick")?;
        Some(Self {
            league_key: league_key.to_owned(),
            pick,
            round: int_field(raw, "round"),
            team_key: str_field(raw, "team_key"),
            player_key: str_field(raw, "player_key"),
        })
    }
}

// Yahoo serializes most numbers as strings; accept both representations.

fn str_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn int_field(value: &Value, key: &str) -> Option<i64> {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

fn float_field(value: &Value, key: &str) -> Option<f64> {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_credential() -> Credential {
        Credential {
            access_token: "access_token_123".into(),
            refresh_token: "refresh_token_456".into(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
            scope: "fspt-r".into(),
        }
    }

    #[test]
    fn test_credential_encryption_roundtrip() {
        let key = generate_encryption_key();
        let credential = sample_credential();

        let encrypted = EncryptedCredential::new(&credential, &key).unwrap();
        assert_ne!(encrypted.access_token, credential.access_token);
        assert_ne!(encrypted.refresh_token, credential.refresh_token);

        let decrypted = encrypted.decrypt(&key).unwrap();
        assert_eq!(decrypted.access_token, credential.access_token);
        assert_eq!(decrypted.refresh_token, credential.refresh_token);
        assert_eq!(decrypted.scope, credential.scope);
    }

    #[test]
    fn test_decryption_with_wrong_key_fails() {
        let key = generate_encryption_key();
        let other_key = generate_encryption_key();
        let credential = sample_credential();

        let encrypted = EncryptedCredential::new(&credential, &key).unwrap();
        assert!(encrypted.decrypt(&other_key).is_err());
    }

    #[test]
    fn test_needs_refresh_within_skew() {
        let mut credential = sample_credential();
        credential.expires_at = Utc::now() + chrono::Duration::minutes(2);

        assert!(!credential.is_expired());
        assert!(credential.needs_refresh(chrono::Duration::minutes(5)));
        assert!(!credential.needs_refresh(chrono::Duration::minutes(1)));
    }

    #[test]
    fn test_team_requires_natural_key() {
        let with_key = json!({"team_key": "427.l.1.t.2", "name": "Ice Dogs", "wins": "7"});
        let team = Team::from_upstream("427.l.1", &with_key).unwrap();
        assert_eq!(team.team_key, "427.l.1.t.2");
        assert_eq!(team.wins, 7);

        let without_key = json!({"name": "No Key"});
        assert!(Team::from_upstream("427.l.1", &without_key).is_none());
    }

    #[test]
    fn test_draft_pick_parses_string_numbers() {
        let raw = json!({"pick": "14", "round": "2", "team_key": "427.l.1.t.3"});
        let pick = DraftPick::from_upstream("427.l.1", &raw).unwrap();
        assert_eq!(pick.pick, 14);
        assert_eq!(pick.round, Some(2));
    }
}
