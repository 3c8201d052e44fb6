// ABOUTME: Yahoo Fantasy Sports HTTP client implementing the FantasyApi trait
// ABOUTME: Handles Yahoo's matrix-parameter paging and nested JSON envelopes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rinkside

//! Yahoo Fantasy Sports API client.
//!
//! Paging uses Yahoo's matrix parameters (`;start=N;count=M`) on the
//! collection path segment. Responses arrive wrapped in a deeply nested
//! `fantasy_content` envelope with numeric object keys; the extractor here
//! flattens that into plain item arrays and tolerates the simpler flat
//! shape some endpoints (and test fixtures) use.

use crate::models::EntityKind;
use crate::providers::{CollectionPage, FantasyApi, ProviderError};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Yahoo Fantasy Sports API client
pub struct YahooFantasyClient {
    http: reqwest::Client,
    base_url: String,
}

impl YahooFantasyClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Yahoo path segment for a collection kind
    const fn collection_segment(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Teams => "teams",
            EntityKind::Players => "players",
            EntityKind::DraftPicks => "draftresults",
        }
    }

    async fn get_json(&self, access_token: &str, path: &str) -> Result<Value, ProviderError> {
        let url = format!("{}/{path}?format=json", self.base_url);
        debug!(%url, "Upstream fantasy API request");

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        if status.as_u16() == 401 {
            return Err(ProviderError::Unauthorized);
        }
        if status.is_server_error() {
            return Err(ProviderError::Server {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl FantasyApi for YahooFantasyClient {
    async fn user_leagues(
        &self,
        access_token: &str,
        game_code: Option<&str>,
    ) -> Result<Vec<Value>, ProviderError> {
        let code = game_code.unwrap_or("nhl");
        let path = format!(
            "users;use_login=1/games;game_codes={}/leagues",
            urlencoding::encode(code)
        );
        let body = self.get_json(access_token, &path).await?;
        Ok(extract_leagues(&body))
    }

    async fn league_info(
        &self,
        access_token: &str,
        league_key: &str,
    ) -> Result<Value, ProviderError> {
        let path = format!("league/{}", urlencoding::encode(league_key));
        let body = self.get_json(access_token, &path).await?;
        Ok(extract_league_metadata(&body).unwrap_or(body))
    }

    async fn fetch_collection(
        &self,
        access_token: &str,
        league_key: &str,
        kind: EntityKind,
        start: u32,
        count: u32,
    ) -> Result<CollectionPage, ProviderError> {
        let path = format!(
            "league/{}/{};start={start};count={count}",
            urlencoding::encode(league_key),
            Self::collection_segment(kind)
        );
        let body = self.get_json(access_token, &path).await?;

        let items = extract_collection_items(&body, Self::collection_segment(kind));
        let total = extract_total(&body);
        // A full page means there may be more; Yahoo does not always report
        // totals, so the follow-up fetch returning empty is the terminator
        let has_more = items.len() as u32 == count && count > 0;

        Ok(CollectionPage {
            items,
            has_more,
            total,
        })
    }

    async fn league_transactions(
        &self,
        access_token: &str,
        league_key: &str,
    ) -> Result<Vec<Value>, ProviderError> {
        let path = format!("league/{}/transactions", urlencoding::encode(league_key));
        let body = self.get_json(access_token, &path).await?;
        Ok(extract_collection_items(&body, "transactions"))
    }

    async fn player_stats(
        &self,
        access_token: &str,
        player_key: &str,
    ) -> Result<Value, ProviderError> {
        let path = format!("player/{}/stats", urlencoding::encode(player_key));
        let body = self.get_json(access_token, &path).await?;
        Ok(extract_player_stats(&body).unwrap_or(body))
    }
}

/// Pull item objects out of a Yahoo collection response.
///
/// Accepts either a flat `{"items": [...]}` shape or the real envelope
/// `{"fantasy_content": {"league": [meta, {"teams": {"0": {...}, "count": n}}]}}`.
fn extract_collection_items(body: &Value, segment: &str) -> Vec<Value> {
    if let Some(items) = body.get("items").and_then(Value::as_array) {
        return items.clone();
    }

    let Some(collection) = find_keyed_object(body, segment) else {
        return Vec::new();
    };

    numbered_entries(collection)
        .map(|entry| unwrap_entity(entry, segment))
        .collect()
}

/// League metadata is the first element of the `league` array
fn extract_league_metadata(body: &Value) -> Option<Value> {
    let league = body.get("fantasy_content")?.get("league")?;
    match league {
        Value::Array(parts) => parts.first().cloned(),
        other => Some(other.clone()),
    }
}

/// Leagues from the users/games/leagues envelope, with a flat fallback
fn extract_leagues(body: &Value) -> Vec<Value> {
    if let Some(items) = body.get("leagues").and_then(Value::as_array) {
        return items.clone();
    }
    let Some(collection) = find_keyed_object(body, "leagues") else {
        return Vec::new();
    };
    numbered_entries(collection)
        .map(|entry| unwrap_entity(entry, "leagues"))
        .collect()
}

/// Player stats live under `player_stats` inside the player envelope;
/// merged with the flattened player metadata when present
fn extract_player_stats(body: &Value) -> Option<Value> {
    let player = body.get("fantasy_content")?.get("player")?;
    match player {
        Value::Array(parts) => Some(flatten_parts(parts)),
        other => Some(other.clone()),
    }
}

fn extract_total(body: &Value) -> Option<u32> {
    body.get("total")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

/// Depth-first search for an object under the given key that carries a
/// `count` field (Yahoo's collection marker)
fn find_keyed_object<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            if let Some(candidate) = map.get(key) {
                if candidate.get("count").is_some() {
                    return Some(candidate);
                }
            }
            map.values().find_map(|v| find_keyed_object(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_keyed_object(v, key)),
        _ => None,
    }
}

/// Iterate a collection object's numeric keys ("0", "1", ...) in order
fn numbered_entries(collection: &Value) -> impl Iterator<Item = &Value> {
    let mut indexed: Vec<(u64, &Value)> = collection
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| k.parse::<u64>().ok().map(|i| (i, v)))
                .collect()
        })
        .unwrap_or_default();
    indexed.sort_by_key(|(i, _)| *i);
    indexed.into_iter().map(|(_, v)| v)
}

/// Strip the singular wrapper around an entry: `{"team": [...]}` inside the
/// `teams` collection, and so on. Falls back to the entry itself.
fn unwrap_entity(entry: &Value, segment: &str) -> Value {
    let singular = match segment {
        "teams" => "team",
        "players" => "player",
        "draftresults" => "draft_result",
        "leagues" => "league",
        "transactions" => "transaction",
        other => other,
    };
    match entry.get(singular) {
        Some(Value::Array(parts)) => flatten_parts(parts),
        Some(other) => other.clone(),
        None => entry.clone(),
    }
}

/// Yahoo entities arrive as arrays of partial objects; merge them into one
fn flatten_parts(parts: &[Value]) -> Value {
    let mut merged = serde_json::Map::new();
    for part in parts {
        match part {
            Value::Object(map) => {
                for (k, v) in map {
                    merged.insert(k.clone(), v.clone());
                }
            }
            Value::Array(nested) => {
                if let Value::Object(map) = flatten_parts(nested) {
                    for (k, v) in map {
                        merged.insert(k, v);
                    }
                }
            }
            _ => {}
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_flat_items() {
        let body = json!({"items": [{"team_key": "427.l.1.t.1"}, {"team_key": "427.l.1.t.2"}]});
        let items = extract_collection_items(&body, "teams");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["team_key"], "427.l.1.t.1");
    }

    #[test]
    fn test_extract_nested_envelope() {
        let body = json!({
            "fantasy_content": {
                "league": [
                    {"league_key": "427.l.1", "name": "Puck Norris"},
                    {
                        "teams": {
                            "0": {"team": [[{"team_key": "427.l.1.t.1"}, {"name": "Ice Dogs"}]]},
                            "1": {"team": [[{"team_key": "427.l.1.t.2"}, {"name": "Zamboni"}]]},
                            "count": 2
                        }
                    }
                ]
            }
        });

        let items = extract_collection_items(&body, "teams");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["team_key"], "427.l.1.t.1");
        assert_eq!(items[0]["name"], "Ice Dogs");
        assert_eq!(items[1]["team_key"], "427.l.1.t.2");
    }

    #[test]
    fn test_extract_league_metadata() {
        let body = json!({
            "fantasy_content": {
                "league": [{"league_key": "427.l.1", "name": "Puck Norris"}, {"teams": {}}]
            }
        });
        let meta = extract_league_metadata(&body).unwrap();
        assert_eq!(meta["name"], "Puck Norris");
    }

    #[test]
    fn test_numbered_entries_ordering() {
        let collection = json!({
            "2": {"pick": 3},
            "0": {"pick": 1},
            "1": {"pick": 2},
            "count": 3
        });
        let picks: Vec<i64> = numbered_entries(&collection)
            .map(|v| v["pick"].as_i64().unwrap())
            .collect();
        assert_eq!(picks, vec![1, 2, 3]);
    }

    #[test]
    fn test_extract_transactions_envelope() {
        let body = json!({
            "fantasy_content": {
                "league": [
                    {"league_key": "427.l.1"},
                    {
                        "transactions": {
                            "0": {"transaction": [{"transaction_key": "427.l.1.tr.10", "type": "trade"}]},
                            "1": {"transaction": [{"transaction_key": "427.l.1.tr.9", "type": "add"}]},
                            "count": 2
                        }
                    }
                ]
            }
        });

        let items = extract_collection_items(&body, "transactions");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["transaction_key"], "427.l.1.tr.10");
        assert_eq!(items[1]["type"], "add");
    }

    #[test]
    fn test_extract_player_stats_merges_parts() {
        let body = json!({
            "fantasy_content": {
                "player": [
                    [{"player_key": "427.p.8281"}, {"name": "Connor"}],
                    {"player_stats": {"coverage_type": "season", "stats": [{"stat": {"stat_id": "1", "value": "40"}}]}}
                ]
            }
        });

        let stats = extract_player_stats(&body).unwrap();
        assert_eq!(stats["player_key"], "427.p.8281");
        assert_eq!(stats["player_stats"]["coverage_type"], "season");
    }

    #[test]
    fn test_collection_segment_names() {
        assert_eq!(
            YahooFantasyClient::collection_segment(EntityKind::DraftPicks),
            "draftresults"
        );
    }
}
