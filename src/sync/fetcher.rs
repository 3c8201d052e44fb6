// ABOUTME: Paginated upstream fetcher with rate-limit backoff and retry policy
// ABOUTME: Streams pages so callers can commit partial results before a failure
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rinkside

//! Batched pagination over upstream collections.
//!
//! Pages stream out as they arrive, so a failure mid-collection never
//! discards the pages already yielded. Rate limiting (429) gets exponential
//! backoff; transient faults (network, 5xx) get a short linear retry; any
//! other upstream error aborts the stream immediately.

use crate::errors::{AppError, AppResult};
use crate::models::EntityKind;
use crate::providers::{FantasyApi, ProviderError};
use async_stream::try_stream;
use futures_util::Stream;
use serde_json::Value;
use std::env;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

/// Smallest allowed page size
pub const MIN_PAGE_SIZE: u32 = 1;
/// Largest page size Yahoo accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Pagination and retry tuning
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Items requested per page
    pub page_size: u32,
    /// Retries after a 429 before giving up
    pub rate_limit_retries: u32,
    /// First backoff delay after a 429, in milliseconds
    pub initial_backoff_ms: u64,
    /// Backoff ceiling, in milliseconds
    pub max_backoff_ms: u64,
    /// Retries after a transient fault (network, 5xx)
    pub transient_retries: u32,
    /// Base delay between transient retries, in milliseconds
    pub transient_backoff_ms: u64,
    /// Hard cap on items fetched per collection; guards against an
    /// upstream that never stops reporting more pages
    pub max_total_items: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: 25,
            rate_limit_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            transient_retries: 2,
            transient_backoff_ms: 500,
            max_total_items: 10_000,
        }
    }
}

impl FetchConfig {
    /// Load tuning overrides from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            page_size: env_u32("FETCH_PAGE_SIZE", defaults.page_size)
                .clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE),
            rate_limit_retries: env_u32("FETCH_RATE_LIMIT_RETRIES", defaults.rate_limit_retries),
            initial_backoff_ms: env_u64("FETCH_INITIAL_BACKOFF_MS", defaults.initial_backoff_ms),
            max_backoff_ms: env_u64("FETCH_MAX_BACKOFF_MS", defaults.max_backoff_ms),
            transient_retries: env_u32("FETCH_TRANSIENT_RETRIES", defaults.transient_retries),
            transient_backoff_ms: env_u64(
                "FETCH_TRANSIENT_BACKOFF_MS",
                defaults.transient_backoff_ms,
            ),
            max_total_items: env_u32("FETCH_MAX_TOTAL_ITEMS", defaults.max_total_items),
        }
    }

    /// Exponential backoff delay for rate-limit attempt `n` (1-based),
    /// capped at `max_backoff_ms`
    #[must_use]
    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .initial_backoff_ms
            .saturating_mul(1_u64 << (attempt.saturating_sub(1)).min(16));
        Duration::from_millis(exp.min(self.max_backoff_ms))
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// One fetched page, tagged with the offset it was requested at
#[derive(Debug, Clone)]
pub struct Page {
    /// Offset of the first item in this page
    pub offset: u32,
    /// Raw item payloads
    pub items: Vec<Value>,
    /// Whether the upstream reported more items past this page
    pub has_more: bool,
}

/// Stream of pages; errors terminate the stream but pages already yielded
/// remain with the consumer
pub type PageStream<'a> = Pin<Box<dyn Stream<Item = AppResult<Page>> + Send + 'a>>;

/// Stream a league sub-collection page by page.
///
/// The stream ends after an empty page, a page marked final, or once
/// `max_total_items` have been fetched. A short non-empty page does not
/// terminate the walk: the offset advances by the items actually returned
/// and the next page is requested. A page is only yielded after its fetch
/// fully succeeded, so consumers can persist each page as it arrives and
/// keep the partial result if a later page fails.
pub fn fetch_pages<'a>(
    api: &'a dyn FantasyApi,
    access_token: &str,
    league_key: &str,
    kind: EntityKind,
    config: &FetchConfig,
) -> PageStream<'a> {
    let access_token = access_token.to_owned();
    let league_key = league_key.to_owned();
    let config = config.clone();

    Box::pin(try_stream! {
        let mut offset: u32 = 0;

        loop {
            if offset >= config.max_total_items {
                warn!(
                    league_key = %league_key,
                    entity = %kind,
                    offset,
                    "Fetch cap reached, stopping pagination"
                );
                break;
            }
            let count = config.page_size.min(config.max_total_items - offset);

            let page = call_with_retry(&config, || {
                api.fetch_collection(&access_token, &league_key, kind, offset, count)
            })
            .await?;

            let fetched = page.items.len() as u32;
            // An empty page is terminal regardless of what has_more claims;
            // a short non-empty page is not, the upstream may simply have
            // returned fewer items than requested
            let has_more = page.has_more && fetched > 0;

            debug!(
                league_key = %league_key,
                entity = %kind,
                offset,
                fetched,
                has_more,
                "Fetched page"
            );

            if fetched > 0 {
                yield Page {
                    offset,
                    items: page.items,
                    has_more,
                };
            }

            if !has_more {
                break;
            }
            offset += fetched;
        }
    })
}

/// Run a provider call, absorbing rate limits and transient faults per
/// the configured retry policy. Any other provider error maps straight
/// into the application error taxonomy.
pub async fn call_with_retry<T, F, Fut>(config: &FetchConfig, mut call: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    let mut rate_limit_attempts: u32 = 0;
    let mut transient_attempts: u32 = 0;

    loop {
        match call().await {
            Ok(value) => return Ok(value),

            Err(ProviderError::RateLimited { retry_after_secs }) => {
                rate_limit_attempts += 1;
                if rate_limit_attempts > config.rate_limit_retries {
                    warn!(
                        retries = config.rate_limit_retries,
                        "Rate limit retries exhausted"
                    );
                    return Err(AppError::RateLimitExceeded {
                        retries: config.rate_limit_retries,
                    });
                }

                let mut delay = config.rate_limit_delay(rate_limit_attempts);
                if let Some(secs) = retry_after_secs {
                    // Honor the upstream hint when it asks for longer
                    delay = delay.max(Duration::from_secs(secs));
                }
                debug!(
                    attempt = rate_limit_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
            }

            Err(err) if err.is_transient() => {
                transient_attempts += 1;
                if transient_attempts > config.transient_retries {
                    warn!(error = %err, "Transient fault retries exhausted");
                    return Err(AppError::UpstreamUnavailable(err.to_string()));
                }

                let delay = Duration::from_millis(
                    config.transient_backoff_ms * u64::from(transient_attempts),
                );
                debug!(
                    attempt = transient_attempts,
                    error = %err,
                    "Transient fault, retrying"
                );
                tokio::time::sleep(delay).await;
            }

            Err(err) => return Err(err.into()),
        }
    }
}
