// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fetch activities newer than the ledger's watermark.
//!
//! Paging is a bounded state machine: every page passes through
//! `Fetching`, possibly `BackingOff` between attempts, and the run ends in
//! `Done` or `Failed`. Both the page count and the attempts per request are
//! capped.

use std::future::Future;
use std::time::Duration;

use chrono::NaiveDateTime;

use crate::config::{Config, RetryPolicy};
use crate::error::{FetchError, RemoteError};
use crate::models::ActivityRecord;
use crate::services::garmin::{parse_activity, ActivitySource, RemoteRecord};
use crate::time_utils::format_start_time;

/// Paging and retry limits for one fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchOptions {
    pub page_size: u32,
    pub max_pages: u32,
    pub retry: RetryPolicy,
    /// Look up heart rate / elevation per activity
    pub fetch_details: bool,
}

impl From<&Config> for FetchOptions {
    fn from(config: &Config) -> Self {
        Self {
            page_size: config.page_size.max(1),
            max_pages: config.max_pages.max(1),
            retry: config.retry,
            fetch_details: config.fetch_details,
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

enum FetchState {
    Fetching { page: u32, attempt: u32 },
    BackingOff { page: u32, attempt: u32, delay: Duration },
    Done,
    Failed(FetchError),
}

/// What a page told us about the rest of the list.
enum PageOutcome {
    More,
    Exhausted,
}

/// Pulls new activities from a remote source. Never touches the ledger.
pub struct ActivityFetcher<S> {
    source: S,
    options: FetchOptions,
}

impl<S: ActivitySource> ActivityFetcher<S> {
    pub fn new(source: S, options: FetchOptions) -> Self {
        Self { source, options }
    }

    /// Fetch every record strictly newer than `watermark` (all records if `None`).
    pub async fn fetch_since(
        &self,
        watermark: Option<NaiveDateTime>,
    ) -> Result<Vec<ActivityRecord>, FetchError> {
        let mut collected = Vec::new();
        let mut state = FetchState::Fetching {
            page: 0,
            attempt: 1,
        };

        let watermark_label = watermark
            .map(format_start_time)
            .unwrap_or_else(|| "none".to_string());
        tracing::info!(
            watermark = %watermark_label,
            page_size = self.options.page_size,
            max_pages = self.options.max_pages,
            "Fetching activities"
        );

        loop {
            state = match state {
                FetchState::Fetching { page, attempt } => {
                    let start = page.saturating_mul(self.options.page_size);
                    match self
                        .source
                        .list_activities(start, self.options.page_size)
                        .await
                    {
                        Ok(items) => {
                            match self
                                .absorb_page(page, items, watermark, &mut collected)
                                .await
                            {
                                Ok(PageOutcome::Exhausted) => FetchState::Done,
                                Ok(PageOutcome::More) if page + 1 >= self.options.max_pages => {
                                    if watermark.is_some() {
                                        FetchState::Failed(FetchError::PageLimit {
                                            max_pages: self.options.max_pages,
                                        })
                                    } else {
                                        tracing::warn!(
                                            max_pages = self.options.max_pages,
                                            "Page limit reached on initial sync; older history not fetched"
                                        );
                                        FetchState::Done
                                    }
                                }
                                Ok(PageOutcome::More) => FetchState::Fetching {
                                    page: page + 1,
                                    attempt: 1,
                                },
                                Err(e) => FetchState::Failed(e),
                            }
                        }
                        Err(error)
                            if error.is_transient() && attempt < self.options.retry.max_attempts =>
                        {
                            let delay = self.options.retry.delay_for(attempt);
                            tracing::warn!(
                                page,
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %error,
                                "Transient failure fetching activity page, backing off"
                            );
                            FetchState::BackingOff {
                                page,
                                attempt,
                                delay,
                            }
                        }
                        Err(error) => FetchState::Failed(FetchError::Remote {
                            page,
                            attempts: attempt,
                            source: error,
                        }),
                    }
                }
                FetchState::BackingOff {
                    page,
                    attempt,
                    delay,
                } => {
                    tokio::time::sleep(delay).await;
                    FetchState::Fetching {
                        page,
                        attempt: attempt + 1,
                    }
                }
                FetchState::Done => {
                    tracing::info!(count = collected.len(), "Fetched new activities");
                    return Ok(collected);
                }
                FetchState::Failed(error) => {
                    tracing::error!(error = %error, "Activity fetch failed");
                    return Err(error);
                }
            };
        }
    }

    /// Decode one page, keep records newer than the watermark, enrich them.
    async fn absorb_page(
        &self,
        page: u32,
        items: Vec<serde_json::Value>,
        watermark: Option<NaiveDateTime>,
        collected: &mut Vec<ActivityRecord>,
    ) -> Result<PageOutcome, FetchError> {
        if items.is_empty() {
            tracing::debug!(page, "Empty page; no more activities");
            return Ok(PageOutcome::Exhausted);
        }

        let full_page = items.len() >= self.options.page_size as usize;
        let mut reached_watermark = false;

        for item in items {
            let RemoteRecord {
                activity_id,
                mut record,
            } = match parse_activity(item) {
                Ok(parsed) => parsed,
                Err(reason) => {
                    tracing::warn!(page, reason = %reason, "Dropping malformed activity");
                    continue;
                }
            };

            if watermark.is_some_and(|w| record.start_time <= w) {
                reached_watermark = true;
                continue;
            }

            if self.options.fetch_details {
                match activity_id {
                    Some(id) => {
                        let details = self
                            .retrying(page, || self.source.activity_details(id))
                            .await?;
                        record = record
                            .with_heartrate_bpm(details.heartrate_bpm)
                            .with_elevation_gain_m(details.elevation_gain_m);
                    }
                    None => tracing::warn!(
                        start_time = %format_start_time(record.start_time),
                        "Activity has no id; skipping detail lookup"
                    ),
                }
            }

            tracing::debug!(
                page,
                category = %record.category,
                start_time = %format_start_time(record.start_time),
                "New activity"
            );
            collected.push(record);
        }

        if reached_watermark {
            tracing::debug!(page, "Reached already-synced activities");
            Ok(PageOutcome::Exhausted)
        } else if !full_page {
            Ok(PageOutcome::Exhausted)
        } else {
            Ok(PageOutcome::More)
        }
    }

    /// Run a remote call under the retry policy.
    async fn retrying<T, F, Fut>(&self, page: u32, mut call: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let policy = self.options.retry;
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < policy.max_attempts => {
                    let delay = policy.delay_for(attempt);
                    tracing::warn!(
                        page,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient failure fetching activity details, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(FetchError::Remote {
                        page,
                        attempts: attempt,
                        source: error,
                    })
                }
            }
        }
    }
}
