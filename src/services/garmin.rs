// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Garmin Connect API client.
//!
//! Handles:
//! - SSO login with account credentials (yields the OAuth1 session token)
//! - OAuth1-signed → OAuth2 exchange (yields the bearer token used on API calls)
//! - Paginated activity listing
//! - Per-activity summary lookup (heart rate, elevation)
//! - Rate limit / auth failure classification for the retry policy

use std::future::Future;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

use crate::config::Config;
use crate::error::{AuthError, RemoteError};
use crate::models::activity::{round2, ActivityRecord};
use crate::models::{OAuth1Token, OAuth2Token, OAuthConsumer};
use crate::services::oauth1::Signer;
use crate::time_utils::parse_start_time;

/// Garmin Connect API client.
#[derive(Clone)]
pub struct GarminClient {
    http: reqwest::Client,
    api_url: String,
    sso_url: String,
    domain: String,
    only_running: bool,
    consumer: Option<OAuthConsumer>,
    consumer_url: String,
}

impl GarminClient {
    /// Create a client for the configured region.
    pub fn new(config: &Config) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("activity-ledger/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RemoteError::from_reqwest)?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            sso_url: config.sso_url.trim_end_matches('/').to_string(),
            domain: config.domain.host().to_string(),
            only_running: config.only_running,
            consumer: config.consumer.clone(),
            consumer_url: config.consumer_url.clone(),
        })
    }

    /// Log in with account credentials.
    ///
    /// The SSO endpoint answers with the OAuth1 session token, or with a
    /// challenge flag when the account needs MFA or is locked.
    pub async fn login(&self, username: &str, password: &str) -> Result<OAuth1Token, AuthError> {
        let url = format!("{}/signin", self.sso_url);

        let response = self
            .http
            .post(&url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;

        let status = response.status().as_u16();
        match status {
            401 | 403 => return Err(AuthError::Rejected),
            423 => return Err(AuthError::AccountLocked),
            _ => {}
        }

        let login: LoginResponse = check_response_json(response).await?;

        if login.mfa_required {
            return Err(AuthError::MfaRequired);
        }
        if login.account_locked {
            return Err(AuthError::AccountLocked);
        }

        match (login.oauth_token, login.oauth_token_secret) {
            (Some(oauth_token), Some(oauth_token_secret)) if !oauth_token.is_empty() => {
                tracing::info!("Garmin SSO login succeeded");
                Ok(OAuth1Token {
                    oauth_token,
                    oauth_token_secret,
                    mfa_token: login.mfa_token,
                    domain: self.domain.clone(),
                })
            }
            _ => Err(AuthError::Rejected),
        }
    }

    /// The configured consumer key pair, or the published one.
    async fn consumer(&self) -> Result<OAuthConsumer, RemoteError> {
        if let Some(consumer) = &self.consumer {
            return Ok(consumer.clone());
        }

        tracing::debug!(url = %self.consumer_url, "Fetching OAuth1 consumer key");
        let response = self
            .http
            .get(&self.consumer_url)
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;
        check_response_json(response).await
    }

    /// Exchange the OAuth1 session token for a fresh OAuth2 bearer token.
    ///
    /// The request is signed with OAuth1 HMAC-SHA1 using the consumer key
    /// and the session token; the body only carries the MFA token, if any.
    pub async fn exchange_oauth1(&self, oauth1: &OAuth1Token) -> Result<OAuth2Token, AuthError> {
        let url = format!("{}/oauth-service/oauth/exchange/user/2.0", self.api_url);
        let consumer = self.consumer().await?;

        let mut form = Vec::new();
        if let Some(mfa) = oauth1.mfa_token.as_deref() {
            form.push(("mfa_token", mfa));
        }

        let authorization = Signer {
            consumer: &consumer,
            token: &oauth1.oauth_token,
            token_secret: &oauth1.oauth_token_secret,
        }
        .authorization("POST", &url, &form)?;

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .form(&form)
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;

        if matches!(response.status().as_u16(), 401 | 403) {
            return Err(AuthError::Rejected);
        }

        let exchanged: ExchangeResponse = check_response_json(response).await?;
        let now = Utc::now();

        let expires_at = expires_after(now, exchanged.expires_in)?;
        let refresh_token_expires_at = match exchanged.refresh_token_expires_in {
            Some(secs) => expires_after(now, secs)?,
            None => 0,
        };

        Ok(OAuth2Token {
            access_token: exchanged.access_token,
            refresh_token: exchanged.refresh_token.unwrap_or_default(),
            token_type: exchanged.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at,
            refresh_token_expires_at,
        })
    }

    /// List activities, newest first.
    ///
    /// Items are returned undecoded so that one malformed entry can be
    /// dropped without losing the page.
    pub async fn list_activities(
        &self,
        authorization: &str,
        start: u32,
        limit: u32,
    ) -> Result<Vec<serde_json::Value>, RemoteError> {
        let url = format!(
            "{}/activitylist-service/activities/search/activities",
            self.api_url
        );

        let mut query = vec![("start", start.to_string()), ("limit", limit.to_string())];
        if self.only_running {
            query.push(("activityType", "running".to_string()));
        }

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .query(&query)
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;

        check_response_json(response).await
    }

    /// Get the summary block for one activity.
    pub async fn get_activity_details(
        &self,
        authorization: &str,
        activity_id: u64,
    ) -> Result<ActivityDetails, RemoteError> {
        let url = format!("{}/activity-service/activity/{}", self.api_url, activity_id);

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;

        let body: ActivityDetailResponse = check_response_json(response).await?;
        Ok(body.summary.into())
    }
}

/// Unix timestamp `secs` seconds after `now`.
fn expires_after(now: DateTime<Utc>, secs: i64) -> Result<i64, RemoteError> {
    TimeDelta::try_seconds(secs)
        .and_then(|delta| now.checked_add_signed(delta))
        .map(|t| t.timestamp())
        .ok_or_else(|| RemoteError::Decode(format!("token lifetime out of range: {}", secs)))
}

/// Check response status and parse the JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, RemoteError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!("Garmin rate limit hit (429)");
            return Err(RemoteError::RateLimited);
        }

        if matches!(status.as_u16(), 401 | 403) {
            return Err(RemoteError::Unauthorized(status.as_u16()));
        }

        return Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| RemoteError::Decode(format!("JSON parse error: {}", e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorized access for the fetcher
// ─────────────────────────────────────────────────────────────────────────────

/// Source of remote activity pages, as seen by the fetcher.
pub trait ActivitySource {
    /// One page of the activity list, newest first.
    fn list_activities(
        &self,
        start: u32,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<serde_json::Value>, RemoteError>> + Send;

    /// Heart rate / elevation summary for one activity.
    fn activity_details(
        &self,
        activity_id: u64,
    ) -> impl Future<Output = Result<ActivityDetails, RemoteError>> + Send;
}

/// A client bound to a valid bearer token.
#[derive(Clone)]
pub struct AuthorizedClient {
    client: GarminClient,
    authorization: String,
}

impl AuthorizedClient {
    pub fn new(client: GarminClient, token: &OAuth2Token) -> Self {
        Self {
            client,
            authorization: token.authorization(),
        }
    }
}

impl ActivitySource for AuthorizedClient {
    async fn list_activities(
        &self,
        start: u32,
        limit: u32,
    ) -> Result<Vec<serde_json::Value>, RemoteError> {
        self.client
            .list_activities(&self.authorization, start, limit)
            .await
    }

    async fn activity_details(&self, activity_id: u64) -> Result<ActivityDetails, RemoteError> {
        self.client
            .get_activity_details(&self.authorization, activity_id)
            .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct LoginResponse {
    oauth_token: Option<String>,
    oauth_token_secret: Option<String>,
    mfa_token: Option<String>,
    #[serde(default)]
    mfa_required: bool,
    #[serde(default)]
    account_locked: bool,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    access_token: String,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: i64,
    refresh_token_expires_in: Option<i64>,
}

/// Activity list entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GarminActivity {
    pub activity_id: Option<u64>,
    pub activity_type: Option<GarminActivityType>,
    pub start_time_local: Option<String>,
    /// Metres
    pub distance: Option<f64>,
    /// Seconds
    pub duration: Option<f64>,
    pub steps: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GarminActivityType {
    pub type_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActivityDetailResponse {
    #[serde(rename = "summaryDTO", default)]
    summary: SummaryDto,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDto {
    #[serde(rename = "averageHR")]
    average_hr: Option<f64>,
    average_heart_rate: Option<f64>,
    total_elevation_gain: Option<f64>,
    elevation_gain: Option<f64>,
}

/// Fields read from an activity's summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityDetails {
    pub heartrate_bpm: Option<f64>,
    pub elevation_gain_m: Option<f64>,
}

impl From<SummaryDto> for ActivityDetails {
    fn from(dto: SummaryDto) -> Self {
        Self {
            heartrate_bpm: dto.average_hr.or(dto.average_heart_rate),
            elevation_gain_m: dto.total_elevation_gain.or(dto.elevation_gain),
        }
    }
}

/// Activity types for which Garmin's step count is meaningful.
const STEP_TYPES: &[&str] = &["running", "walking"];

/// Why a remote entry could not become a record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DropReason {
    #[error("entry is not a valid activity object: {0}")]
    Malformed(String),

    #[error("missing activity type")]
    MissingCategory,

    #[error("missing or unparseable start time {0:?}")]
    BadStartTime(Option<String>),
}

/// A decoded list entry: the record plus the remote id used for enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    pub activity_id: Option<u64>,
    pub record: ActivityRecord,
}

/// Decode one activity list entry into a ledger record.
pub fn parse_activity(value: serde_json::Value) -> Result<RemoteRecord, DropReason> {
    let activity: GarminActivity =
        serde_json::from_value(value).map_err(|e| DropReason::Malformed(e.to_string()))?;

    let type_key = activity
        .activity_type
        .and_then(|t| t.type_key)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or(DropReason::MissingCategory)?;

    let start_time = activity
        .start_time_local
        .as_deref()
        .and_then(parse_start_time)
        .ok_or_else(|| DropReason::BadStartTime(activity.start_time_local.clone()))?;

    let steps = if STEP_TYPES.contains(&type_key.as_str()) {
        activity
            .steps
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(|s| s.round() as u64)
            .unwrap_or(0)
    } else {
        0
    };

    let record = ActivityRecord::new(category_label(&type_key), start_time)
        .with_distance_km(round2(activity.distance.unwrap_or(0.0) / 1000.0))
        .with_duration_min(round2(activity.duration.unwrap_or(0.0) / 60.0))
        .with_steps(steps);

    Ok(RemoteRecord {
        activity_id: activity.activity_id,
        record,
    })
}

/// "trail_running" → "Trail Running"
pub fn category_label(type_key: &str) -> String {
    type_key
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
