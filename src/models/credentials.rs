// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Session token pair issued by Garmin Connect after login.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Long-lived session token returned by the SSO login.
///
/// Persisted as `oauth1_token.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuth1Token {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa_token: Option<String>,
    /// "garmin.com" or "garmin.cn"
    #[serde(default)]
    pub domain: String,
}

/// Short-lived bearer token used on API calls.
///
/// Persisted as `oauth2_token.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuth2Token {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Unix timestamp (seconds)
    pub expires_at: i64,
    /// Unix timestamp (seconds); 0 if unknown
    #[serde(default)]
    pub refresh_token_expires_at: i64,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuth2Token {
    /// Whether the bearer token is expired or will expire within the margin.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
        match DateTime::from_timestamp(self.expires_at, 0) {
            Some(expires_at) => now + margin >= expires_at,
            None => true,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// The persisted two-phase session state.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialState {
    pub oauth1: OAuth1Token,
    pub oauth2: OAuth2Token,
}

impl CredentialState {
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.oauth2.access_token.is_empty() && !self.oauth2.is_expired_at(now)
    }
}

/// Username/password supplied out-of-band for full re-authentication.
#[derive(Clone, Default)]
pub struct PrimaryCredentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for PrimaryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryCredentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Consumer key pair of the Connect app, used to sign the token exchange.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthConsumer {
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl std::fmt::Debug for OAuthConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConsumer")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .finish()
    }
}
