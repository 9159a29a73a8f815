// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Primary credentials are read here but only used when the stored session
//! tokens cannot be refreshed.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::{OAuthConsumer, PrimaryCredentials};

/// Where the Connect app's OAuth1 consumer key pair is published.
pub const DEFAULT_CONSUMER_URL: &str = "https://thegarth.s3.amazonaws.com/oauth_consumer.json";

/// Garmin Connect region; selects the API and SSO hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GarminDomain {
    Com,
    Cn,
}

impl GarminDomain {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "COM" | "" => Ok(GarminDomain::Com),
            "CN" => Ok(GarminDomain::Cn),
            _ => Err(ConfigError::Invalid("GARMIN_DOMAIN", raw.to_string())),
        }
    }

    pub fn host(self) -> &'static str {
        match self {
            GarminDomain::Com => "garmin.com",
            GarminDomain::Cn => "garmin.cn",
        }
    }

    pub fn api_url(self) -> String {
        format!("https://connectapi.{}", self.host())
    }

    pub fn sso_url(self) -> String {
        format!("https://sso.{}/sso", self.host())
    }
}

/// Retry policy for remote calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1 = first retry): base * 2^(attempt-1), capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// CSV ledger location
    pub ledger_path: PathBuf,
    /// Directory holding `oauth1_token.json` / `oauth2_token.json`
    pub token_dir: PathBuf,
    pub domain: GarminDomain,
    /// Connect API base URL (overridable for testing)
    pub api_url: String,
    /// SSO base URL (overridable for testing)
    pub sso_url: String,
    /// Activities requested per page
    pub page_size: u32,
    /// Upper bound on pages per run
    pub max_pages: u32,
    pub retry: RetryPolicy,
    pub http_timeout: Duration,
    /// Restrict the activity list to running
    pub only_running: bool,
    /// Fetch per-activity summaries for heart rate and elevation
    pub fetch_details: bool,
    /// Source of the consumer key pair when none is configured
    pub consumer_url: String,

    // --- Secrets ---
    pub credentials: PrimaryCredentials,
    /// OAuth1 consumer key pair; fetched from `consumer_url` if unset
    pub consumer: Option<OAuthConsumer>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        let domain = GarminDomain::Com;
        Self {
            ledger_path: PathBuf::from("activities.csv"),
            token_dir: PathBuf::from(".garminconnect"),
            domain,
            api_url: domain.api_url(),
            sso_url: domain.sso_url(),
            page_size: 100,
            max_pages: 20,
            retry: RetryPolicy::default(),
            http_timeout: Duration::from_secs(60),
            only_running: false,
            fetch_details: true,
            consumer_url: DEFAULT_CONSUMER_URL.to_string(),
            credentials: PrimaryCredentials::default(),
            consumer: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let domain = GarminDomain::parse(&env::var("GARMIN_DOMAIN").unwrap_or_default())?;
        let defaults = RetryPolicy::default();

        let config = Self {
            ledger_path: env::var("LEDGER_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("activities.csv")),
            token_dir: env::var("GARMINTOKENS")
                .map(|v| expand_home(&v))
                .unwrap_or_else(|_| expand_home("~/.garminconnect")),
            domain,
            api_url: env::var("GARMIN_API_URL").unwrap_or_else(|_| domain.api_url()),
            sso_url: env::var("GARMIN_SSO_URL").unwrap_or_else(|_| domain.sso_url()),
            page_size: parse_var("PAGE_SIZE", 100)?,
            max_pages: parse_var("MAX_PAGES", 20)?,
            retry: RetryPolicy {
                max_attempts: parse_var("FETCH_MAX_ATTEMPTS", defaults.max_attempts)?,
                base_delay: Duration::from_millis(parse_var("FETCH_BACKOFF_MS", 500)?),
                max_delay: Duration::from_millis(parse_var("FETCH_MAX_BACKOFF_MS", 30_000)?),
            },
            http_timeout: Duration::from_secs(parse_var("HTTP_TIMEOUT_SECS", 60)?),
            only_running: parse_bool("ONLY_RUNNING", false)?,
            fetch_details: parse_bool("FETCH_DETAILS", true)?,
            consumer_url: env::var("GARMIN_CONSUMER_URL")
                .unwrap_or_else(|_| DEFAULT_CONSUMER_URL.to_string()),
            credentials: PrimaryCredentials {
                username: env::var("GARMIN_USERNAME")
                    .ok()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty()),
                password: env::var("GARMIN_PASSWORD").ok().filter(|v| !v.is_empty()),
            },
            consumer: consumer_from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the fetch loop degenerate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("PAGE_SIZE", "0".to_string()));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::Invalid("MAX_PAGES", "0".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("FETCH_MAX_ATTEMPTS", "0".to_string()));
        }
        Ok(())
    }
}

/// Both halves of the consumer key pair, or neither.
fn consumer_from_env() -> Result<Option<OAuthConsumer>, ConfigError> {
    let key = env::var("GARMIN_CONSUMER_KEY").ok().filter(|v| !v.is_empty());
    let secret = env::var("GARMIN_CONSUMER_SECRET").ok().filter(|v| !v.is_empty());
    match (key, secret) {
        (Some(consumer_key), Some(consumer_secret)) => Ok(Some(OAuthConsumer {
            consumer_key,
            consumer_secret,
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::Missing("GARMIN_CONSUMER_SECRET")),
        (None, Some(_)) => Err(ConfigError::Missing("GARMIN_CONSUMER_KEY")),
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        _ => Ok(default),
    }
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid(name, raw)),
        },
        Err(_) => Ok(default),
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            None => PathBuf::from(raw),
        },
        None => PathBuf::from(raw),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),

    #[error("{0} must be set together with its pair")]
    Missing(&'static str),
}
