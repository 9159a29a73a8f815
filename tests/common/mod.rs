// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::path::Path;
use std::time::Duration;

use activity_ledger::config::{Config, RetryPolicy};
use activity_ledger::models::{
    CredentialState, OAuth1Token, OAuth2Token, OAuthConsumer, PrimaryCredentials,
};
use activity_ledger::services::{CredentialStore, GarminClient};
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::{json, Value};

#[allow(dead_code)]
pub const ACTIVITY_LIST_PATH: &str = "/activitylist-service/activities/search/activities";
#[allow(dead_code)]
pub const EXCHANGE_PATH: &str = "/oauth-service/oauth/exchange/user/2.0";
#[allow(dead_code)]
pub const SIGNIN_PATH: &str = "/signin";
#[allow(dead_code)]
pub const CONSUMER_PATH: &str = "/oauth_consumer.json";

/// Consumer key configured by `test_config()`.
#[allow(dead_code)]
pub const CONSUMER_KEY: &str = "test-consumer-key";

/// Bearer token value carried by `valid_state()`.
#[allow(dead_code)]
pub const ACCESS_TOKEN: &str = "test-access-token";

/// Config pointing both Garmin hosts at the mock server, with files in `dir`.
#[allow(dead_code)]
pub fn test_config(server_url: &str, dir: &Path) -> Config {
    Config {
        ledger_path: dir.join("activities.csv"),
        token_dir: dir.join("tokens"),
        api_url: server_url.to_string(),
        sso_url: server_url.to_string(),
        page_size: 100,
        max_pages: 5,
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
        http_timeout: Duration::from_secs(5),
        fetch_details: false,
        consumer_url: format!("{}{}", server_url, CONSUMER_PATH),
        credentials: PrimaryCredentials {
            username: Some("runner@example.com".to_string()),
            password: Some("hunter2".to_string()),
        },
        consumer: Some(OAuthConsumer {
            consumer_key: CONSUMER_KEY.to_string(),
            consumer_secret: "test-consumer-secret".to_string(),
        }),
        ..Config::default()
    }
}

/// Token pair whose bearer token expires `expires_in_secs` from now.
#[allow(dead_code)]
pub fn state_expiring_in(expires_in_secs: i64) -> CredentialState {
    CredentialState {
        oauth1: OAuth1Token {
            oauth_token: "session-token".to_string(),
            oauth_token_secret: "session-secret".to_string(),
            mfa_token: None,
            domain: "garmin.com".to_string(),
        },
        oauth2: OAuth2Token {
            access_token: ACCESS_TOKEN.to_string(),
            refresh_token: "test-refresh-token".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: chrono::Utc::now().timestamp() + expires_in_secs,
            refresh_token_expires_at: 0,
        },
    }
}

/// A token pair good for another hour.
#[allow(dead_code)]
pub fn valid_state() -> CredentialState {
    state_expiring_in(3600)
}

/// Write `state` into the configured token directory.
#[allow(dead_code)]
pub fn store_tokens(config: &Config, state: &CredentialState) {
    let client = GarminClient::new(config).expect("client should build");
    CredentialStore::new(config.token_dir.clone(), client)
        .save(state)
        .expect("tokens should save");
}

/// One activity list entry in Garmin's wire shape.
#[allow(dead_code)]
pub fn activity_json(
    id: u64,
    type_key: &str,
    start_local: &str,
    distance_m: f64,
    duration_s: f64,
    steps: u64,
) -> Value {
    json!({
        "activityId": id,
        "activityName": format!("Activity {}", id),
        "activityType": {"typeId": 1, "typeKey": type_key},
        "startTimeLocal": start_local,
        "startTimeGMT": start_local,
        "distance": distance_m,
        "duration": duration_s,
        "steps": steps
    })
}

/// Mock one activity list page at offset `start`.
#[allow(dead_code)]
pub async fn mock_page(server: &mut ServerGuard, start: u32, body: &Value) -> Mock {
    server
        .mock("GET", ACTIVITY_LIST_PATH)
        .match_query(Matcher::UrlEncoded("start".into(), start.to_string()))
        .match_header("authorization", format!("Bearer {}", ACCESS_TOKEN).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await
}

/// Matches an OAuth1 `Authorization` header signed for `token`.
#[allow(dead_code)]
pub fn signed_for(token: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::Regex(r#"^OAuth .*oauth_signature_method="HMAC-SHA1""#.to_string()),
        Matcher::Regex(format!(r#"oauth_token="{}""#, token)),
    ])
}

/// Mock the OAuth1 → OAuth2 exchange returning `access_token`.
#[allow(dead_code)]
pub async fn mock_exchange(server: &mut ServerGuard, access_token: &str) -> Mock {
    server
        .mock("POST", EXCHANGE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "scope": "CONNECT_READ",
                "jti": "abc",
                "access_token": access_token,
                "token_type": "Bearer",
                "refresh_token": "new-refresh-token",
                "expires_in": 3600,
                "refresh_token_expires_in": 7_776_000
            })
            .to_string(),
        )
        .create_async()
        .await
}

/// Load a JSON fixture from `tests/fixtures`.
#[allow(dead_code)]
pub fn fixture(name: &str) -> Value {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    let data = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("fixture {} unreadable: {}", path.display(), e));
    serde_json::from_str(&data).expect("fixture should be valid JSON")
}
