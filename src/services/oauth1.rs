// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth 1.0a request signing (HMAC-SHA1).
//!
//! Garmin only hands out a bearer token in exchange for an OAuth1-signed
//! request made with the Connect app's consumer key.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha1::Sha1;

use crate::error::AuthError;
use crate::models::OAuthConsumer;

type HmacSha1 = Hmac<Sha1>;

/// Signs requests on behalf of one consumer and token.
pub struct Signer<'a> {
    pub consumer: &'a OAuthConsumer,
    pub token: &'a str,
    pub token_secret: &'a str,
}

impl Signer<'_> {
    /// `Authorization` header for a request with a fresh nonce and timestamp.
    ///
    /// `url` must not carry a query string; query and form parameters go in
    /// `params`.
    pub fn authorization(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<String, AuthError> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp();
        self.authorization_with(method, url, params, &nonce, timestamp)
    }

    /// `Authorization` header with a fixed nonce and timestamp.
    pub fn authorization_with(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        nonce: &str,
        timestamp: i64,
    ) -> Result<String, AuthError> {
        let timestamp = timestamp.to_string();
        let mut oauth = vec![
            ("oauth_consumer_key", self.consumer.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp.as_str()),
            ("oauth_token", self.token),
            ("oauth_version", "1.0"),
        ];

        let signature = self.signature(method, url, params, &oauth)?;
        oauth.push(("oauth_signature", signature.as_str()));
        oauth.sort();

        let fields: Vec<String> = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect();
        Ok(format!("OAuth {}", fields.join(", ")))
    }

    fn signature(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        oauth: &[(&str, &str)],
    ) -> Result<String, AuthError> {
        let mut pairs: Vec<(String, String)> = params
            .iter()
            .chain(oauth)
            .map(|(k, v)| (encode(k), encode(v)))
            .collect();
        pairs.sort();
        let normalized = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let base = format!(
            "{}&{}&{}",
            method.to_ascii_uppercase(),
            encode(url),
            encode(&normalized)
        );
        let key = format!(
            "{}&{}",
            encode(&self.consumer.consumer_secret),
            encode(self.token_secret)
        );

        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| AuthError::Signing(format!("HMAC init failed: {}", e)))?;
        mac.update(base.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

/// RFC 3986 percent-encoding: everything but `A-Z a-z 0-9 - . _ ~`.
fn encode(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn twitter_consumer() -> OAuthConsumer {
        OAuthConsumer {
            consumer_key: "xvz1evFS4wEEPTGEFPHBog".to_string(),
            consumer_secret: "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".to_string(),
        }
    }

    #[test]
    fn test_signature_matches_published_example() {
        let consumer = twitter_consumer();
        let signer = Signer {
            consumer: &consumer,
            token: "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb",
            token_secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE",
        };

        let header = signer.authorization_with(
            "post",
            "https://api.twitter.com/1.1/statuses/update.json",
            &[
                ("status", "Hello Ladies + Gentlemen, a signed OAuth request!"),
                ("include_entities", "true"),
            ],
            "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg",
            1318622958,
        )
        .unwrap();

        assert!(header.starts_with("OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\", "));
        assert!(header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(header.contains("oauth_signature_method=\"HMAC-SHA1\""));
        assert!(header.contains("oauth_timestamp=\"1318622958\""));
        assert!(header.ends_with("oauth_version=\"1.0\""));
    }

    #[test]
    fn test_nonce_changes_between_requests() {
        let consumer = twitter_consumer();
        let signer = Signer {
            consumer: &consumer,
            token: "t",
            token_secret: "s",
        };
        let first = signer.authorization("POST", "https://example.com/x", &[]).unwrap();
        let second = signer.authorization("POST", "https://example.com/x", &[]).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_encode_keeps_unreserved() {
        assert_eq!(encode("a-b.c_d~e"), "a-b.c_d~e");
        assert_eq!(encode("a b+c/d"), "a%20b%2Bc%2Fd");
    }
}
