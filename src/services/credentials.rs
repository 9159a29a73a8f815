// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persisted Garmin session tokens.
//!
//! Two files live in the token directory: `oauth1_token.json` (long-lived
//! session token from login) and `oauth2_token.json` (short-lived bearer
//! token). This is the only module that writes them.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AuthError;
use crate::fs_utils::write_atomic;
use crate::models::{CredentialState, PrimaryCredentials};
use crate::services::garmin::GarminClient;

pub const OAUTH1_FILE: &str = "oauth1_token.json";
pub const OAUTH2_FILE: &str = "oauth2_token.json";

/// Token files are secrets.
const TOKEN_MODE: u32 = 0o600;

/// Loads, refreshes and saves the session token pair.
#[derive(Clone)]
pub struct CredentialStore {
    dir: PathBuf,
    client: GarminClient,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>, client: GarminClient) -> Self {
        Self {
            dir: dir.into(),
            client,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the stored token pair.
    pub fn load(&self) -> Result<CredentialState, AuthError> {
        Ok(CredentialState {
            oauth1: read_token(&self.dir.join(OAUTH1_FILE))?,
            oauth2: read_token(&self.dir.join(OAUTH2_FILE))?,
        })
    }

    /// Persist the token pair, each file replaced atomically.
    pub fn save(&self, state: &CredentialState) -> Result<(), AuthError> {
        write_token(&self.dir.join(OAUTH1_FILE), &state.oauth1)?;
        write_token(&self.dir.join(OAUTH2_FILE), &state.oauth2)?;
        tracing::debug!(dir = %self.dir.display(), "Session tokens saved");
        Ok(())
    }

    /// Return a usable token pair, refreshing or logging in as needed.
    ///
    /// 1. Stored bearer token still valid (outside the 5 minute margin): use it.
    /// 2. Stored session token present: exchange it for a new bearer token.
    /// 3. Otherwise, or if the exchange is refused: full login with `primary`.
    pub async fn ensure_valid(
        &self,
        primary: &PrimaryCredentials,
    ) -> Result<CredentialState, AuthError> {
        match self.load() {
            Ok(state) if state.is_usable_at(Utc::now()) => {
                tracing::debug!("Stored bearer token still valid");
                return Ok(state);
            }
            Ok(state) => {
                tracing::info!("Bearer token expired, exchanging session token");
                match self.client.exchange_oauth1(&state.oauth1).await {
                    Ok(oauth2) => {
                        let refreshed = CredentialState {
                            oauth1: state.oauth1,
                            oauth2,
                        };
                        self.save(&refreshed)?;
                        tracing::info!("Bearer token refreshed");
                        return Ok(refreshed);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Session token exchange failed, falling back to login");
                    }
                }
            }
            Err(AuthError::MissingTokens(path)) => {
                tracing::info!(path = %path.display(), "No stored session tokens");
            }
            Err(AuthError::Corrupt(reason)) => {
                tracing::warn!(reason = %reason, "Stored session tokens unreadable, logging in again");
            }
            Err(e) => return Err(e),
        }

        self.login(primary).await
    }

    /// Full re-authentication with account credentials.
    async fn login(&self, primary: &PrimaryCredentials) -> Result<CredentialState, AuthError> {
        let username = primary
            .username
            .as_deref()
            .ok_or(AuthError::MissingCredentials("GARMIN_USERNAME"))?;
        let password = primary
            .password
            .as_deref()
            .ok_or(AuthError::MissingCredentials("GARMIN_PASSWORD"))?;

        let oauth1 = self.client.login(username, password).await?;
        let oauth2 = self.client.exchange_oauth1(&oauth1).await?;
        let state = CredentialState { oauth1, oauth2 };

        self.save(&state)?;
        tracing::info!(dir = %self.dir.display(), "Logged in, new session tokens saved");
        Ok(state)
    }
}

fn read_token<T: DeserializeOwned>(path: &Path) -> Result<T, AuthError> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(AuthError::MissingTokens(path.to_path_buf()))
        }
        Err(e) => return Err(AuthError::Io(e)),
    };
    serde_json::from_slice(&data)
        .map_err(|e| AuthError::Corrupt(format!("{}: {}", path.display(), e)))
}

fn write_token<T: Serialize>(path: &Path, token: &T) -> Result<(), AuthError> {
    let json = serde_json::to_vec_pretty(token)
        .map_err(|e| AuthError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    write_atomic(path, &json, Some(TOKEN_MODE))?;
    Ok(())
}
