// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for the sync pipeline.
//!
//! Row-level problems never surface here; they are logged and skipped where
//! they occur. Everything in this module aborts the run before the ledger is
//! written.

use std::path::PathBuf;

/// Failure talking to Garmin Connect.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Garmin rate limit hit (429)")]
    RateLimited,

    #[error("Unauthorized (HTTP {0})")]
    Unauthorized(u16),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::RateLimited | RemoteError::Timeout | RemoteError::Connect(_) => true,
            RemoteError::Status { status, .. } => *status >= 500,
            RemoteError::Unauthorized(_) | RemoteError::Decode(_) => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout
        } else if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else {
            RemoteError::Connect(err.to_string())
        }
    }
}

/// Credentials rejected or refresh impossible.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("No stored session tokens at {0}")]
    MissingTokens(PathBuf),

    #[error("Stored session tokens are unreadable: {0}")]
    Corrupt(String),

    #[error("Full login required but {0} is not set")]
    MissingCredentials(&'static str),

    #[error("Garmin rejected the credentials")]
    Rejected,

    #[error("Garmin requires a multi-factor authentication challenge")]
    MfaRequired,

    #[error("Garmin account is locked")]
    AccountLocked,

    #[error("Authentication request failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("Failed to sign OAuth1 request: {0}")]
    Signing(String),

    #[error("Failed to persist session tokens: {0}")]
    Io(#[from] std::io::Error),
}

/// Fetching new activities failed; nothing from this run is committed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Retries exhausted, or a non-retryable response
    #[error("Fetching page {page} failed after {attempts} attempt(s): {source}")]
    Remote {
        /// Zero-based page index being fetched or enriched
        page: u32,
        attempts: u32,
        #[source]
        source: RemoteError,
    },

    /// Paging stopped short of the activities already in the ledger.
    /// Committing would leave a permanent gap below the new watermark.
    #[error("Reached the {max_pages}-page limit before catching up with the ledger; raise MAX_PAGES")]
    PageLimit { max_pages: u32 },
}

/// The existing ledger is structurally unsound; refuse to build on it.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("Existing ledger has duplicate start time {0}")]
    DuplicateStartTime(String),
}

/// Reading or writing the ledger file.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Ledger I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Ledger schema error: {0}")]
    Schema(String),

    #[error("Ledger CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Top-level error for one pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl SyncError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::Auth(_) => 2,
            SyncError::Fetch(_) => 3,
            SyncError::Merge(_) => 4,
            SyncError::Ledger(_) => 1,
        }
    }
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, SyncError>;
