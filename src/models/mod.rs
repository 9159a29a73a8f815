// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod credentials;
pub mod stats;

pub use activity::ActivityRecord;
pub use credentials::{
    CredentialState, OAuth1Token, OAuth2Token, OAuthConsumer, PrimaryCredentials,
};
pub use stats::{CategoryStats, DisplayRow, Summary};
