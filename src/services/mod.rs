// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod aggregator;
pub mod credentials;
pub mod fetcher;
pub mod garmin;
pub mod ledger;
pub mod merger;
pub mod oauth1;
pub mod sync;

pub use credentials::CredentialStore;
pub use fetcher::{ActivityFetcher, FetchOptions};
pub use garmin::{ActivitySource, AuthorizedClient, GarminClient};
pub use ledger::{Ledger, LedgerContents};
pub use merger::MergeOutcome;
pub use sync::{SyncOutcome, SyncService};
