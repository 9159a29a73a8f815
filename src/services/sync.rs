// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One synchronization run.
//!
//! Handles the core workflow:
//! 1. Read the committed ledger (unreadable rows are logged and skipped)
//! 2. Make sure the session tokens are valid (refresh / log in)
//! 3. Fetch activities newer than the ledger's watermark
//! 4. Merge them in
//! 5. Replace the ledger atomically, only if something was added
//!
//! Every failure happens before step 5, so a failed run changes nothing on disk.

use crate::config::Config;
use crate::error::{RemoteError, Result};
use crate::services::credentials::CredentialStore;
use crate::services::fetcher::{ActivityFetcher, FetchOptions};
use crate::services::garmin::{AuthorizedClient, GarminClient};
use crate::services::ledger::Ledger;
use crate::services::merger;

/// Result of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing new; the ledger was not rewritten
    Unchanged { total: usize },
    /// New records were committed
    Updated { added: usize, total: usize },
}

/// Wires the pipeline components together for one configuration.
pub struct SyncService {
    config: Config,
    client: GarminClient,
    credentials: CredentialStore,
    ledger: Ledger,
}

impl SyncService {
    pub fn new(config: Config) -> std::result::Result<Self, RemoteError> {
        let client = GarminClient::new(&config)?;
        let credentials = CredentialStore::new(config.token_dir.clone(), client.clone());
        let ledger = Ledger::new(config.ledger_path.clone());
        Ok(Self {
            config,
            client,
            credentials,
            ledger,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Run the pipeline once.
    pub async fn run(&self) -> Result<SyncOutcome> {
        tracing::info!(ledger = %self.ledger.path().display(), "Starting sync");

        let contents = self.ledger.read_with_report()?;
        if contents.skipped_rows > 0 {
            tracing::warn!(
                skipped = contents.skipped_rows,
                "Ledger has unreadable rows; they will not be carried into the next write"
            );
        }
        merger::validate(&contents.records)?;
        let watermark = merger::watermark(&contents.records);

        let state = self
            .credentials
            .ensure_valid(&self.config.credentials)
            .await?;

        let source = AuthorizedClient::new(self.client.clone(), &state.oauth2);
        let fetcher = ActivityFetcher::new(source, FetchOptions::from(&self.config));
        let incoming = fetcher.fetch_since(watermark).await?;

        let outcome = merger::merge(contents.records, incoming)?;
        let total = outcome.records.len();

        if outcome.added == 0 {
            tracing::info!(total, "No new records");
            return Ok(SyncOutcome::Unchanged { total });
        }

        self.ledger.replace_all(&outcome.records)?;
        tracing::info!(added = outcome.added, total, "Ledger updated");

        Ok(SyncOutcome::Updated {
            added: outcome.added,
            total,
        })
    }
}
