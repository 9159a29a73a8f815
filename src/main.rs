// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity-Ledger CLI
//!
//! `sync` pulls new Garmin Connect activities into the CSV ledger;
//! `summary` prints the aggregate view as JSON for the static site.

use std::path::PathBuf;
use std::process::ExitCode;

use activity_ledger::{
    config::Config,
    services::{aggregator, Ledger, SyncOutcome, SyncService},
};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "activity-ledger", version, about = "Sync Garmin activities into a CSV ledger")]
struct Cli {
    /// Ledger CSV path (overrides LEDGER_PATH)
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch new activities and commit them to the ledger (default)
    Sync(SyncArgs),
    /// Print summary statistics and detail rows as JSON
    Summary,
}

#[derive(Args, Default)]
struct SyncArgs {
    /// Session token directory (overrides GARMINTOKENS)
    #[arg(long)]
    token_dir: Option<PathBuf>,

    /// Account username, used only if the session cannot be refreshed
    #[arg(long)]
    username: Option<String>,

    /// Account password, used only if the session cannot be refreshed
    #[arg(long)]
    password: Option<String>,

    /// Maximum pages to request this run
    #[arg(long)]
    max_pages: Option<u32>,

    /// Activities per page
    #[arg(long)]
    page_size: Option<u32>,

    /// Only sync running activities
    #[arg(long)]
    only_running: bool,

    /// Skip per-activity heart rate / elevation lookups
    #[arg(long)]
    no_details: bool,
}

impl SyncArgs {
    fn apply(self, config: &mut Config) {
        if let Some(dir) = self.token_dir {
            config.token_dir = dir;
        }
        if self.username.is_some() {
            config.credentials.username = self.username;
        }
        if self.password.is_some() {
            config.credentials.password = self.password;
        }
        if let Some(max_pages) = self.max_pages {
            config.max_pages = max_pages;
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if self.only_running {
            config.only_running = true;
        }
        if self.no_details {
            config.fetch_details = false;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Some(path) = cli.ledger {
        config.ledger_path = path;
    }

    match cli
        .command
        .unwrap_or_else(|| Command::Sync(SyncArgs::default()))
    {
        Command::Sync(args) => {
            args.apply(&mut config);
            run_sync(config).await
        }
        Command::Summary => match run_summary(&config) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = format!("{:#}", e), "Summary failed");
                ExitCode::FAILURE
            }
        },
    }
}

async fn run_sync(config: Config) -> ExitCode {
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return ExitCode::FAILURE;
    }

    let service = match SyncService::new(config) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize HTTP client");
            return ExitCode::FAILURE;
        }
    };

    match service.run().await {
        Ok(SyncOutcome::Unchanged { total }) => {
            tracing::info!(total, "Sync complete: no new records");
            ExitCode::SUCCESS
        }
        Ok(SyncOutcome::Updated { added, total }) => {
            tracing::info!(
                added,
                total,
                ledger = %service.ledger().path().display(),
                "Sync complete: ledger updated"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Sync failed; ledger left unchanged");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run_summary(config: &Config) -> anyhow::Result<()> {
    let ledger = Ledger::new(config.ledger_path.clone());
    let records = ledger
        .read_all()
        .with_context(|| format!("reading ledger {}", ledger.path().display()))?;

    let view = aggregator::render_view(&records);
    let stdout = std::io::stdout();
    serde_json::to_writer_pretty(stdout.lock(), &view).context("writing summary JSON")?;
    println!();
    Ok(())
}

/// Initialize structured logging on stderr.
///
/// JSON by default; `LOG_FORMAT=pretty` for human-readable output.
fn init_logging() {
    let pretty = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("pretty"))
        .unwrap_or(false);

    let json_layer = (!pretty).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true)
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let pretty_layer = pretty.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("activity_ledger=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(json_layer)
        .with(pretty_layer)
        .init();
}
