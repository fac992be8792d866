//! # Listing Sweep
//!
//! Drives a browser through a paginated news listing and appends one JSON
//! record per article to a log, until an article at or before a cutoff date
//! shows up or the listing runs out of pages.
//!
//! ## Usage
//!
//! ```sh
//! listing_sweep --profile sakshi --cutoff "December 31, 2023"
//! ```
//!
//! ## Architecture
//!
//! A single sequential loop:
//! 1. **Load**: open the listing page and wait for article links
//! 2. **Sweep**: extract each unprocessed article, stop at the cutoff
//! 3. **Persist**: append records, rewrite the processed-links store
//! 4. **Page**: click "load more" and repeat, or finish
//!
//! The loop only sees the traits in [`browser`], so the same code runs
//! against Chromium or against saved HTML snapshots.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod browser;
mod cli;
mod config;
mod cutoff;
mod extract;
mod filter;
mod models;
mod pager;
mod store;
mod sweep;
mod utils;

use browser::chromium::ChromiumSession;
use browser::snapshot::SnapshotSession;
use cli::Cli;
use models::SweepSummary;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("listing_sweep starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = config::load_config(&args).await?;

    let result = if args.snapshot.is_empty() {
        let mut session = ChromiumSession::start(&config.browser).await?;
        let result = sweep::run(&mut session, &config).await;
        if let Err(e) = session.shutdown().await {
            error!(error = %e, "Failed to shut down browser");
        }
        result
    } else {
        let mut session = SnapshotSession::from_files(&args.snapshot)
            .await?
            .load_articles(&args.article_snapshot)
            .await?;
        sweep::run(&mut session, &config).await
    };

    let summary: SweepSummary = match result {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "Sweep aborted");
            return Err(e);
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        pages = summary.pages,
        emitted = summary.emitted,
        skipped = summary.skipped,
        outcome = %summary.outcome,
        output = %config.output_path.display(),
        ?elapsed,
        "Scraping completed"
    );

    Ok(())
}
