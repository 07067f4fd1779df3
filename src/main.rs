//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the Catalog-Harvest crawler.

use anyhow::Context;
use catalog_harvest::config::{load_config_with_hash, Config};
use catalog_harvest::crawler::{check_links, harvest};
use catalog_harvest::output::{print_liveness, print_statistics, print_summary};
use catalog_harvest::render::build_http_client;
use catalog_harvest::storage::{open_store, RecordStore};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: an incremental catalog crawler
///
/// Catalog-Harvest walks the listing pages of each configured source, fetches
/// detail pages only for new or incomplete items, categorizes them by
/// keyword, and upserts them into the configured store.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version = "1.0.0")]
#[command(about = "An incremental catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log records instead of writing them to the store
    #[arg(long)]
    dry_run: bool,

    /// Show statistics from the store and exit
    #[arg(long, conflicts_with_all = ["dry_run", "check_links"])]
    stats: bool,

    /// Check the oldest active records and deactivate those that are gone
    #[arg(long, conflicts_with = "stats")]
    check_links: bool,

    /// Number of records checked by --check-links
    #[arg(long, default_value_t = 100, requires = "check_links")]
    limit: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let store = open_store(&config.storage, cli.dry_run).context("failed to open store")?;

    if cli.stats {
        handle_stats(store.as_ref()).await
    } else if cli.check_links {
        handle_check_links(&config, store.as_ref(), cli.limit).await
    } else {
        handle_harvest(config, config_hash, store).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --stats mode: shows statistics from the store
async fn handle_stats(store: &dyn RecordStore) -> anyhow::Result<()> {
    let stats = store
        .stats()
        .await
        .with_context(|| format!("{} store cannot report statistics", store.name()))?;
    print_statistics(&stats);
    Ok(())
}

/// Handles the --check-links mode: deactivates records whose page is gone
async fn handle_check_links(
    config: &Config,
    store: &dyn RecordStore,
    limit: usize,
) -> anyhow::Result<()> {
    let client = build_http_client(&config.render.user_agent)?;
    let concurrency = config.crawler.detail_concurrency as usize;
    let timeout = config.crawler.navigation_timeout();
    let report = check_links(&client, store, limit, concurrency, timeout).await?;
    print_liveness(&report);
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    config_hash: String,
    store: Arc<dyn RecordStore>,
) -> anyhow::Result<()> {
    tracing::info!(
        "Sources: {}, max pages: {}, detail concurrency: {}",
        config.sources.len(),
        config.crawler.max_pages,
        config.crawler.detail_concurrency
    );

    let summary = harvest(config, config_hash, store).await?;
    print_summary(&summary);

    if !summary.is_clean() {
        tracing::warn!("Harvest finished with contained failures; see the summary above");
    }
    Ok(())
}
