//! Listing-Harvester main entry point
//!
//! This is the command-line interface over the harvest engine's control surface.

use anyhow::Context;
use clap::{Parser, Subcommand};
use listing_harvester::config::{load_config_with_hash, Config};
use listing_harvester::harvest::{Command, Response, RunOutcome};
use listing_harvester::session::Session;
use listing_harvester::sink::HttpSink;
use listing_harvester::state::{QuotaSnapshot, Tier};
use listing_harvester::storage::open_store;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Listing-Harvester: a resumable, quota-aware listing extractor
///
/// Walks a paginated result listing page by page, checkpointing progress after
/// every page, and sends the deduplicated records to a remote sink once the run
/// completes.
#[derive(Parser, Debug)]
#[command(name = "listing-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A resumable, quota-aware listing extractor", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "harvest.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Start (or continue) a multi-page run from a listing page
    Run {
        /// First listing page
        #[arg(long)]
        url: String,

        /// Page budget (defaults to the configured value)
        #[arg(long)]
        max_pages: Option<u32>,

        /// Account tier: restricted or unrestricted
        #[arg(long, default_value = "restricted")]
        tier: Tier,

        /// Quota limit for the restricted tier
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Extract a single page and flush immediately
    Page {
        #[arg(long)]
        url: String,

        #[arg(long, default_value = "restricted")]
        tier: Tier,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Resume a persisted run on the page it stopped at
    Resume {
        #[arg(long)]
        url: String,
    },

    /// Retry flushing persisted records
    Flush {
        /// Source context sent with the batch
        #[arg(long)]
        url: Option<String>,
    },

    /// Discard the persisted run and records
    Clear,

    /// Show persisted progress
    Summary,

    /// Show persisted records awaiting a flush
    Results,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e).with_context(|| format!("loading {}", cli.config.display()));
        }
    };

    let (url, command) = build_command(cli.command, &config);

    let responses = match run_command(config, url.as_deref(), command).await {
        Ok(responses) => responses,
        Err(e) => {
            tracing::error!("Command failed: {}", e);
            return Err(e);
        }
    };

    for response in &responses {
        println!("{}", serde_json::to_string_pretty(response)?);
    }

    if let Some(Response::Invocation(report)) = responses.last() {
        if let RunOutcome::FlushFailed { reason } = &report.outcome {
            tracing::warn!("Records kept for retry ({}); run `flush` later", reason);
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_harvester=info,warn"),
            1 => EnvFilter::new("listing_harvester=debug,info"),
            2 => EnvFilter::new("listing_harvester=trace,debug"),
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

/// Maps a CLI action to an engine command and its starting page
fn build_command(action: Action, config: &Config) -> (Option<String>, Command) {
    match action {
        Action::Run {
            url,
            max_pages,
            tier,
            limit,
        } => (
            Some(url),
            Command::StartRun {
                max_pages: max_pages.unwrap_or(config.pagination.default_max_pages),
                tier,
                quota: quota(limit),
            },
        ),
        Action::Page { url, tier, limit } => (
            Some(url),
            Command::ScrapePage {
                tier,
                quota: quota(limit),
            },
        ),
        Action::Resume { url } => (Some(url), Command::Resume),
        Action::Flush { url } => (url, Command::FlushPending),
        Action::Clear => (None, Command::ClearState),
        Action::Summary => (None, Command::GetSummary),
        Action::Results => (None, Command::GetResults),
    }
}

fn quota(limit: Option<usize>) -> QuotaSnapshot {
    QuotaSnapshot { used: None, limit }
}

/// Opens the store and sink and runs `command` through a session
async fn run_command(
    config: Config,
    url: Option<&str>,
    command: Command,
) -> anyhow::Result<Vec<Response>> {
    let store = open_store(Path::new(&config.store.database_path))
        .with_context(|| format!("opening store at {}", config.store.database_path))?;
    tracing::info!("Using store at {}", config.store.database_path);

    let sink = HttpSink::from_config(&config.sink).context("building sink client")?;

    let session = Session::new(config, Arc::new(store), Arc::new(sink))?;
    Ok(session.execute(url, command).await?)
}
