//! racefeed - keeps a local cache of post-race data feeds up to date.
//!
//! `racefeed once` runs one update cycle, `racefeed forever` repeats it on a
//! fixed interval until interrupted.

mod cli;
mod logging;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use racefeed_core::utils::age_display;
use racefeed_core::{
    ConfigError, EntityType, FeedConfig, FeedError, FeedSettings, Payload, RaceFeed,
    ResolveOptions, UpdateRequest, UpdateSummary,
};
use tracing::{error, info};

use cli::{CliArgs, Command, FetchArgs, ForeverArgs, OnceArgs};

// ============================================================================
// Constants
// ============================================================================

/// Exit code when no licence is configured
const EXIT_MISSING_CREDENTIAL: u8 = 2;

/// Exit code for every other failure
const EXIT_FAILURE: u8 = 1;

const SECONDS_PER_HOUR: u64 = 3600;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = CliArgs::parse();

    let _guard = match logging::init(args.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "racefeed failed");
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

async fn run(args: CliArgs) -> Result<()> {
    let config = load_config(&args)?;
    let feed = RaceFeed::new(config).context("Failed to set up feed")?;

    match args.command {
        Command::Once(once) => run_once(&feed, once).await,
        Command::Forever(forever) => run_forever(&feed, forever).await,
        Command::Fetch(fetch) => run_fetch(&feed, fetch).await,
        Command::Status => show_status(&feed),
    }
}

/// Settings file, then environment, then command-line overrides.
fn load_config(args: &CliArgs) -> Result<FeedConfig> {
    let settings = match &args.config_file {
        Some(path) => FeedSettings::load_from(path)?,
        None => FeedSettings::load()?,
    };
    let mut config = FeedConfig::from_sources(settings, |name| std::env::var(name).ok())?;
    if let Some(root) = &args.cache_root {
        for entity in EntityType::ALL {
            config.dirs.insert(entity, root.join(entity.default_dir()));
        }
    }
    Ok(config)
}

fn exit_code_for(e: &anyhow::Error) -> u8 {
    let missing_credential = e.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingCredential)
        ) || matches!(
            cause.downcast_ref::<FeedError>(),
            Some(FeedError::Config(ConfigError::MissingCredential))
        )
    });
    if missing_credential {
        EXIT_MISSING_CREDENTIAL
    } else {
        EXIT_FAILURE
    }
}

async fn run_once(feed: &RaceFeed, args: OnceArgs) -> Result<()> {
    let summary = feed
        .update(UpdateRequest {
            start: args.start,
            end: args.end,
            request: args.request.feeds(),
            filter: None,
            options: args.flags.options(),
        })
        .await;
    print_summary(&summary);
    Ok(())
}

async fn run_forever(feed: &RaceFeed, args: ForeverArgs) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval_hours * SECONDS_PER_HOUR));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(interval_hours = args.interval_hours, lookback_days = args.lookback_days, "Running forever");
    loop {
        // The first tick completes immediately.
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        let today = Utc::now().date_naive();
        let request = UpdateRequest {
            start: Some(today - chrono::Duration::days(args.lookback_days)),
            end: Some(today - chrono::Duration::days(1)),
            request: args.request.feeds(),
            filter: None,
            options: ResolveOptions::default(),
        };
        tokio::select! {
            _ = &mut shutdown => break,
            summary = feed.update(request) => print_summary(&summary),
        }
    }

    info!("Interrupted, shutting down");
    Ok(())
}

async fn run_fetch(feed: &RaceFeed, args: FetchArgs) -> Result<()> {
    let outcome = feed.fetch(args.entity, &args.key, args.flags.options()).await;
    match outcome.payload {
        Some(Payload::Records(value)) => {
            let text = serde_json::to_string_pretty(&value).context("Failed to format payload")?;
            println!("{}", text);
        }
        Some(Payload::Text(text)) => println!("{}", text),
        None => eprintln!("No data available for {} {}", args.entity, outcome.key),
    }
    Ok(())
}

fn show_status(feed: &RaceFeed) -> Result<()> {
    let now = Utc::now();
    println!("{:<20} {:>8}  {}", "FEED", "ENTRIES", "NEWEST");
    for entity in EntityType::ALL {
        let stats = feed
            .store()
            .stats(entity)
            .with_context(|| format!("Failed to read {} cache", entity))?;
        let newest = stats
            .newest
            .map(|at| age_display(at, now))
            .unwrap_or_else(|| "-".to_string());
        println!("{:<20} {:>8}  {}", entity.label(), stats.entries, newest);
    }
    Ok(())
}

fn print_summary(summary: &UpdateSummary) {
    let range = match (summary.start, summary.end) {
        (Some(start), Some(end)) => format!("{} to {}", start, end),
        _ => "-".to_string(),
    };
    println!(
        "{}: {} races listed, {} selected",
        range, summary.races, summary.selected
    );
    for (entity, count) in &summary.available {
        println!("  {:<20} {:>6} available", entity.label(), count);
    }
}
