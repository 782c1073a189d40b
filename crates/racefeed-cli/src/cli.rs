use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use racefeed_core::{EntityType, ResolveOptions};

/// Command-line arguments for the racefeed binary.
#[derive(Debug, Parser)]
#[command(name = "racefeed", version, about = "Keep a local cache of post-race data feeds up to date")]
pub struct CliArgs {
    /// Optional path to a settings file.
    #[arg(long = "config-file", env = "RACEFEED_CONFIG_FILE", value_name = "PATH", global = true)]
    pub config_file: Option<PathBuf>,

    /// Put every feed's cache directory under this root.
    #[arg(long = "cache-root", value_name = "PATH", global = true)]
    pub cache_root: Option<PathBuf>,

    /// Also write logs to daily-rolling files in this directory.
    #[arg(long = "log-dir", value_name = "PATH", global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run one update cycle and exit.
    Once(OnceArgs),
    /// Run an update cycle now and then on a fixed interval until interrupted.
    Forever(ForeverArgs),
    /// Resolve a single key and print its payload.
    Fetch(FetchArgs),
    /// Show cache entry counts and ages per feed.
    Status,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RequestArg {
    /// Feeds to refresh, comma separated (default: sectionals,points).
    #[arg(long, env = "RACEFEED_REQUEST", value_name = "FEEDS", value_delimiter = ',')]
    pub request: Vec<EntityType>,
}

impl RequestArg {
    pub fn feeds(&self) -> Option<BTreeSet<EntityType>> {
        if self.request.is_empty() {
            None
        } else {
            Some(self.request.iter().copied().collect())
        }
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct CacheFlags {
    /// Ignore cached copies and refetch everything.
    #[arg(long = "new", action = clap::ArgAction::SetTrue)]
    pub force_new: bool,

    /// Use cached data only; never touch the network.
    #[arg(long, action = clap::ArgAction::SetTrue, conflicts_with = "force_new")]
    pub offline: bool,
}

impl CacheFlags {
    pub fn options(&self) -> ResolveOptions {
        ResolveOptions {
            force_new: self.force_new,
            offline: self.offline,
            discard: false,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct OnceArgs {
    /// First race date (default: 14 days ago).
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start: Option<NaiveDate>,

    /// Last race date (default: yesterday).
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub end: Option<NaiveDate>,

    #[command(flatten)]
    pub request: RequestArg,

    #[command(flatten)]
    pub flags: CacheFlags,
}

#[derive(Debug, Args, Clone)]
pub struct ForeverArgs {
    /// Hours between update cycles.
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_hours: u64,

    /// Each cycle covers this many days up to yesterday.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(i64).range(1..))]
    pub lookback_days: i64,

    #[command(flatten)]
    pub request: RequestArg,
}

#[derive(Debug, Args, Clone)]
pub struct FetchArgs {
    /// Feed name, e.g. sectionals, points, racelist, route.
    pub entity: EntityType,

    /// Sharecode, date (YYYY-MM-DD) or venue code, depending on the feed.
    pub key: String,

    #[command(flatten)]
    pub flags: CacheFlags,
}
