//! Command-line arguments for the Pulse client.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use pulse_common::defaults::{HUB_INTERVAL_MS, POLL_INTERVAL_MS, SEARCH_QUIET_MS};
use pulse_common::logging::Environment;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Deployment environment; overrides `PULSE_ENV` when given.
    #[clap(long, value_enum)]
    pub env: Option<Environment>,

    /// Log at debug level regardless of environment.
    #[clap(long, short)]
    pub verbose: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// What to run.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll one symbol and print every fresh quote until Ctrl+C.
    Watch {
        /// Symbol to poll, e.g. TSLA.
        #[clap(long)]
        symbol: String,

        /// Polling interval in milliseconds.
        #[clap(long, default_value_t = POLL_INTERVAL_MS)]
        interval_ms: u64,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Share one poller per symbol across a watchlist and print fanned-out quotes.
    Stream {
        /// Path to a text file with symbols.
        /// Symbols may be separated by commas, spaces, or new lines.
        #[clap(long)]
        path: String,

        /// Polling interval in milliseconds, applied to every symbol.
        #[clap(long, default_value_t = HUB_INTERVAL_MS)]
        interval_ms: u64,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Type each query in turn and print the suggestions for the last one as JSON.
    Search {
        /// Successive query texts, as if typed one after another.
        #[clap(required = true, num_args = 1..)]
        queries: Vec<String>,

        /// Quiet period in milliseconds.
        #[clap(long, default_value_t = SEARCH_QUIET_MS)]
        quiet_ms: u64,
    },

    /// Fetch one quote and print it as JSON.
    Fetch {
        /// Symbol to fetch.
        #[clap(long)]
        symbol: String,

        #[command(flatten)]
        source: SourceArgs,
    },
}

/// Where quotes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "lower")]
pub enum SourceKind {
    /// Random walk around a reference snapshot.
    Mock,
    /// Chart payloads previously saved to disk as `<SYMBOL>.json`.
    Recorded,
}

/// Quote source selection shared by the subcommands that fetch.
#[derive(Debug, Clone, ClapArgs)]
pub struct SourceArgs {
    /// Quote source.
    #[clap(long, value_enum, default_value_t = SourceKind::Mock)]
    pub source: SourceKind,

    /// Directory with recorded chart payloads (`--source recorded`).
    #[clap(long, default_value = ".")]
    pub dir: String,

    /// Simulated latency of the mock source in milliseconds.
    #[clap(long, default_value_t = 0)]
    pub latency_ms: u64,

    /// Probability in [0, 1] that a mock fetch fails.
    #[clap(long, default_value_t = 0.0)]
    pub failure_rate: f64,
}
