//! Pulse Client: a command-line front-end for the live quote feed.
//!
//! It can poll a single symbol, stream a whole watchlist through a shared quote hub,
//! run a debounced symbol search, or fetch one quote with loading/error tracking.
//!
//! Usage example (CLI):
//! ```bash
//! pulse_client watch --symbol TSLA --interval-ms 5000
//! pulse_client stream --path ./watchlist.txt
//! pulse_client search A AA AAP AAPL
//! pulse_client fetch --symbol NVDA --source recorded --dir ./payloads
//! ```
//!
//! The watchlist file should contain symbols separated by commas, spaces, or new lines.
//! The log level follows `PULSE_ENV` (`development` or `production`) unless `--env` or
//! `--verbose` is given; `RUST_LOG` still overrides individual modules.
#![warn(missing_docs)]
mod args;

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::{Receiver, after, select, tick, unbounded};
use log::{LevelFilter, debug, info, warn};
use pulse_common::catalog::Catalog;
use pulse_common::defaults::millis;
use pulse_common::logging::{LogConfig, init_logger};
use pulse_common::notify::LogNotifier;
use pulse_common::symbols::{Symbol, WatchlistParser};
use pulse_common::{PulseError, Quote, Result};
use pulse_feed::source::{CachedSource, MockQuoteSource, RecordedChartSource};
use pulse_feed::{
    AsyncOperation, CancelToken, ClickBus, HubConfig, OperationOptions, Poller, QuoteHub, QuoteSource,
    SearchConfig, SearchFacility, SystemClock,
};

use crate::args::{Args, Command, SourceArgs, SourceKind};

/// How often the print loops wake up to check for Ctrl+C.
const SHUTDOWN_CHECK_MS: u64 = 250;
/// Extra time a search may take past its quiet period before giving up.
const SEARCH_GRACE_MS: u64 = 2_000;

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&log_config(&args));

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down client...");
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| PulseError::Format(format!("Error setting Ctrl+C handler: {}", e)))?;
    }

    match args.command {
        Command::Watch {
            symbol,
            interval_ms,
            source,
        } => watch(build_source(&source), &symbol, millis(interval_ms), &shutdown),
        Command::Stream {
            path,
            interval_ms,
            source,
        } => stream(build_source(&source), &path, millis(interval_ms), &shutdown),
        Command::Search { queries, quiet_ms } => search(&queries, millis(quiet_ms)),
        Command::Fetch { symbol, source } => fetch(build_source(&source), &symbol),
    }
}

fn log_config(args: &Args) -> LogConfig {
    let config = match args.env {
        Some(environment) => LogConfig::for_environment(environment),
        None => LogConfig::from_env(),
    };
    if args.verbose { config.with_level(LevelFilter::Debug) } else { config }
}

fn build_source(args: &SourceArgs) -> Arc<dyn QuoteSource> {
    match args.source {
        SourceKind::Mock => Arc::new(
            MockQuoteSource::new()
                .with_latency(millis(args.latency_ms))
                .with_failure_rate(args.failure_rate),
        ),
        SourceKind::Recorded => {
            let dir = normalize_path(&args.dir);
            info!("Reading recorded chart payloads from {}", dir.display());
            Arc::new(CachedSource::new(RecordedChartSource::new(dir)))
        }
    }
}

/// Poll one symbol and print each applied quote until shutdown.
fn watch(source: Arc<dyn QuoteSource>, symbol: &str, interval: Duration, shutdown: &AtomicBool) -> Result<()> {
    let (updates_tx, updates_rx) = unbounded();
    let poller = Poller::new(source, Arc::new(SystemClock)).with_updates(updates_tx);
    let handle = poller.start(symbol, interval)?;
    info!("Watching {}. Press Ctrl+C to exit.", handle.symbol());

    let mut last_error: Option<String> = None;
    print_until_shutdown(&updates_rx, shutdown, || {
        let snapshot = handle.snapshot();
        if snapshot.last_error != last_error {
            if let Some(e) = &snapshot.last_error {
                warn!("{} disconnected: {}", snapshot.symbol, e);
            }
            last_error = snapshot.last_error;
        }
    })
}

/// Subscribe every symbol of a watchlist file on a shared hub.
fn stream(source: Arc<dyn QuoteSource>, path: &str, interval: Duration, shutdown: &AtomicBool) -> Result<()> {
    let file_path = normalize_path(path);
    if !is_file_exist(&file_path) {
        return Err(PulseError::ParseWatchlist(format!("no such file: {}", file_path.display())));
    }
    let symbols = Symbol::parse_watchlist(BufReader::new(File::open(&file_path)?))?;
    info!("Watchlist: {:?}", symbols);

    let hub = QuoteHub::new(Poller::new(source, Arc::new(SystemClock)), HubConfig { interval });
    let subscriptions = symbols
        .iter()
        .map(|symbol| hub.subscribe(symbol.as_str()))
        .collect::<Result<Vec<_>>>()?;

    // One merged channel so a single loop can print every symbol.
    let (merged_tx, merged_rx) = unbounded::<Quote>();
    for subscription in &subscriptions {
        let rx = subscription.receiver().clone();
        let merged_tx = merged_tx.clone();
        std::thread::spawn(move || {
            for quote in rx.iter() {
                if merged_tx.send(quote).is_err() {
                    break;
                }
            }
        });
    }
    drop(merged_tx);

    info!("Streaming {} symbols. Press Ctrl+C to exit.", hub.active_symbols().len());
    let result = print_until_shutdown(&merged_rx, shutdown, || {
        debug!("Active feeds: {:?}", hub.active_symbols());
    });
    drop(subscriptions);
    result
}

/// Feed each query in as a keystroke and print the final suggestions.
fn search(queries: &[String], quiet: Duration) -> Result<()> {
    let clicks = ClickBus::new();
    let facility = SearchFacility::new(Catalog::demo(), Arc::new(SystemClock), &clicks, SearchConfig { quiet });
    for query in queries {
        facility.on_query_change(query)?;
    }

    let poll = tick(millis(10));
    let give_up = after(quiet + millis(SEARCH_GRACE_MS));
    loop {
        select! {
            recv(poll) -> _ => {
                let state = facility.state();
                if state.evaluations > 0 && !state.loading {
                    let json = serde_json::to_string_pretty(&state.suggestions)?;
                    println!("{}", json);
                    return Ok(());
                }
            },
            recv(give_up) -> _ => {
                return Err(PulseError::ChannelRecv("search did not settle in time".to_string()));
            },
        }
    }
}

/// Fetch one quote with loading/error tracking and print it.
fn fetch(source: Arc<dyn QuoteSource>, symbol: &str) -> Result<()> {
    let symbol: Symbol = symbol.parse()?;
    let options = OperationOptions {
        show_success: true,
        success_message: format!("Fetched {}", symbol),
        error_message: format!("Could not fetch {}", symbol),
        ..OperationOptions::default()
    };
    let operation: AsyncOperation<Quote, String> = AsyncOperation::new(Arc::new(LogNotifier), options);
    let cancel = CancelToken::new();
    let quote = operation
        .execute(|| source.fetch(symbol.as_str(), &cancel).map_err(|e| e.to_string()))
        .map_err(|e| PulseError::Source(e.to_string()))?;
    write_quote(&quote)
}

/// Print quotes from `rx` until Ctrl+C, running `on_idle` whenever the loop wakes
/// without a quote.
fn print_until_shutdown(rx: &Receiver<Quote>, shutdown: &AtomicBool, mut on_idle: impl FnMut()) -> Result<()> {
    let wake = tick(millis(SHUTDOWN_CHECK_MS));
    while !shutdown.load(Ordering::Relaxed) {
        select! {
            recv(rx) -> msg => match msg {
                Ok(quote) => write_quote(&quote)?,
                Err(_) => return Err(PulseError::ChannelRecv("quote feed closed".to_string())),
            },
            recv(wake) -> _ => on_idle(),
        }
    }
    info!("Print loop stopping...");
    Ok(())
}

fn write_quote(quote: &Quote) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(&quote.to_json_bytes()?)?;
    stdout.write_all(b"\n")?;
    Ok(())
}

/// Normalize a CLI-provided path string by trimming whitespace and matching quotes.
///
/// This allows passing Windows paths in quotes without breaking parsing.
fn normalize_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let no_quotes = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    PathBuf::from(no_quotes)
}

/// Returns `true` if the provided path exists and is a regular file.
fn is_file_exist(path: &PathBuf) -> bool {
    path.exists() && path.is_file()
}
