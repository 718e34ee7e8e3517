//! Fixed-interval polling of a single symbol.
//!
//! A `PollingHandle` owns one driver thread that:
//!
//! - fetches immediately on start, then once per tick of the configured interval;
//! - runs every fetch on its own thread, so a slow source never delays the next tick;
//! - tags fetches with increasing sequence numbers and discards any completion that is
//!   older than the last one applied, so overlapping requests cannot roll the quote back;
//! - keeps the last good quote when a fetch fails (stale-while-error), recording the
//!   failure in `PollSnapshot::last_error` instead.
//!
//! Stopping (explicitly, on `reconfigure`, or on drop) cancels the run's `CancelToken`,
//! disconnects the stop channel and joins the driver. Once `stop` returns the snapshot
//! is never written by that run again, whatever its outstanding fetches do.

use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, select, unbounded};
use log::{debug, info, warn};
use pulse_common::symbols::Symbol;
use pulse_common::{PulseError, Quote, Result};

use crate::cancel::CancelToken;
use crate::clock::TickSource;
use crate::source::{QuoteSource, timed_fetch};
use crate::sync::{read, write};

/// Read-only view of a poller's latest state.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSnapshot {
    /// Symbol being polled.
    pub symbol: String,
    /// Last successfully fetched quote, if any.
    pub quote: Option<Quote>,
    /// True until the first fetch of the current symbol completes.
    pub loading: bool,
    /// Whether the most recently applied fetch succeeded.
    pub connected: bool,
    /// When `quote` was last replaced.
    pub last_update: Option<DateTime<Utc>>,
    /// Message of the most recent failure, cleared by the next success.
    pub last_error: Option<String>,
    /// Sequence number of the most recently applied fetch; zero before any.
    pub applied_seq: u64,
}

impl PollSnapshot {
    /// Initial state for `symbol`: loading, nothing fetched yet.
    pub fn loading(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            quote: None,
            loading: true,
            connected: false,
            last_update: None,
            last_error: None,
            applied_seq: 0,
        }
    }

    /// Fold a completed fetch into the snapshot.
    ///
    /// Returns `false` without touching anything when `seq` is not newer than the last
    /// applied fetch.
    pub(crate) fn apply(&mut self, seq: u64, result: &Result<Quote>) -> bool {
        if seq <= self.applied_seq {
            return false;
        }
        self.applied_seq = seq;
        self.loading = false;
        match result {
            Ok(quote) => {
                self.quote = Some(quote.clone());
                self.connected = true;
                self.last_update = Some(Utc::now());
                self.last_error = None;
            }
            Err(e) => {
                self.connected = false;
                self.last_error = Some(e.to_string());
            }
        }
        true
    }
}

/// Factory for polling handles sharing one source and clock.
#[derive(Clone)]
pub struct Poller {
    source: Arc<dyn QuoteSource>,
    clock: Arc<dyn TickSource>,
    updates: Option<Sender<Quote>>,
}

impl Poller {
    /// Poll `source` using timers from `clock`.
    pub fn new(source: Arc<dyn QuoteSource>, clock: Arc<dyn TickSource>) -> Self {
        Self {
            source,
            clock,
            updates: None,
        }
    }

    /// Also push every applied quote into `updates`.
    pub fn with_updates(mut self, updates: Sender<Quote>) -> Self {
        self.updates = Some(updates);
        self
    }

    /// Start polling `symbol` every `interval`.
    pub fn start(&self, symbol: &str, interval: Duration) -> Result<PollingHandle> {
        let symbol = validate(symbol, interval)?;
        let snapshot = Arc::new(RwLock::new(PollSnapshot::loading(symbol.as_str())));
        let run = Run::spawn(self, &symbol, interval, Arc::clone(&snapshot));
        Ok(PollingHandle {
            poller: self.clone(),
            symbol,
            interval,
            snapshot,
            run: Some(run),
        })
    }
}

fn validate(symbol: &str, interval: Duration) -> Result<Symbol> {
    if interval.is_zero() {
        return Err(PulseError::InvalidInterval);
    }
    symbol.parse()
}

/// Live polling of one symbol. Dropping the handle stops it.
pub struct PollingHandle {
    poller: Poller,
    symbol: Symbol,
    interval: Duration,
    snapshot: Arc<RwLock<PollSnapshot>>,
    run: Option<Run>,
}

impl PollingHandle {
    /// Copy of the current state.
    pub fn snapshot(&self) -> PollSnapshot {
        read(&self.snapshot).clone()
    }

    /// Latest quote, if one has been fetched.
    pub fn quote(&self) -> Option<Quote> {
        read(&self.snapshot).quote.clone()
    }

    /// Whether the first fetch is still outstanding.
    pub fn is_loading(&self) -> bool {
        read(&self.snapshot).loading
    }

    /// Symbol being polled.
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Current polling interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the driver is running.
    pub fn is_active(&self) -> bool {
        self.run.is_some()
    }

    /// Switch to another symbol and/or interval.
    ///
    /// The current run is stopped first. A new symbol starts from a loading snapshot;
    /// an interval change alone keeps the displayed quote.
    pub fn reconfigure(&mut self, symbol: &str, interval: Duration) -> Result<()> {
        let symbol = validate(symbol, interval)?;
        self.stop();
        {
            let mut snapshot = write(&self.snapshot);
            if symbol != self.symbol {
                *snapshot = PollSnapshot::loading(symbol.as_str());
            } else {
                // The new run numbers its fetches from one again.
                snapshot.applied_seq = 0;
            }
        }
        self.run = Some(Run::spawn(&self.poller, &symbol, interval, Arc::clone(&self.snapshot)));
        self.symbol = symbol;
        self.interval = interval;
        Ok(())
    }

    /// Stop polling. Idempotent.
    pub fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            run.stop();
            info!("Polling for {} stopped", self.symbol);
        }
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One activation of the driver thread.
struct Run {
    stop_tx: Sender<()>,
    cancel: CancelToken,
    thread: JoinHandle<()>,
}

impl Run {
    fn spawn(poller: &Poller, symbol: &Symbol, interval: Duration, snapshot: Arc<RwLock<PollSnapshot>>) -> Self {
        let (stop_tx, stop_rx) = unbounded::<()>();
        let cancel = CancelToken::new();
        // Created here rather than on the driver so the first tick is due exactly one
        // interval after `start` returns.
        let ticks = poller.clock.ticks(interval);
        let driver = Driver {
            symbol: symbol.to_string(),
            source: Arc::clone(&poller.source),
            updates: poller.updates.clone(),
            snapshot,
            cancel: cancel.clone(),
        };
        info!("Polling {} every {}ms", symbol, interval.as_millis());
        let thread = thread::spawn(move || driver.run(ticks, stop_rx));
        Self { stop_tx, cancel, thread }
    }

    fn stop(self) {
        self.cancel.cancel();
        drop(self.stop_tx);
        if self.thread.join().is_err() {
            warn!("Poller driver thread panicked");
        }
    }
}

struct Driver {
    symbol: String,
    source: Arc<dyn QuoteSource>,
    updates: Option<Sender<Quote>>,
    snapshot: Arc<RwLock<PollSnapshot>>,
    cancel: CancelToken,
}

impl Driver {
    fn run(self, ticks: Receiver<Instant>, stop_rx: Receiver<()>) {
        let (done_tx, done_rx) = unbounded::<(u64, Result<Quote>)>();
        let mut issued = 1;
        self.spawn_fetch(issued, &done_tx);

        loop {
            select! {
                recv(stop_rx) -> _ => break,
                recv(ticks) -> tick => match tick {
                    Ok(_) => {
                        issued += 1;
                        self.spawn_fetch(issued, &done_tx);
                    }
                    Err(_) => break,
                },
                recv(done_rx) -> msg => if let Ok((seq, result)) = msg {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    self.apply(seq, result);
                },
            }
        }
        debug!("Driver for {} exiting after {} fetches", self.symbol, issued);
    }

    fn spawn_fetch(&self, seq: u64, done_tx: &Sender<(u64, Result<Quote>)>) {
        let source = Arc::clone(&self.source);
        let symbol = self.symbol.clone();
        let cancel = self.cancel.clone();
        let done_tx = done_tx.clone();
        thread::spawn(move || {
            if cancel.is_cancelled() {
                return;
            }
            let result = timed_fetch(source.as_ref(), &symbol, &cancel);
            // The driver may already be gone; nobody wants the result then.
            let _ = done_tx.send((seq, result));
        });
    }

    fn apply(&self, seq: u64, result: Result<Quote>) {
        let applied = write(&self.snapshot).apply(seq, &result);
        if !applied {
            debug!("Discarding out-of-order response #{} for {}", seq, self.symbol);
            return;
        }
        match result {
            Ok(quote) => {
                debug!("{} -> {:.2} ({:+.2}%)", self.symbol, quote.price, quote.change_percent);
                if let Some(updates) = &self.updates {
                    let _ = updates.send(quote);
                }
            }
            Err(e) => warn!("Error fetching real-time data for {}: {}", self.symbol, e),
        }
    }
}
