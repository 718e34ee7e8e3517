#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, bounded};
use pulse_common::{PulseError, Quote, Result};
use pulse_feed::{CancelToken, QuoteSource};

pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

pub fn quote(symbol: &str, price: f64, change: f64, change_percent: f64) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        price,
        change,
        change_percent,
        volume: 1_000,
        high: price,
        low: price - change,
        open: price - change,
        timestamp: Utc::now(),
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(ms(5));
    }
    condition()
}

pub enum Reply {
    /// Answer straight away.
    Now(Result<Quote>),
    /// Block until the test releases the gate; ignores cancellation.
    Gated(Receiver<Result<Quote>>),
    /// Block until the fetch is cancelled.
    UntilCancelled,
}

impl Reply {
    pub fn ok(quote: Quote) -> Self {
        Reply::Now(Ok(quote))
    }

    pub fn err(message: &str) -> Self {
        Reply::Now(Err(PulseError::Source(message.to_string())))
    }

    pub fn gated() -> (Self, Sender<Result<Quote>>) {
        let (tx, rx) = bounded(1);
        (Reply::Gated(rx), tx)
    }
}

/// Source answering fetches from a fixed script, in call order.
pub struct ScriptedSource {
    replies: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
    cancelled: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl QuoteSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch(&self, _symbol: &str, cancel: &CancelToken) -> Result<Quote> {
        let reply = self.replies.lock().unwrap().pop_front();
        self.calls.fetch_add(1, Ordering::SeqCst);
        match reply {
            Some(Reply::Now(result)) => result,
            Some(Reply::Gated(gate)) => gate
                .recv_timeout(Duration::from_secs(5))
                .unwrap_or(Err(PulseError::Source("gate never opened".into()))),
            Some(Reply::UntilCancelled) => {
                let _ = cancel.signal().recv();
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                Err(PulseError::Cancelled)
            }
            None => Err(PulseError::Source("script exhausted".into())),
        }
    }
}
