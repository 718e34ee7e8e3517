//! Random-walk quote generator.
//!
//! Each symbol starts from a reference snapshot (or a random base price for unknown
//! symbols) and then moves by up to ±1% per fetch. The previous close stays fixed, so
//! `change` and `change_percent` are always derived from it and never drift apart.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use log::debug;
use pulse_common::{PulseError, Quote, Result};
use rand::Rng;

use crate::cancel::CancelToken;
use crate::source::QuoteSource;
use crate::sync::lock;

/// Reference price, previous close and volume for well-known symbols.
const REFERENCE: [(&str, f64, f64, u64); 15] = [
    ("AAPL", 189.84, 187.50, 58_400_000),
    ("TSLA", 248.50, 243.20, 112_300_000),
    ("MSFT", 415.26, 412.10, 21_700_000),
    ("GOOGL", 172.63, 171.90, 24_100_000),
    ("AMZN", 186.13, 184.70, 37_900_000),
    ("META", 502.30, 496.80, 14_200_000),
    ("NVDA", 924.79, 905.40, 45_600_000),
    ("NFLX", 628.40, 631.10, 3_100_000),
    ("SPY", 521.18, 519.75, 61_000_000),
    ("QQQ", 443.72, 441.35, 38_400_000),
    ("JPM", 198.45, 197.60, 8_900_000),
    ("JNJ", 152.34, 153.10, 6_700_000),
    ("V", 279.12, 277.95, 5_800_000),
    ("PG", 162.87, 162.20, 5_900_000),
    ("UNH", 492.67, 489.30, 3_400_000),
];

struct Walk {
    quote: Quote,
    previous_close: f64,
    served: bool,
}

/// In-memory quote generator standing in for a real provider.
pub struct MockQuoteSource {
    walks: Mutex<HashMap<String, Walk>>,
    latency: Duration,
    failure_rate: f64,
}

impl MockQuoteSource {
    /// Generator seeded with the reference snapshots, no latency, never failing.
    pub fn new() -> Self {
        let now = Utc::now();
        let walks = REFERENCE
            .iter()
            .map(|(symbol, price, previous_close, volume)| {
                let quote = Quote::from_previous_close(
                    symbol,
                    *price,
                    *previous_close,
                    previous_close * 1.001,
                    price.max(*previous_close) * 1.005,
                    price.min(*previous_close) * 0.995,
                    *volume,
                    now,
                );
                let walk = Walk {
                    quote,
                    previous_close: *previous_close,
                    served: false,
                };
                (symbol.to_string(), walk)
            })
            .collect();
        Self {
            walks: Mutex::new(walks),
            latency: Duration::ZERO,
            failure_rate: 0.0,
        }
    }

    /// Simulate network latency on every fetch. The wait is cut short by cancellation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail this fraction of fetches, clamped to `[0, 1]`.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        self
    }

    /// Move the price by up to ±1% and refresh the derived fields.
    fn step(walk: &mut Walk) {
        let mut rng = rand::rng();
        let drift: f64 = rng.random_range(-0.01..0.01);
        let last = &walk.quote;
        let price = (last.price * (1.0 + drift)).max(0.01);
        walk.quote = Quote::from_previous_close(
            &last.symbol,
            price,
            walk.previous_close,
            last.open,
            last.high.max(price),
            last.low.min(price),
            last.volume + rng.random_range(0..10_000),
            Utc::now(),
        );
    }

    fn seed(symbol: &str) -> Walk {
        let mut rng = rand::rng();
        let base: f64 = rng.random_range(100.0..200.0);
        let previous_close = base * 0.99;
        let quote = Quote::from_previous_close(
            symbol,
            base,
            previous_close,
            previous_close,
            base * 1.02,
            base * 0.98,
            rng.random_range(0..1_000_000),
            Utc::now(),
        );
        Walk {
            quote,
            previous_close,
            served: true,
        }
    }
}

impl Default for MockQuoteSource {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteSource for MockQuoteSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch(&self, symbol: &str, cancel: &CancelToken) -> Result<Quote> {
        if !self.latency.is_zero() {
            cancel.sleep(self.latency)?;
        }
        cancel.check()?;

        if self.failure_rate > 0.0 && rand::rng().random_bool(self.failure_rate) {
            return Err(PulseError::Source(format!("simulated outage for {symbol}")));
        }

        let key = symbol.to_ascii_uppercase();
        let mut walks = lock(&self.walks);
        let quote = match walks.get_mut(&key) {
            Some(walk) => {
                // The reference snapshot itself is the first answer.
                if walk.served {
                    Self::step(walk);
                }
                walk.served = true;
                walk.quote.clone()
            }
            None => {
                debug!("Seeding unknown symbol {} with a random base price", key);
                let walk = Self::seed(&key);
                let quote = walk.quote.clone();
                walks.insert(key, walk);
                quote
            }
        };
        Ok(quote)
    }
}
