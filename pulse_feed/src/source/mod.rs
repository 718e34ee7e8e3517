//! Quote sources: anything that can produce a point-in-time `Quote` for a symbol.
//!
//! - `mock`: random-walk generator seeded with reference prices.
//! - `cache`: TTL cache that also serves stale data when the inner source fails.
//! - `recorded`: chart payloads previously captured from the finance proxy.
use std::sync::Arc;
use std::time::Instant;

use pulse_common::logging::log_api_call;
use pulse_common::{Quote, Result};

use crate::cancel::CancelToken;

pub mod cache;
pub mod mock;
pub mod recorded;

pub use cache::CachedSource;
pub use mock::MockQuoteSource;
pub use recorded::RecordedChartSource;

/// Provider of quote snapshots.
///
/// `fetch` may block; callers run it off their driver thread. Implementations
/// should return `PulseError::Cancelled` promptly once `cancel` fires.
pub trait QuoteSource: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &str;

    /// Fetch the current quote for `symbol`.
    fn fetch(&self, symbol: &str, cancel: &CancelToken) -> Result<Quote>;
}

impl<S: QuoteSource + ?Sized> QuoteSource for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, symbol: &str, cancel: &CancelToken) -> Result<Quote> {
        (**self).fetch(symbol, cancel)
    }
}

/// Call `source` and log the outcome as an API call.
pub fn timed_fetch(source: &dyn QuoteSource, symbol: &str, cancel: &CancelToken) -> Result<Quote> {
    let started = Instant::now();
    let result = source.fetch(symbol, cancel);
    log_api_call(source.name(), symbol, result.is_ok(), started.elapsed());
    result
}
