//! Shared timing constants used by the feed and the client.
use std::time::Duration;

/// Default polling interval for a single-symbol poller.
pub const POLL_INTERVAL_MS: u64 = 5_000;
/// Default polling interval for symbols served through the quote hub.
pub const HUB_INTERVAL_MS: u64 = 10_000;
/// Quiet period the search facility waits for before filtering.
pub const SEARCH_QUIET_MS: u64 = 300;
/// Time-to-live of a cached quote.
pub const CACHE_TTL_MS: u64 = 30_000;

/// Helper to turn a millisecond constant into a `Duration`.
pub fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}
