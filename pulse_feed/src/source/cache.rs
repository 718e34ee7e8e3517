//! TTL cache in front of another quote source.
//!
//! A fresh entry is served without touching the inner source. Once it expires the
//! inner source is asked again; if that fails, the expired entry is served instead
//! so the consumer keeps seeing the last good quote.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{debug, warn};
use pulse_common::defaults::{CACHE_TTL_MS, millis};
use pulse_common::{PulseError, Quote, Result};

use crate::cancel::CancelToken;
use crate::source::QuoteSource;
use crate::sync::lock;

struct Entry {
    quote: Quote,
    stored_at: Instant,
}

/// Caching decorator for any `QuoteSource`.
pub struct CachedSource<S> {
    inner: S,
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl<S: QuoteSource> CachedSource<S> {
    /// Cache with the default 30 second time-to-live.
    pub fn new(inner: S) -> Self {
        Self::with_ttl(inner, millis(CACHE_TTL_MS))
    }

    /// Cache with an explicit time-to-live.
    pub fn with_ttl(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Drop every cached entry.
    pub fn invalidate(&self) {
        lock(&self.entries).clear();
    }

    fn fresh(&self, key: &str) -> Option<Quote> {
        let entries = lock(&self.entries);
        entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.quote.clone())
    }

    fn stale(&self, key: &str) -> Option<Quote> {
        lock(&self.entries).get(key).map(|entry| entry.quote.clone())
    }
}

impl<S: QuoteSource> QuoteSource for CachedSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fetch(&self, symbol: &str, cancel: &CancelToken) -> Result<Quote> {
        let key = symbol.to_ascii_uppercase();
        if let Some(quote) = self.fresh(&key) {
            debug!("Cache hit for {}", key);
            return Ok(quote);
        }

        match self.inner.fetch(symbol, cancel) {
            Ok(quote) => {
                lock(&self.entries).insert(
                    key,
                    Entry {
                        quote: quote.clone(),
                        stored_at: Instant::now(),
                    },
                );
                Ok(quote)
            }
            Err(PulseError::Cancelled) => Err(PulseError::Cancelled),
            Err(e) => match self.stale(&key) {
                Some(quote) => {
                    warn!("Serving cached quote for {} after source error: {}", key, e);
                    Ok(quote)
                }
                None => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Flaky {
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    impl Flaky {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
            }
        }
    }

    impl QuoteSource for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn fetch(&self, symbol: &str, _cancel: &CancelToken) -> Result<Quote> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failing.load(Ordering::SeqCst) {
                return Err(PulseError::Source("down".into()));
            }
            Ok(Quote::from_previous_close(symbol, call as f64, 1.0, 1.0, 1.0, 1.0, 0, Utc::now()))
        }
    }

    #[test]
    fn fresh_entry_skips_inner_source() {
        let cache = CachedSource::new(Flaky::new());
        let cancel = CancelToken::new();
        let first = cache.fetch("AAPL", &cancel).unwrap();
        let second = cache.fetch("aapl", &cancel).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn expired_entry_refetches() {
        let cache = CachedSource::with_ttl(Flaky::new(), Duration::ZERO);
        let cancel = CancelToken::new();
        cache.fetch("AAPL", &cancel).unwrap();
        let second = cache.fetch("AAPL", &cancel).unwrap();
        assert_eq!(second.price, 2.0);
    }

    #[test]
    fn failure_falls_back_to_stale_entry() {
        let cache = CachedSource::with_ttl(Flaky::new(), Duration::ZERO);
        let cancel = CancelToken::new();
        let good = cache.fetch("AAPL", &cancel).unwrap();
        cache.inner.failing.store(true, Ordering::SeqCst);
        assert_eq!(cache.fetch("AAPL", &cancel).unwrap(), good);
    }

    #[test]
    fn failure_without_entry_propagates() {
        let cache = CachedSource::new(Flaky::new());
        cache.inner.failing.store(true, Ordering::SeqCst);
        let err = cache.fetch("AAPL", &CancelToken::new()).unwrap_err();
        assert!(matches!(err, PulseError::Source(_)));
    }

    #[test]
    fn invalidate_forces_refetch() {
        let cache = CachedSource::new(Flaky::new());
        let cancel = CancelToken::new();
        cache.fetch("AAPL", &cancel).unwrap();
        cache.invalidate();
        cache.fetch("AAPL", &cancel).unwrap();
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
    }
}
