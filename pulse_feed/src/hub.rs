//! Shared per-symbol polling with subscriber fan-out.
//!
//! The first `subscribe` for a symbol starts a poller for it; every later subscriber
//! shares that poller. Each applied quote is forwarded by a dispatcher thread to all
//! subscriber channels, and subscribers whose receiver is gone are pruned on the way.
//! When the last `Subscription` for a symbol is dropped, its poller and dispatcher
//! are shut down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{info, warn};
use pulse_common::defaults::{HUB_INTERVAL_MS, millis};
use pulse_common::symbols::Symbol;
use pulse_common::{Quote, Result};

use crate::poller::{PollSnapshot, Poller, PollingHandle};
use crate::sync::lock;

type Subscribers = Arc<Mutex<HashMap<u64, Sender<Quote>>>>;

/// Hub settings.
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    /// Polling interval applied to every symbol.
    pub interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            interval: millis(HUB_INTERVAL_MS),
        }
    }
}

struct Feed {
    handle: PollingHandle,
    subscribers: Subscribers,
    dispatcher: JoinHandle<()>,
}

impl Feed {
    fn shutdown(self) {
        let Feed { handle, dispatcher, .. } = self;
        // The handle holds the last sender into the dispatcher's channel.
        drop(handle);
        if dispatcher.join().is_err() {
            warn!("Quote dispatcher thread panicked");
        }
    }
}

struct HubInner {
    poller: Poller,
    config: HubConfig,
    feeds: Mutex<HashMap<Symbol, Feed>>,
    next_id: AtomicU64,
}

/// Shared quote subscriptions keyed by symbol.
#[derive(Clone)]
pub struct QuoteHub {
    inner: Arc<HubInner>,
}

impl QuoteHub {
    /// Hub polling through `poller` with the given settings.
    pub fn new(poller: Poller, config: HubConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                poller,
                config,
                feeds: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribe to `symbol`, starting its poller if this is the first subscriber.
    ///
    /// A late subscriber immediately receives the symbol's latest quote, if any.
    pub fn subscribe(&self, symbol: &str) -> Result<Subscription> {
        let symbol: Symbol = symbol.parse()?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = unbounded();

        let mut feeds = lock(&self.inner.feeds);
        match feeds.get(&symbol) {
            Some(feed) => {
                // Held across the read so no dispatched quote slips between the two.
                let mut subscribers = lock(&feed.subscribers);
                if let Some(quote) = feed.handle.quote() {
                    let _ = tx.send(quote);
                }
                subscribers.insert(id, tx);
            }
            None => {
                let subscribers: Subscribers = Arc::new(Mutex::new(HashMap::from([(id, tx)])));
                let (updates_tx, updates_rx) = unbounded::<Quote>();
                let handle = self
                    .inner
                    .poller
                    .clone()
                    .with_updates(updates_tx)
                    .start(symbol.as_str(), self.inner.config.interval)?;
                let dispatcher = spawn_dispatcher(updates_rx, Arc::clone(&subscribers));
                info!("Started shared feed for {}", symbol);
                feeds.insert(
                    symbol.clone(),
                    Feed {
                        handle,
                        subscribers,
                        dispatcher,
                    },
                );
            }
        }

        Ok(Subscription {
            id,
            symbol,
            rx,
            hub: Arc::clone(&self.inner),
        })
    }

    /// Symbols that currently have a running feed, sorted.
    pub fn active_symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = lock(&self.inner.feeds).keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Number of live subscriptions for `symbol`.
    pub fn subscriber_count(&self, symbol: &str) -> usize {
        let Ok(symbol) = symbol.parse::<Symbol>() else { return 0 };
        lock(&self.inner.feeds)
            .get(&symbol)
            .map(|feed| lock(&feed.subscribers).len())
            .unwrap_or(0)
    }

    /// Poller state for `symbol`, if it has a running feed.
    pub fn snapshot(&self, symbol: &str) -> Option<PollSnapshot> {
        let symbol = symbol.parse::<Symbol>().ok()?;
        lock(&self.inner.feeds).get(&symbol).map(|feed| feed.handle.snapshot())
    }
}

impl HubInner {
    fn unsubscribe(&self, symbol: &Symbol, id: u64) {
        let retired = {
            let mut feeds = lock(&self.feeds);
            let Some(feed) = feeds.get(symbol) else { return };
            let remaining = {
                let mut subscribers = lock(&feed.subscribers);
                subscribers.remove(&id);
                subscribers.len()
            };
            if remaining == 0 { feeds.remove(symbol) } else { None }
        };
        // Joined outside the map lock so other symbols are not held up.
        if let Some(feed) = retired {
            feed.shutdown();
            info!("Stopped shared feed for {}: no subscribers left", symbol);
        }
    }
}

impl Drop for HubInner {
    fn drop(&mut self) {
        let feeds: Vec<Feed> = lock(&self.feeds).drain().map(|(_, feed)| feed).collect();
        for feed in feeds {
            feed.shutdown();
        }
    }
}

/// Forward every quote to all subscribers, pruning those whose receiver has been dropped.
///
/// Ends once the poller drops its side of `updates_rx`.
fn spawn_dispatcher(updates_rx: Receiver<Quote>, subscribers: Subscribers) -> JoinHandle<()> {
    thread::spawn(move || {
        for quote in updates_rx.iter() {
            lock(&subscribers).retain(|_, tx| tx.send(quote.clone()).is_ok());
        }
    })
}

/// A live subscription; dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    symbol: Symbol,
    rx: Receiver<Quote>,
    hub: Arc<HubInner>,
}

impl Subscription {
    /// Symbol this subscription follows.
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Channel receiving every applied quote for the symbol.
    pub fn receiver(&self) -> &Receiver<Quote> {
        &self.rx
    }

    /// Explicitly end the subscription.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(&self.symbol, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn quote(price: f64) -> Quote {
        Quote::from_previous_close("AAPL", price, 189.0, 189.0, price, 189.0, 1_000, Utc::now())
    }

    #[test]
    fn dispatcher_prunes_closed_receivers() {
        let subscribers: Subscribers = Arc::new(Mutex::new(HashMap::new()));
        let (kept_tx, kept_rx) = unbounded();
        let (gone_tx, gone_rx) = unbounded();
        lock(&subscribers).insert(0, kept_tx);
        lock(&subscribers).insert(1, gone_tx);
        drop(gone_rx);

        let (updates_tx, updates_rx) = unbounded();
        let dispatcher = spawn_dispatcher(updates_rx, Arc::clone(&subscribers));
        updates_tx.send(quote(190.0)).unwrap();
        updates_tx.send(quote(191.0)).unwrap();
        drop(updates_tx);
        dispatcher.join().unwrap();

        let remaining: Vec<u64> = lock(&subscribers).keys().copied().collect();
        assert_eq!(remaining, vec![0]);
        let prices: Vec<f64> = kept_rx.try_iter().map(|q| q.price).collect();
        assert_eq!(prices, vec![190.0, 191.0]);
    }
}
