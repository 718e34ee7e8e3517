//! Debounced symbol search.
//!
//! `SearchFacility::on_query_change` records the query right away and arms a fresh
//! quiet-period deadline, replacing the previous one. Only when a deadline fires
//! without being replaced does the driver thread filter the catalog, so a burst of
//! keystrokes costs exactly one evaluation against the final text.
//!
//! Every call that changes the query (`on_query_change`, `select`, `clear`) bumps
//! `SearchState::generation`. An evaluation only writes its result if the generation
//! it was armed with is still current, so a filter that is already running cannot
//! undo a later selection or clear the loading flag of a newer keystroke.
//!
//! The deadline receiver is created on the caller's thread and handed to the driver,
//! which keeps the quiet period anchored to the keystroke rather than to whenever the
//! driver gets scheduled.
//!
//! Outside clicks arrive through a `ClickBus`. Each facility registers one listener when
//! it is created; the listener is owned by the driver and removed when the facility is
//! dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, never, select, unbounded};
use log::{debug, warn};
use pulse_common::catalog::{Catalog, SearchSuggestion};
use pulse_common::defaults::{SEARCH_QUIET_MS, millis};
use pulse_common::{PulseError, Result};

use crate::clock::TickSource;
use crate::sync::{lock, read, write};

/// Broadcasts "clicked outside" events to registered listeners.
#[derive(Clone, Default)]
pub struct ClickBus {
    listeners: Arc<Mutex<HashMap<u64, Sender<()>>>>,
    next_id: Arc<AtomicU64>,
}

impl ClickBus {
    /// An empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; it is removed again when dropped.
    pub fn listen(&self) -> ClickListener {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = unbounded();
        lock(&self.listeners).insert(id, tx);
        ClickListener {
            id,
            rx,
            bus: self.clone(),
        }
    }

    /// Deliver one outside click to every listener.
    pub fn click(&self) {
        lock(&self.listeners).retain(|_, tx| tx.send(()).is_ok());
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }
}

/// Registration on a `ClickBus`.
pub struct ClickListener {
    id: u64,
    rx: Receiver<()>,
    bus: ClickBus,
}

impl ClickListener {
    /// Channel receiving one message per click.
    pub fn clicks(&self) -> &Receiver<()> {
        &self.rx
    }
}

impl Drop for ClickListener {
    fn drop(&mut self) {
        lock(&self.bus.listeners).remove(&self.id);
    }
}

/// Search settings.
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// How long input must stay unchanged before the catalog is filtered.
    pub quiet: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            quiet: millis(SEARCH_QUIET_MS),
        }
    }
}

/// Observable search state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    /// Text as last typed or selected.
    pub query: String,
    /// Matches from the last evaluation.
    pub suggestions: Vec<SearchSuggestion>,
    /// True between a keystroke and the evaluation it triggers.
    pub loading: bool,
    /// Whether the suggestion panel is shown.
    pub panel_visible: bool,
    /// Number of catalog evaluations applied so far.
    pub evaluations: u64,
    /// Bumped by every query change, selection and clear.
    pub generation: u64,
}

enum Input {
    Query {
        text: String,
        generation: u64,
        deadline: Receiver<Instant>,
    },
    Cancel,
}

/// Debounced search over a symbol catalog.
pub struct SearchFacility {
    state: Arc<RwLock<SearchState>>,
    clock: Arc<dyn TickSource>,
    quiet: Duration,
    input_tx: Option<Sender<Input>>,
    driver: Option<JoinHandle<()>>,
}

impl SearchFacility {
    /// Start a facility over `catalog`, listening for outside clicks on `clicks`.
    pub fn new(catalog: Catalog, clock: Arc<dyn TickSource>, clicks: &ClickBus, config: SearchConfig) -> Self {
        let state = Arc::new(RwLock::new(SearchState::default()));
        let (input_tx, input_rx) = unbounded();
        let listener = clicks.listen();
        let driver_state = Arc::clone(&state);
        let driver = thread::spawn(move || drive(catalog, driver_state, input_rx, listener));
        Self {
            state,
            clock,
            quiet: config.quiet,
            input_tx: Some(input_tx),
            driver: Some(driver),
        }
    }

    /// Record new input text and restart the quiet period.
    pub fn on_query_change(&self, text: &str) -> Result<()> {
        let generation = {
            let mut state = write(&self.state);
            state.query = text.to_string();
            state.loading = true;
            state.generation += 1;
            state.generation
        };
        let deadline = self.clock.after(self.quiet);
        self.send(Input::Query {
            text: text.to_string(),
            generation,
            deadline,
        })
    }

    /// Take a suggestion: the query becomes its symbol and the panel closes.
    pub fn select(&self, suggestion: &SearchSuggestion) -> Result<()> {
        {
            let mut state = write(&self.state);
            state.query = suggestion.symbol.clone();
            state.suggestions.clear();
            state.panel_visible = false;
            state.loading = false;
            state.generation += 1;
        }
        self.send(Input::Cancel)
    }

    /// Empty the query and suggestions and close the panel.
    pub fn clear(&self) -> Result<()> {
        {
            let mut state = write(&self.state);
            state.query.clear();
            state.suggestions.clear();
            state.panel_visible = false;
            state.loading = false;
            state.generation += 1;
        }
        self.send(Input::Cancel)
    }

    /// Show or hide the suggestion panel without touching the query.
    pub fn set_panel_visible(&self, visible: bool) {
        write(&self.state).panel_visible = visible;
    }

    /// Copy of the current state.
    pub fn state(&self) -> SearchState {
        read(&self.state).clone()
    }

    /// Current query text.
    pub fn query(&self) -> String {
        read(&self.state).query.clone()
    }

    /// Current suggestions.
    pub fn suggestions(&self) -> Vec<SearchSuggestion> {
        read(&self.state).suggestions.clone()
    }

    fn send(&self, input: Input) -> Result<()> {
        let tx = self
            .input_tx
            .as_ref()
            .ok_or_else(|| PulseError::ChannelSend("search facility stopped".to_string()))?;
        tx.send(input)
            .map_err(|_| PulseError::ChannelSend("search driver is gone".to_string()))
    }
}

impl Drop for SearchFacility {
    fn drop(&mut self) {
        self.input_tx.take();
        if let Some(driver) = self.driver.take() {
            if driver.join().is_err() {
                warn!("Search driver thread panicked");
            }
        }
    }
}

fn drive(catalog: Catalog, state: Arc<RwLock<SearchState>>, input_rx: Receiver<Input>, listener: ClickListener) {
    let mut pending: Option<Pending> = None;

    loop {
        let deadline = pending
            .as_ref()
            .map(|pending| pending.deadline.clone())
            .unwrap_or_else(never);

        select! {
            recv(input_rx) -> msg => match msg {
                Ok(input) => pending = Pending::from_input(input),
                Err(_) => break,
            },
            recv(deadline) -> _ => {
                // Input queued behind this deadline supersedes it.
                let mut superseded = false;
                for input in input_rx.try_iter() {
                    superseded = true;
                    pending = Pending::from_input(input);
                }
                if superseded {
                    continue;
                }
                if let Some(Pending { text, generation, .. }) = pending.take() {
                    evaluate(&catalog, &state, &text, generation);
                }
            },
            recv(listener.clicks()) -> _ => {
                write(&state).panel_visible = false;
            },
        }
    }
    debug!("Search driver exiting");
}

struct Pending {
    text: String,
    generation: u64,
    deadline: Receiver<Instant>,
}

impl Pending {
    fn from_input(input: Input) -> Option<Self> {
        match input {
            Input::Query {
                text,
                generation,
                deadline,
            } => Some(Pending {
                text,
                generation,
                deadline,
            }),
            Input::Cancel => None,
        }
    }
}

/// Filter the catalog for `query` and publish the result, unless the state has moved
/// past `generation` while filtering.
fn evaluate(catalog: &Catalog, state: &RwLock<SearchState>, query: &str, generation: u64) -> bool {
    let suggestions = catalog.filter(query);
    let mut state = write(state);
    if state.generation != generation {
        debug!("Dropping results for '{}': query changed while filtering", query);
        return false;
    }
    debug!("Search '{}' matched {} symbols", query, suggestions.len());
    state.evaluations += 1;
    state.panel_visible = !query.is_empty();
    state.suggestions = suggestions;
    state.loading = false;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listeners_unregister_on_drop() {
        let bus = ClickBus::new();
        let first = bus.listen();
        let second = bus.listen();
        assert_eq!(bus.listener_count(), 2);
        drop(first);
        assert_eq!(bus.listener_count(), 1);
        bus.click();
        assert!(second.clicks().try_recv().is_ok());
    }

    #[test]
    fn evaluation_of_empty_query_hides_panel() {
        let state = RwLock::new(SearchState {
            panel_visible: true,
            loading: true,
            suggestions: Catalog::demo().filter("A"),
            ..SearchState::default()
        });
        assert!(evaluate(&Catalog::demo(), &state, "", 0));
        let state = state.into_inner().unwrap();
        assert!(state.suggestions.is_empty());
        assert!(!state.panel_visible);
        assert!(!state.loading);
        assert_eq!(state.evaluations, 1);
    }

    #[test]
    fn evaluation_shows_matches() {
        let state = RwLock::new(SearchState::default());
        evaluate(&Catalog::demo(), &state, "tesla", 0);
        let state = state.into_inner().unwrap();
        assert_eq!(state.suggestions.len(), 1);
        assert_eq!(state.suggestions[0].symbol, "TSLA");
        assert!(state.panel_visible);
    }

    #[test]
    fn evaluation_armed_before_a_selection_is_dropped() {
        let state = RwLock::new(SearchState {
            query: "apple".into(),
            loading: true,
            generation: 1,
            ..SearchState::default()
        });
        // a selection lands while "apple" is still being filtered
        {
            let mut state = write(&state);
            state.query = "AAPL".into();
            state.loading = false;
            state.generation += 1;
        }
        assert!(!evaluate(&Catalog::demo(), &state, "apple", 1));
        let state = state.into_inner().unwrap();
        assert_eq!(state.query, "AAPL");
        assert!(state.suggestions.is_empty());
        assert!(!state.panel_visible);
        assert_eq!(state.evaluations, 0);
    }

    #[test]
    fn older_evaluation_keeps_newer_keystroke_loading() {
        let state = RwLock::new(SearchState {
            query: "AAP".into(),
            loading: true,
            generation: 2,
            ..SearchState::default()
        });
        assert!(!evaluate(&Catalog::demo(), &state, "AA", 1));
        assert!(read(&state).loading);
        assert!(evaluate(&Catalog::demo(), &state, "AAP", 2));
        assert!(!read(&state).loading);
    }
}
