//! Static symbol catalog used by the search facility.
//!
//! The catalog is pre-deduplicated, so filtering never needs to merge duplicates.

use serde::{Deserialize, Serialize};

/// A single searchable instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSuggestion {
    /// Ticker symbol, e.g. `AAPL`.
    pub symbol: String,
    /// Display name, e.g. `Apple Inc.`.
    pub name: String,
    /// Listing exchange.
    pub exchange: String,
}

impl SearchSuggestion {
    /// Case-insensitive substring match on the symbol or the display name.
    ///
    /// `needle` must already be lower-cased.
    fn matches(&self, needle: &str) -> bool {
        self.symbol.to_lowercase().contains(needle) || self.name.to_lowercase().contains(needle)
    }
}

const DEMO_ENTRIES: [(&str, &str, &str); 15] = [
    ("AAPL", "Apple Inc.", "NASDAQ"),
    ("TSLA", "Tesla, Inc.", "NASDAQ"),
    ("MSFT", "Microsoft Corporation", "NASDAQ"),
    ("GOOGL", "Alphabet Inc.", "NASDAQ"),
    ("AMZN", "Amazon.com, Inc.", "NASDAQ"),
    ("META", "Meta Platforms, Inc.", "NASDAQ"),
    ("NVDA", "NVIDIA Corporation", "NASDAQ"),
    ("NFLX", "Netflix, Inc.", "NASDAQ"),
    ("SPY", "SPDR S&P 500 ETF Trust", "NYSE"),
    ("QQQ", "Invesco QQQ Trust", "NASDAQ"),
    ("JPM", "JPMorgan Chase & Co.", "NYSE"),
    ("JNJ", "Johnson & Johnson", "NYSE"),
    ("V", "Visa Inc.", "NYSE"),
    ("PG", "Procter & Gamble Co.", "NYSE"),
    ("UNH", "UnitedHealth Group Inc.", "NYSE"),
];

/// Immutable list of searchable instruments.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<SearchSuggestion>,
}

impl Catalog {
    /// Build a catalog from arbitrary entries.
    pub fn new(entries: Vec<SearchSuggestion>) -> Self {
        Self { entries }
    }

    /// The fixed demo catalog shipped with the dashboard.
    pub fn demo() -> Self {
        let entries = DEMO_ENTRIES
            .iter()
            .map(|(symbol, name, exchange)| SearchSuggestion {
                symbol: symbol.to_string(),
                name: name.to_string(),
                exchange: exchange.to_string(),
            })
            .collect();
        Self { entries }
    }

    /// All entries in catalog order.
    pub fn entries(&self) -> &[SearchSuggestion] {
        &self.entries
    }

    /// Look up an entry by exact symbol.
    pub fn get(&self, symbol: &str) -> Option<&SearchSuggestion> {
        self.entries.iter().find(|e| e.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Entries whose symbol or name contains `query`, ignoring case.
    ///
    /// An empty query matches nothing.
    pub fn filter(&self, query: &str) -> Vec<SearchSuggestion> {
        if query.is_empty() {
            return Vec::new();
        }
        let needle = query.to_lowercase();
        self.entries
            .iter()
            .filter(|entry| entry.matches(&needle))
            .cloned()
            .collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::demo()
    }
}
