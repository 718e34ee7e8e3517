//! Symbol validation and watchlist parsing shared by the feed and the client.

use std::collections::HashSet;
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PulseError;

/// Longest symbol accepted, long enough for class shares and index tickers.
const MAX_SYMBOL_LEN: usize = 12;

/// A validated, upper-cased instrument symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Borrow the symbol text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Symbol {
    type Err = PulseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PulseError::Format("empty symbol".to_string()));
        }
        if trimmed.len() > MAX_SYMBOL_LEN {
            return Err(PulseError::Format(format!("symbol too long: {trimmed}")));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '^')
        {
            return Err(PulseError::Format(format!("invalid symbol: {trimmed}")));
        }
        Ok(Symbol(trimmed.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for Symbol {
    type Error = PulseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait providing watchlist parsing for symbols.
pub trait WatchlistParser: Sized {
    /// Parses symbols from a buffered reader.
    ///
    /// Symbols may be separated by commas, whitespace or new lines. Duplicates are
    /// dropped while preserving first-seen order. Returns an error if any entry is
    /// not a valid symbol.
    fn parse_watchlist<R: BufRead>(reader: R) -> Result<Vec<Self>, PulseError>;
}

impl WatchlistParser for Symbol {
    fn parse_watchlist<R: BufRead>(reader: R) -> Result<Vec<Self>, PulseError> {
        let mut symbols = Vec::new();
        let mut seen = HashSet::new();

        for line_result in reader.lines() {
            let line = line_result?;
            let entries = line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|entry| !entry.is_empty());

            for entry in entries {
                let symbol = entry
                    .parse::<Symbol>()
                    .map_err(|e| PulseError::ParseWatchlist(e.to_string()))?;
                if seen.insert(symbol.clone()) {
                    symbols.push(symbol);
                }
            }
        }
        Ok(symbols)
    }
}
