//! Quote data model and JSON encoding helpers.
//!
//! A `Quote` is a single snapshot of an instrument's price and volume statistics.
//! Sources recreate one on every fetch; consumers only ever read them. Fields are
//! serialized in camelCase so the payload matches what dashboard views expect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PulseError;

/// Tolerance, in percentage points, used by [`Quote::is_consistent`].
const CHANGE_PERCENT_TOLERANCE: f64 = 0.01;

/// Market quote for a single symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Symbol identifier (e.g. `AAPL`).
    pub symbol: String,
    /// Last traded price.
    pub price: f64,
    /// Absolute change against the previous close.
    pub change: f64,
    /// Relative change against the previous close, in percent.
    pub change_percent: f64,
    /// Traded volume for the session.
    pub volume: u64,
    /// Session high.
    pub high: f64,
    /// Session low.
    pub low: f64,
    /// Session open.
    pub open: f64,
    /// Moment the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Build a quote whose `change` and `change_percent` are derived from `previous_close`.
    ///
    /// A non-positive previous close yields a zero percentage instead of a division blow-up.
    #[allow(clippy::too_many_arguments)]
    pub fn from_previous_close(
        symbol: &str,
        price: f64,
        previous_close: f64,
        open: f64,
        high: f64,
        low: f64,
        volume: u64,
        timestamp: DateTime<Utc>,
    ) -> Quote {
        let change = price - previous_close;
        Quote {
            symbol: symbol.to_string(),
            price,
            change,
            change_percent: percent_of(change, previous_close),
            volume,
            high,
            low,
            open,
            timestamp,
        }
    }

    /// Previous close implied by `price` and `change`.
    pub fn previous_close(&self) -> f64 {
        self.price - self.change
    }

    /// `change / previous_close * 100`, the percentage this quote should carry.
    pub fn derived_change_percent(&self) -> f64 {
        percent_of(self.change, self.previous_close())
    }

    /// Whether `change_percent` agrees with `change` and `price`.
    pub fn is_consistent(&self) -> bool {
        (self.change_percent - self.derived_change_percent()).abs() <= CHANGE_PERCENT_TOLERANCE
    }

    /// Encode the quote to JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, PulseError> {
        let json = serde_json::to_vec(self)?;
        Ok(json)
    }
}

fn percent_of(change: f64, base: f64) -> f64 {
    if base > 0.0 { change / base * 100.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(price: f64, change: f64, change_percent: f64) -> Quote {
        Quote {
            symbol: "TSLA".to_string(),
            price,
            change,
            change_percent,
            volume: 10,
            high: price,
            low: price,
            open: price,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn derives_change_from_previous_close() {
        let q = Quote::from_previous_close("AAPL", 150.5, 148.5, 148.5, 151.0, 148.0, 1_000_000, Utc::now());
        assert!((q.change - 2.0).abs() < 1e-9);
        assert!((q.change_percent - 2.0 / 148.5 * 100.0).abs() < 1e-9);
        assert!(q.is_consistent());
    }

    #[test]
    fn zero_previous_close_gives_zero_percent() {
        let q = Quote::from_previous_close("X", 5.0, 0.0, 0.0, 5.0, 0.0, 0, Utc::now());
        assert_eq!(q.change_percent, 0.0);
    }

    #[test]
    fn detects_inconsistent_percentages() {
        assert!(quote(200.0, 5.0, 2.56).is_consistent());
        assert!(!quote(200.0, 5.0, 7.0).is_consistent());
    }

    #[test]
    fn serializes_camel_case_fields() {
        let json = String::from_utf8(quote(1.0, 0.0, 0.0).to_json_bytes().unwrap()).unwrap();
        assert!(json.contains("\"changePercent\""));
        assert!(!json.contains("change_percent"));
    }
}
