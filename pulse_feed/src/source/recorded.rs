//! Quotes read from chart payloads recorded off the finance proxy.
//!
//! The proxy forwards the provider's v8 chart response verbatim, so a recording is
//! just that JSON saved as `<dir>/<SYMBOL>.json`. Only the fields needed for a
//! snapshot are decoded; everything else in the payload is ignored.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use pulse_common::{PulseError, Quote, Result};
use serde::Deserialize;

use crate::cancel::CancelToken;
use crate::source::QuoteSource;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

fn present(values: &[Option<f64>]) -> impl Iterator<Item = f64> + '_ {
    values.iter().flatten().copied()
}

/// Decode a chart payload into a quote for `symbol`.
///
/// The price comes from the regular market price, falling back to the last close;
/// the previous close from the meta block, falling back to the first open.
pub fn parse_chart(symbol: &str, payload: &[u8]) -> Result<Quote> {
    let response: ChartResponse = serde_json::from_slice(payload)?;

    let results = response.chart.result.ok_or_else(|| match response.chart.error {
        Some(err) if err.code == "Not Found" => PulseError::SymbolNotFound(symbol.to_string()),
        Some(err) => PulseError::Source(format!("{}: {}", err.code, err.description)),
        None => PulseError::Source("empty chart result with no error".to_string()),
    })?;
    let data = results
        .into_iter()
        .next()
        .ok_or_else(|| PulseError::Source("chart result array is empty".to_string()))?;
    let bars = data.indicators.quote.into_iter().next().unwrap_or_default();

    let price = data
        .meta
        .regular_market_price
        .or_else(|| present(&bars.close).last())
        .ok_or_else(|| PulseError::Source(format!("no price in chart payload for {symbol}")))?;
    let open = present(&bars.open).next().unwrap_or(price);
    let previous_close = data
        .meta
        .previous_close
        .or(data.meta.chart_previous_close)
        .unwrap_or(open);
    let high = present(&bars.high).fold(price, f64::max);
    let low = present(&bars.low).fold(price, f64::min);
    let volume = bars.volume.iter().flatten().sum();
    let timestamp = data
        .timestamp
        .and_then(|ts| ts.last().copied())
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);

    Ok(Quote::from_previous_close(
        &symbol.to_ascii_uppercase(),
        price,
        previous_close,
        open,
        high,
        low,
        volume,
        timestamp,
    ))
}

/// Serves quotes from a directory of recorded chart payloads.
pub struct RecordedChartSource {
    dir: PathBuf,
}

impl RecordedChartSource {
    /// Read recordings from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl QuoteSource for RecordedChartSource {
    fn name(&self) -> &str {
        "recorded"
    }

    fn fetch(&self, symbol: &str, cancel: &CancelToken) -> Result<Quote> {
        cancel.check()?;
        let path = self.dir.join(format!("{}.json", symbol.to_ascii_uppercase()));
        if !path.is_file() {
            return Err(PulseError::SymbolNotFound(symbol.to_string()));
        }
        let payload = fs::read(&path)?;
        parse_chart(symbol, &payload)
    }
}
