//! Error types shared between the feed library and the client.
//!
//! The `PulseError` enum unifies common failure cases for I/O, serialization,
//! channel communication, quote sources and internal logic, allowing crates to
//! propagate a single error type.
use std::io;

use thiserror::Error;

/// Unified error type shared by the feed library and the client.
#[derive(Error, Debug)]
pub enum PulseError {
    /// I/O error originating from the standard library or files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// Error while parsing a watchlist file into symbols.
    #[error("Parse watchlist error: {0}")]
    ParseWatchlist(String),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Channel send failed (e.g., receiver dropped); contains a short context string.
    #[error("Channel send failed: {0}")]
    ChannelSend(String),

    /// Channel receive failed (e.g., sender closed); contains a short context string.
    #[error("Channel receive failed: {0}")]
    ChannelRecv(String),

    /// A quote source has no data for the requested symbol.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// A quote source failed to produce a quote.
    #[error("Quote source error: {0}")]
    Source(String),

    /// The operation was cancelled before it completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// A polling interval of zero was requested.
    #[error("Polling interval must be greater than zero")]
    InvalidInterval,
}
