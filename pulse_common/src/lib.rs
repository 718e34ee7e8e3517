//!
//! Common types and utilities shared by the quote feed and the client.
//!
//! This crate aggregates:
//! - `error`: unified error type `PulseError` used across the workspace.
//! - `result`: handy `Result<T, PulseError>` alias.
//! - `quote`: the `Quote` snapshot exchanged between sources and consumers.
//! - `symbols`: symbol validation and watchlist parsing helpers.
//! - `catalog`: the static search catalog of `SearchSuggestion` entries.
//! - `notify`: the notification boundary used to surface operation outcomes.
//! - `logging`: explicit logger configuration built once at start-up.
//! - `defaults`: shared timing constants.
#![warn(missing_docs)]
pub mod catalog;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod notify;
pub mod quote;
pub mod result;
pub mod symbols;

pub use error::PulseError;
pub use quote::Quote;
pub use result::Result;
