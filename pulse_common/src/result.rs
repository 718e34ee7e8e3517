//! `Result` alias defaulting to `PulseError`, used by both the feed and the client.
use crate::error::PulseError;

/// `Result<T>` means `Result<T, PulseError>`; a different error type can still be named.
pub type Result<T, E = PulseError> = std::result::Result<T, E>;
