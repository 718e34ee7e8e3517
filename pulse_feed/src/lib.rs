//! Live quote facility for the dashboard.
//!
//! The crate wires together a handful of small building blocks:
//!
//! - `source`: the `QuoteSource` boundary and its implementations (mock random walk,
//!   TTL cache, recorded chart payloads).
//! - `poller`: fixed-interval polling of one symbol into a shared `PollSnapshot`.
//! - `hub`: one shared poller per symbol, fanned out to any number of subscribers.
//! - `search`: debounced, case-insensitive filtering of the symbol catalog.
//! - `operation`: loading/error/data bookkeeping around any fallible action.
//! - `clock` and `cancel`: timer channels and cancellation used by all of the above.
//!
//! Concurrency is thread based: every long-lived component owns a driver thread that
//! multiplexes timers, inputs and shutdown with `crossbeam_channel::select!`.
#![warn(missing_docs)]
pub mod cancel;
pub mod clock;
pub mod hub;
pub mod operation;
pub mod poller;
pub mod search;
pub mod source;
mod sync;

pub use cancel::CancelToken;
pub use clock::{ManualClock, SystemClock, TickSource};
pub use hub::{HubConfig, QuoteHub, Subscription};
pub use operation::{AsyncOperation, AsyncState, OperationError, OperationOptions};
pub use poller::{PollSnapshot, Poller, PollingHandle};
pub use search::{ClickBus, SearchConfig, SearchFacility, SearchState};
pub use source::QuoteSource;
