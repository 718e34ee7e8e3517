//! Loading/error/data bookkeeping around a fallible action.
//!
//! `AsyncOperation::execute` moves the shared `AsyncState` through
//! idle → loading → (success | error) and hands the outcome back to the caller, so the
//! caller can react to a failure on top of what the state and notifications already show.
//! A panicking action is caught and recorded like any other failure.
//!
//! Runs may overlap (`spawn` twice before the first finishes). Each run takes a ticket
//! when it begins, and only the most recently begun run records its outcome and clears
//! loading; an older run that finishes later still returns its result to its caller.

use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

use log::{debug, error};
use pulse_common::notify::{Notification, Notifier, Variant};
use thiserror::Error;

use crate::sync::{read, write};

/// Failure recorded by an `AsyncOperation`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError<E> {
    /// The action returned an error.
    #[error("{0}")]
    Failed(E),
    /// The action panicked; carries the panic message.
    #[error("{0}")]
    Panicked(String),
}

/// Snapshot of an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncState<T, E> {
    /// An action is running.
    pub loading: bool,
    /// Failure of the last completed run, if it failed.
    pub error: Option<OperationError<E>>,
    /// Result of the last successful run.
    pub data: Option<T>,
}

impl<T, E> Default for AsyncState<T, E> {
    fn default() -> Self {
        Self {
            loading: false,
            error: None,
            data: None,
        }
    }
}

/// Notification behaviour of an operation.
#[derive(Debug, Clone)]
pub struct OperationOptions {
    /// Notify on success.
    pub show_success: bool,
    /// Notify on failure.
    pub show_error: bool,
    /// Body of the success notification.
    pub success_message: String,
    /// Body of the failure notification when the error has no message of its own.
    pub error_message: String,
}

impl Default for OperationOptions {
    fn default() -> Self {
        Self {
            show_success: false,
            show_error: true,
            success_message: "Operation completed successfully".to_string(),
            error_message: "An error occurred".to_string(),
        }
    }
}

struct Tracked<T, E> {
    state: AsyncState<T, E>,
    /// Ticket of the most recently begun run.
    latest: u64,
}

/// Tracks the state of repeated runs of a fallible action.
pub struct AsyncOperation<T, E> {
    state: Arc<RwLock<Tracked<T, E>>>,
    notifier: Arc<dyn Notifier>,
    options: Arc<OperationOptions>,
}

impl<T, E> Clone for AsyncOperation<T, E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            notifier: Arc::clone(&self.notifier),
            options: Arc::clone(&self.options),
        }
    }
}

impl<T, E> AsyncOperation<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Display + Send + Sync + 'static,
{
    /// Idle operation reporting through `notifier`.
    pub fn new(notifier: Arc<dyn Notifier>, options: OperationOptions) -> Self {
        Self {
            state: Arc::new(RwLock::new(Tracked {
                state: AsyncState::default(),
                latest: 0,
            })),
            notifier,
            options: Arc::new(options),
        }
    }

    /// Run `action` on the calling thread and record its outcome.
    ///
    /// Loading is set for the duration of the call and always cleared afterwards.
    /// A previous `data` value is kept when the action fails.
    pub fn execute<F>(&self, action: F) -> Result<T, OperationError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let ticket = self.begin();
        self.run(ticket, action)
    }

    /// Run `action` on a worker thread.
    ///
    /// The state is already loading when this returns.
    pub fn spawn<F>(&self, action: F) -> JoinHandle<Result<T, OperationError<E>>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        let ticket = self.begin();
        let operation = self.clone();
        thread::spawn(move || operation.run(ticket, action))
    }

    /// Clear loading, error and data.
    ///
    /// Runs still in flight no longer record their outcome.
    pub fn reset(&self) {
        let mut tracked = write(&self.state);
        tracked.state = AsyncState::default();
        tracked.latest += 1;
    }

    /// Copy of the current state.
    pub fn state(&self) -> AsyncState<T, E> {
        read(&self.state).state.clone()
    }

    /// Whether an action is running.
    pub fn is_loading(&self) -> bool {
        read(&self.state).state.loading
    }

    /// Failure of the last completed run.
    pub fn error(&self) -> Option<OperationError<E>> {
        read(&self.state).state.error.clone()
    }

    /// Result of the last successful run.
    pub fn data(&self) -> Option<T> {
        read(&self.state).state.data.clone()
    }

    fn begin(&self) -> u64 {
        let mut tracked = write(&self.state);
        tracked.latest += 1;
        tracked.state.loading = true;
        tracked.state.error = None;
        tracked.latest
    }

    fn run<F>(&self, ticket: u64, action: F) -> Result<T, OperationError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let result = match panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(OperationError::Failed(e)),
            Err(payload) => Err(OperationError::Panicked(panic_message(payload.as_ref()))),
        };

        {
            let mut tracked = write(&self.state);
            if tracked.latest != ticket {
                debug!("Run {} finished after run {} began; outcome not recorded", ticket, tracked.latest);
                return result;
            }
            let state = &mut tracked.state;
            match &result {
                Ok(value) => state.data = Some(value.clone()),
                Err(e) => state.error = Some(e.clone()),
            }
            state.loading = false;
        }

        match &result {
            Ok(_) => {
                debug!("Operation succeeded");
                if self.options.show_success {
                    self.notifier.notify(Notification::new(
                        "Success",
                        &self.options.success_message,
                        Variant::Default,
                    ));
                }
            }
            Err(e) => {
                error!("Operation failed: {}", e);
                if self.options.show_error {
                    let message = e.to_string();
                    let description = if message.is_empty() { &self.options.error_message } else { &message };
                    self.notifier
                        .notify(Notification::new("Error", description, Variant::Destructive));
                }
            }
        }
        result
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown error".to_string()
    }
}
