//! Notification boundary used to tell the user how an operation went.
//!
//! Notifications are fire-and-forget: a `Notifier` never reports back whether the
//! message was shown.

use crossbeam_channel::Sender;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Visual weight of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Variant {
    /// Neutral or positive outcome.
    #[default]
    Default,
    /// Failure that the user should notice.
    Destructive,
}

/// A user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Short headline, e.g. `Error`.
    pub title: String,
    /// Body text.
    pub description: String,
    /// Visual weight.
    pub variant: Variant,
}

impl Notification {
    /// Build a notification.
    pub fn new(title: &str, description: &str, variant: Variant) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            variant,
        }
    }
}

/// Sink for user notifications.
pub trait Notifier: Send + Sync {
    /// Deliver a notification. Must not block.
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log; destructive ones at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.variant {
            Variant::Default => info!("[{}] {}", notification.title, notification.description),
            Variant::Destructive => warn!("[{}] {}", notification.title, notification.description),
        }
    }
}

/// Forwards notifications into a channel; dropped silently once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: Sender<Notification>,
}

impl ChannelNotifier {
    /// Wrap a channel sender.
    pub fn new(tx: Sender<Notification>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        let _ = self.tx.send(notification);
    }
}
