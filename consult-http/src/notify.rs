//! User-facing notifications
//!
//! The client only decides that something should be shown and with which
//! text; rendering belongs to whoever implements [`Notifier`].

use crate::errors::messages;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Success => "success",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// What a [`ChannelNotifier`] delivers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A message to show
    Message { severity: Severity, message: String },

    /// The token was cleared; the receiver should send the user to login
    SessionExpired,
}

/// Sink for user-facing outcomes
pub trait Notifier: Send + Sync {
    /// Show a message
    fn notify(&self, severity: Severity, message: &str);

    /// The session ended and the user must log in again
    fn session_expired(&self) {
        self.notify(Severity::Error, messages::SESSION_EXPIRED);
    }
}

/// Writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Error => error!(%severity, "{}", message),
            Severity::Warning => warn!(%severity, "{}", message),
            Severity::Success | Severity::Info => info!(%severity, "{}", message),
        }
    }
}

/// Forwards notifications over an unbounded channel, e.g. to a UI task
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn deliver(&self, notification: Notification) {
        // A dropped receiver just means nobody is listening any more
        let _ = self.sender.send(notification);
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        self.deliver(Notification::Message {
            severity,
            message: message.to_string(),
        });
    }

    fn session_expired(&self) {
        self.deliver(Notification::SessionExpired);
    }
}
