//! User-facing notifications.
//!
//! The resizer never talks to a concrete UI. Everything a user should see
//! (a file was resized, a transparent PNG was skipped, the tool failed) goes
//! through the one-method [`Notifier`] trait with a [`Severity`].
//!
//! Two implementations ship with the crate:
//!
//! - [`MessageQueue`] collects messages for a host to render later (the
//!   flash-message queue of a web backend, a JSON response, ...).
//! - [`TracingNotifier`] forwards messages to `tracing` at a matching level;
//!   the CLI uses it.

use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Ok,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Ok => "ok",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// Receives user-facing messages.
pub trait Notifier {
    fn notify(&self, message: &str, severity: Severity);
}

/// A message held by a [`MessageQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashMessage {
    pub message: String,
    pub severity: Severity,
}

/// Collects notifications in arrival order.
#[derive(Debug, Default)]
pub struct MessageQueue {
    messages: Mutex<Vec<FlashMessage>>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the queued messages.
    pub fn messages(&self) -> Vec<FlashMessage> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Remove and return all queued messages.
    pub fn drain(&self) -> Vec<FlashMessage> {
        self.messages
            .lock()
            .map(|mut m| std::mem::take(&mut *m))
            .unwrap_or_default()
    }
}

impl Notifier for MessageQueue {
    fn notify(&self, message: &str, severity: Severity) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(FlashMessage {
                message: message.to_string(),
                severity,
            });
        }
    }
}

/// Logs notifications through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info | Severity::Ok => tracing::info!(%severity, "{message}"),
            Severity::Warning => tracing::warn!(%severity, "{message}"),
            Severity::Error => tracing::error!(%severity, "{message}"),
        }
    }
}
