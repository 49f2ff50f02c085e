//! Outbound plain-text notifications and the inbound manual remote signal.

use crate::config::TelegramConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub trait Notifier: Send + Sync {
    fn send(&self, text: &str) -> Result<()>;
}

/// Fallback when no chat is configured: messages only reach the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, text: &str) -> Result<()> {
        tracing::info!(target: "notify", "{text}");
        Ok(())
    }
}

/// Kind of message, each gated by its own `telegram.notify_*` switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Error,
    DayPlan,
    DaySummary,
}

/// A [`Notifier`] plus the per-kind switches from config. Delivery failures
/// are logged and swallowed.
#[derive(Clone)]
pub struct Notifications {
    notifier: Arc<dyn Notifier>,
    errors: bool,
    plan: bool,
    summary: bool,
}

impl Notifications {
    pub fn new(notifier: Arc<dyn Notifier>, config: &TelegramConfig) -> Self {
        Self {
            notifier,
            errors: config.notify_errors,
            plan: config.notify_next_today,
            summary: config.notify_summary_end,
        }
    }

    pub fn log_only() -> Self {
        Self::new(Arc::new(LogNotifier), &TelegramConfig::default())
    }

    pub fn enabled(&self, kind: NoticeKind) -> bool {
        match kind {
            NoticeKind::Error => self.errors,
            NoticeKind::DayPlan => self.plan,
            NoticeKind::DaySummary => self.summary,
        }
    }

    pub fn notify(&self, kind: NoticeKind, text: &str) {
        if !self.enabled(kind) {
            tracing::debug!(?kind, "notification disabled");
            return;
        }
        if let Err(e) = self.notifier.send(text) {
            tracing::warn!(?kind, error = %e, "notification not delivered");
        }
    }

    pub fn error(&self, text: &str) {
        self.notify(NoticeKind::Error, text);
    }
}

// ---------------------------------------------------------------------------
// Remote signal
// ---------------------------------------------------------------------------

/// Manual on/off switch operators set by posting `#on` / `#off` in the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteSignal {
    On,
    Off,
    Unknown,
}

impl RemoteSignal {
    /// Interpret a chat message by the `#on` / `#off` tag it contains.
    pub fn from_message(text: &str) -> Self {
        let text = text.to_lowercase();
        if text.contains("#on") {
            RemoteSignal::On
        } else if text.contains("#off") {
            RemoteSignal::Off
        } else {
            RemoteSignal::Unknown
        }
    }
}

impl fmt::Display for RemoteSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RemoteSignal::On => "on",
            RemoteSignal::Off => "off",
            RemoteSignal::Unknown => "unknown",
        })
    }
}

pub trait RemoteSignalSource: Send + Sync {
    /// Signal from the latest chat message; `Unknown` on any failure.
    fn latest(&self) -> RemoteSignal;
}

/// Used when no chat is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRemote;

impl RemoteSignalSource for NoRemote {
    fn latest(&self) -> RemoteSignal {
        RemoteSignal::Unknown
    }
}
