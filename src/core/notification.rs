//! Transient user-facing notices

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A short message the client shows and then dismisses on its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub dismiss_after_ms: u64,
}

impl Notification {
    pub fn info(message: impl Into<String>, dismiss_after_ms: u64) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
            dismiss_after_ms,
        }
    }

    pub fn error(message: impl Into<String>, dismiss_after_ms: u64) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
            dismiss_after_ms,
        }
    }
}
