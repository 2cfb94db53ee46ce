//! Notification data model.

use chrono::{DateTime, Utc};
use common::types::NotificationId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

impl NotificationKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// A notification request. The center assigns the id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    /// Countdown; `None` uses the center's default.
    pub duration: Option<Duration>,
}

impl NewNotification {
    #[must_use]
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind,
            duration: None,
        }
    }

    #[must_use]
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, title, message)
    }

    #[must_use]
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title, message)
    }

    #[must_use]
    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, title, message)
    }

    #[must_use]
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, title, message)
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// A scheduled notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    /// Full countdown as scheduled.
    pub duration: Duration,
    /// Countdown left. Frozen while paused.
    pub remaining: Duration,
    pub paused: bool,
    pub created_at: DateTime<Utc>,
}

/// Why a notification went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissReason {
    Expired,
    Dismissed,
}

/// Change broadcast to notification subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Shown(Notification),
    Paused {
        id: NotificationId,
        remaining: Duration,
    },
    Resumed {
        id: NotificationId,
        remaining: Duration,
    },
    Dismissed {
        id: NotificationId,
        reason: DismissReason,
    },
}

impl NotificationEvent {
    #[must_use]
    pub fn id(&self) -> NotificationId {
        match self {
            Self::Shown(n) => n.id,
            Self::Paused { id, .. } | Self::Resumed { id, .. } | Self::Dismissed { id, .. } => *id,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&NotificationKind::Warning).unwrap(),
            "\"warning\""
        );
        assert_eq!(NotificationKind::Error.as_str(), "error");
    }

    #[test]
    fn test_constructors_set_kind() {
        let n = NewNotification::info("Meeting Ended", "You have left the meeting.");
        assert_eq!(n.kind, NotificationKind::Info);
        assert_eq!(n.duration, None);

        let n = NewNotification::error("Error", "Failed").with_duration(Duration::from_secs(8));
        assert_eq!(n.kind, NotificationKind::Error);
        assert_eq!(n.duration, Some(Duration::from_secs(8)));
    }
}
