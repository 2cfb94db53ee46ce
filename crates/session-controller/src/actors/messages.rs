//! Message types for actor communication.
//!
//! Requests travel over `tokio::sync::mpsc`; replies use `tokio::sync::oneshot`.

use crate::errors::SessionError;
use crate::notification::{NewNotification, Notification};
use crate::provider::{CommandDispatch, ControlCommand};
use crate::session::{Session, SessionRequest};
use common::types::NotificationId;
use tokio::sync::oneshot;

/// Messages sent to `SessionControllerActor`.
#[derive(Debug)]
pub enum ControllerMessage {
    /// Create an active or scheduled session.
    Submit {
        request: SessionRequest,
        respond_to: oneshot::Sender<Result<Session, SessionError>>,
    },

    /// Forward a control command to the active provider.
    IssueCommand {
        command: ControlCommand,
        respond_to: oneshot::Sender<CommandDispatch>,
    },

    /// End the current session.
    End {
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Display name a creation form should be pre-filled with.
    DefaultDisplayName { respond_to: oneshot::Sender<String> },
}

/// Messages sent to `NotificationCenter`.
#[derive(Debug)]
pub enum NotificationMessage {
    Schedule {
        notification: NewNotification,
        respond_to: oneshot::Sender<NotificationId>,
    },

    Pause {
        id: NotificationId,
        /// `true` if a running countdown was paused.
        respond_to: oneshot::Sender<bool>,
    },

    Resume {
        id: NotificationId,
        /// `true` if a paused countdown was resumed.
        respond_to: oneshot::Sender<bool>,
    },

    Dismiss {
        id: NotificationId,
        /// `true` if the notification existed.
        respond_to: oneshot::Sender<bool>,
    },

    Get {
        id: NotificationId,
        respond_to: oneshot::Sender<Option<Notification>>,
    },

    List {
        respond_to: oneshot::Sender<Vec<Notification>>,
    },
}
