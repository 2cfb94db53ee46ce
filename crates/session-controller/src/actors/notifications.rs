//! `NotificationCenter` - owns every live notification and its countdown.
//!
//! Each running countdown is a spawned sleep task with its own child
//! `CancellationToken` and a generation number. The task reports
//! `(id, generation)` back to the actor on expiry; a report whose generation
//! no longer matches (the notification was paused, resumed or dismissed in
//! the meantime) is ignored. Dismissal therefore always wins over a pending
//! expiry.
//!
//! Pausing freezes `remaining` at the pause instant:
//! `remaining -= now - last_resume`. Pausing twice is a no-op.

use crate::errors::SessionError;
use crate::notification::{
    DismissReason, NewNotification, Notification, NotificationEvent,
};
use crate::observability::metrics;

use super::messages::NotificationMessage;

use chrono::Utc;
use common::types::NotificationId;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Mailbox size for the notification center.
const NOTIFICATION_CHANNEL_BUFFER: usize = 100;

/// Broadcast capacity for notification events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Handle to the `NotificationCenter`.
#[derive(Clone)]
pub struct NotificationCenterHandle {
    sender: mpsc::Sender<NotificationMessage>,
    events: broadcast::Sender<NotificationEvent>,
    cancel_token: CancellationToken,
}

impl NotificationCenterHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> NotificationMessage,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|e| SessionError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SessionError::Internal(format!("response receive failed: {e}")))
    }

    /// Show a notification and start its countdown.
    pub async fn schedule(
        &self,
        notification: NewNotification,
    ) -> Result<NotificationId, SessionError> {
        self.request(|respond_to| NotificationMessage::Schedule {
            notification,
            respond_to,
        })
        .await
    }

    /// Freeze the countdown. Returns `false` if it was not running.
    pub async fn pause(&self, id: NotificationId) -> Result<bool, SessionError> {
        self.request(|respond_to| NotificationMessage::Pause { id, respond_to })
            .await
    }

    /// Restart the countdown for exactly the remaining time. Returns `false`
    /// if it was not paused.
    pub async fn resume(&self, id: NotificationId) -> Result<bool, SessionError> {
        self.request(|respond_to| NotificationMessage::Resume { id, respond_to })
            .await
    }

    /// Remove the notification from any state.
    pub async fn dismiss(&self, id: NotificationId) -> Result<bool, SessionError> {
        self.request(|respond_to| NotificationMessage::Dismiss { id, respond_to })
            .await
    }

    /// Pointer entered the notification.
    pub async fn hover_enter(&self, id: NotificationId) -> Result<bool, SessionError> {
        self.pause(id).await
    }

    /// Pointer left the notification.
    pub async fn hover_leave(&self, id: NotificationId) -> Result<bool, SessionError> {
        self.resume(id).await
    }

    /// Snapshot of one notification, with `remaining` as of now.
    pub async fn get(&self, id: NotificationId) -> Result<Option<Notification>, SessionError> {
        self.request(|respond_to| NotificationMessage::Get { id, respond_to })
            .await
    }

    /// All live notifications, oldest first.
    pub async fn list(&self) -> Result<Vec<Notification>, SessionError> {
        self.request(|respond_to| NotificationMessage::List { respond_to })
            .await
    }

    /// Subscribe to notification changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.events.subscribe()
    }

    /// Cancel the actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

struct Entry {
    notification: Notification,
    /// Set while running.
    running_since: Option<Instant>,
    generation: u64,
    timer: Option<CancellationToken>,
    seq: u64,
}

impl Entry {
    fn remaining_now(&self) -> Duration {
        match self.running_since {
            Some(since) => self.notification.remaining.saturating_sub(since.elapsed()),
            None => self.notification.remaining,
        }
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

/// The `NotificationCenter` actor.
pub struct NotificationCenter {
    receiver: mpsc::Receiver<NotificationMessage>,
    cancel_token: CancellationToken,
    events: broadcast::Sender<NotificationEvent>,
    default_duration: Duration,
    entries: HashMap<NotificationId, Entry>,
    expiry_tx: mpsc::UnboundedSender<(NotificationId, u64)>,
    expiry_rx: mpsc::UnboundedReceiver<(NotificationId, u64)>,
    next_seq: u64,
}

impl NotificationCenter {
    /// Spawn the notification center.
    ///
    /// `default_duration` applies to notifications that do not set their own.
    pub fn spawn(
        default_duration: Duration,
        cancel_token: CancellationToken,
    ) -> (NotificationCenterHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(NOTIFICATION_CHANNEL_BUFFER);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();

        let actor = Self {
            receiver,
            cancel_token: cancel_token.clone(),
            events: events.clone(),
            default_duration,
            entries: HashMap::new(),
            expiry_tx,
            expiry_rx,
            next_seq: 0,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = NotificationCenterHandle {
            sender,
            events,
            cancel_token,
        };

        (handle, task_handle)
    }

    #[instrument(skip_all, name = "session.actor.notifications")]
    async fn run(mut self) {
        info!(target: "session.actor.notifications", "NotificationCenter started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "session.actor.notifications",
                        "NotificationCenter received cancellation signal"
                    );
                    break;
                }

                Some((id, generation)) = self.expiry_rx.recv() => {
                    self.handle_expiry(id, generation);
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message),
                        None => {
                            info!(
                                target: "session.actor.notifications",
                                "NotificationCenter channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        for entry in self.entries.values_mut() {
            entry.stop_timer();
        }

        info!(
            target: "session.actor.notifications",
            pending = self.entries.len(),
            "NotificationCenter stopped"
        );
    }

    fn handle_message(&mut self, message: NotificationMessage) {
        match message {
            NotificationMessage::Schedule {
                notification,
                respond_to,
            } => {
                let id = self.schedule(notification);
                let _ = respond_to.send(id);
            }
            NotificationMessage::Pause { id, respond_to } => {
                let _ = respond_to.send(self.pause(id));
            }
            NotificationMessage::Resume { id, respond_to } => {
                let _ = respond_to.send(self.resume(id));
            }
            NotificationMessage::Dismiss { id, respond_to } => {
                let _ = respond_to.send(self.dismiss(id, DismissReason::Dismissed));
            }
            NotificationMessage::Get { id, respond_to } => {
                let _ = respond_to.send(self.entries.get(&id).map(snapshot));
            }
            NotificationMessage::List { respond_to } => {
                let mut entries: Vec<&Entry> = self.entries.values().collect();
                entries.sort_by_key(|e| e.seq);
                let _ = respond_to.send(entries.into_iter().map(snapshot).collect());
            }
        }
    }

    fn schedule(&mut self, request: NewNotification) -> NotificationId {
        let id = NotificationId::new();
        let duration = request.duration.unwrap_or(self.default_duration);
        let notification = Notification {
            id,
            title: request.title,
            message: request.message,
            kind: request.kind,
            duration,
            remaining: duration,
            paused: false,
            created_at: Utc::now(),
        };

        self.next_seq += 1;
        let mut entry = Entry {
            notification: notification.clone(),
            running_since: None,
            generation: 0,
            timer: None,
            seq: self.next_seq,
        };
        self.start_countdown(&mut entry);
        self.entries.insert(id, entry);

        metrics::record_notification(notification.kind.as_str());
        debug!(
            target: "session.actor.notifications",
            notification_id = %id,
            kind = notification.kind.as_str(),
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "Notification shown"
        );
        let _ = self.events.send(NotificationEvent::Shown(notification));
        id
    }

    fn start_countdown(&self, entry: &mut Entry) {
        entry.generation += 1;
        entry.running_since = Some(Instant::now());
        entry.notification.paused = false;

        let timer = self.cancel_token.child_token();
        entry.timer = Some(timer.clone());

        let id = entry.notification.id;
        let generation = entry.generation;
        let remaining = entry.notification.remaining;
        let expiry_tx = self.expiry_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = timer.cancelled() => {}
                () = tokio::time::sleep(remaining) => {
                    let _ = expiry_tx.send((id, generation));
                }
            }
        });
    }

    fn pause(&mut self, id: NotificationId) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        if entry.running_since.is_none() {
            return false;
        }

        entry.notification.remaining = entry.remaining_now();
        entry.running_since = None;
        entry.notification.paused = true;
        entry.generation += 1;
        entry.stop_timer();

        let remaining = entry.notification.remaining;
        debug!(
            target: "session.actor.notifications",
            notification_id = %id,
            remaining_ms = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
            "Notification paused"
        );
        let _ = self
            .events
            .send(NotificationEvent::Paused { id, remaining });
        true
    }

    fn resume(&mut self, id: NotificationId) -> bool {
        let Some(mut entry) = self.entries.remove(&id) else {
            return false;
        };
        if !entry.notification.paused {
            self.entries.insert(id, entry);
            return false;
        }

        self.start_countdown(&mut entry);
        let remaining = entry.notification.remaining;
        self.entries.insert(id, entry);

        debug!(
            target: "session.actor.notifications",
            notification_id = %id,
            remaining_ms = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
            "Notification resumed"
        );
        let _ = self
            .events
            .send(NotificationEvent::Resumed { id, remaining });
        true
    }

    fn dismiss(&mut self, id: NotificationId, reason: DismissReason) -> bool {
        let Some(mut entry) = self.entries.remove(&id) else {
            return false;
        };
        entry.stop_timer();

        debug!(
            target: "session.actor.notifications",
            notification_id = %id,
            reason = ?reason,
            "Notification dismissed"
        );
        let _ = self
            .events
            .send(NotificationEvent::Dismissed { id, reason });
        true
    }

    fn handle_expiry(&mut self, id: NotificationId, generation: u64) {
        let current = self
            .entries
            .get(&id)
            .is_some_and(|e| e.generation == generation && e.running_since.is_some());
        if current {
            self.dismiss(id, DismissReason::Expired);
        } else {
            debug!(
                target: "session.actor.notifications",
                notification_id = %id,
                "Ignoring stale expiry"
            );
        }
    }
}

fn snapshot(entry: &Entry) -> Notification {
    Notification {
        remaining: entry.remaining_now(),
        ..entry.notification.clone()
    }
}
