//! Typed provider events and the subscription registry.
//!
//! Raw engine callbacks are parsed into [`ProviderEvent`] values and fanned
//! out through an [`EventHub`]. Every subscription is a [`Subscription`]
//! disposer: dropping it (or calling [`Subscription::unsubscribe`]) removes
//! the handler.

use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Engine event: the local participant joined (readiness).
pub const EVENT_JOINED: &str = "videoConferenceJoined";
/// Engine event: the local participant left.
pub const EVENT_LEFT: &str = "videoConferenceLeft";
/// Engine event: microphone mute changed, payload `{muted}`.
pub const EVENT_AUDIO_MUTE: &str = "audioMuteStatusChanged";
/// Engine event: camera mute changed, payload `{muted}`.
pub const EVENT_VIDEO_MUTE: &str = "videoMuteStatusChanged";
/// Engine event: live stream status changed, payload `{on}`.
pub const EVENT_STREAM_STATUS: &str = "streamStatusChanged";

/// Every engine event the adapter listens to.
pub const ENGINE_EVENTS: [&str; 5] = [
    EVENT_JOINED,
    EVENT_LEFT,
    EVENT_AUDIO_MUTE,
    EVENT_VIDEO_MUTE,
    EVENT_STREAM_STATUS,
];

/// Event delivered to adapter subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEvent {
    AudioMuteChanged { muted: bool },
    VideoMuteChanged { muted: bool },
    StreamStatusChanged { on: bool },
    Joined,
    Left,
}

/// Discriminant used to subscribe to one kind of [`ProviderEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderEventKind {
    AudioMuteChanged,
    VideoMuteChanged,
    StreamStatusChanged,
    Joined,
    Left,
}

#[derive(Deserialize)]
struct MutedPayload {
    muted: bool,
}

#[derive(Deserialize)]
struct StreamPayload {
    on: bool,
}

impl ProviderEvent {
    /// Parse a raw engine event. Unknown names and malformed payloads yield `None`.
    #[must_use]
    pub fn from_engine(name: &str, payload: &serde_json::Value) -> Option<Self> {
        match name {
            EVENT_JOINED => Some(Self::Joined),
            EVENT_LEFT => Some(Self::Left),
            EVENT_AUDIO_MUTE => MutedPayload::deserialize(payload)
                .ok()
                .map(|p| Self::AudioMuteChanged { muted: p.muted }),
            EVENT_VIDEO_MUTE => MutedPayload::deserialize(payload)
                .ok()
                .map(|p| Self::VideoMuteChanged { muted: p.muted }),
            EVENT_STREAM_STATUS => StreamPayload::deserialize(payload)
                .ok()
                .map(|p| Self::StreamStatusChanged { on: p.on }),
            _ => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ProviderEventKind {
        match self {
            Self::AudioMuteChanged { .. } => ProviderEventKind::AudioMuteChanged,
            Self::VideoMuteChanged { .. } => ProviderEventKind::VideoMuteChanged,
            Self::StreamStatusChanged { .. } => ProviderEventKind::StreamStatusChanged,
            Self::Joined => ProviderEventKind::Joined,
            Self::Left => ProviderEventKind::Left,
        }
    }
}

/// Subscriber callback.
pub type EventHandler = Arc<dyn Fn(&ProviderEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<(u64, ProviderEventKind, EventHandler)>,
}

/// Fan-out registry for provider events.
#[derive(Clone, Default)]
pub struct EventHub {
    registry: Arc<Mutex<Registry>>,
}

impl EventHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, kind: ProviderEventKind, handler: EventHandler) -> Subscription {
        let mut registry = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.handlers.push((id, kind, handler));

        Subscription {
            registry: Arc::downgrade(&self.registry),
            id,
        }
    }

    /// Deliver `event` to every handler subscribed to its kind.
    pub fn emit(&self, event: &ProviderEvent) {
        let kind = event.kind();
        // Handlers run outside the lock so they may unsubscribe.
        let handlers: Vec<EventHandler> = {
            let registry = self
                .registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            registry
                .handlers
                .iter()
                .filter(|(_, k, _)| *k == kind)
                .map(|(_, _, h)| Arc::clone(h))
                .collect()
        };

        for handler in handlers {
            handler(event);
        }
    }

    /// Remove every handler.
    pub fn clear(&self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .clear();
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Disposer for one handler registered on an [`EventHub`].
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    id: u64,
}

impl Subscription {
    /// Remove the handler now.
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .handlers
                .retain(|(id, _, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Read side of a provider, as seen by control-state derivation.
///
/// Implemented by [`ProviderAdapter`](super::ProviderAdapter); tests
/// implement it with in-memory fakes.
pub trait ControlSource {
    /// Whether the provider has confirmed the local participant joined.
    fn is_ready(&self) -> bool;

    /// Subscribe to one kind of event.
    fn subscribe(&self, kind: ProviderEventKind, handler: EventHandler) -> Subscription;

    /// Synchronous microphone mute query. `None` when not ready.
    fn query_audio_muted(&self) -> Option<bool>;

    /// Synchronous camera mute query. `None` when not ready.
    fn query_video_muted(&self) -> Option<bool>;
}
