//! Control-state mirror derived from provider events.
//!
//! [`ControlSync`] exists only while a provider is ready. On attach it seeds
//! the mirror from one synchronous query of each flag, then rewrites fields
//! as `audioMuteChanged` / `videoMuteChanged` / `streamStatusChanged` events
//! arrive. Dropping it unsubscribes and publishes `None`.

use crate::provider::{ControlSource, EventHandler, ProviderEvent, ProviderEventKind, Subscription};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Local mirror of the engine's mic/video/stream flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlState {
    pub mic_muted: bool,
    pub video_muted: bool,
    pub streaming: bool,
}

impl ControlState {
    fn apply(&mut self, event: &ProviderEvent) -> bool {
        match *event {
            ProviderEvent::AudioMuteChanged { muted } => {
                std::mem::replace(&mut self.mic_muted, muted) != muted
            }
            ProviderEvent::VideoMuteChanged { muted } => {
                std::mem::replace(&mut self.video_muted, muted) != muted
            }
            ProviderEvent::StreamStatusChanged { on } => {
                std::mem::replace(&mut self.streaming, on) != on
            }
            ProviderEvent::Joined | ProviderEvent::Left => false,
        }
    }
}

/// Publishing side of the control-state observable.
pub type ControlPublisher = Arc<watch::Sender<Option<ControlState>>>;

/// Live derivation bound to one ready provider.
pub struct ControlSync {
    publisher: ControlPublisher,
    _subscriptions: Vec<Subscription>,
}

impl ControlSync {
    /// Seed and start mirroring. Returns `None` if `source` is not ready.
    #[must_use]
    pub fn attach(source: &dyn ControlSource, publisher: ControlPublisher) -> Option<Self> {
        if !source.is_ready() {
            return None;
        }

        let seeded = ControlState {
            mic_muted: source.query_audio_muted()?,
            video_muted: source.query_video_muted()?,
            // The engine has no stream-status query; streaming starts off.
            streaming: false,
        };
        publisher.send_replace(Some(seeded));
        debug!(
            target: "session.control_sync",
            mic_muted = seeded.mic_muted,
            video_muted = seeded.video_muted,
            "Control state seeded"
        );

        let subscriptions = [
            ProviderEventKind::AudioMuteChanged,
            ProviderEventKind::VideoMuteChanged,
            ProviderEventKind::StreamStatusChanged,
        ]
        .into_iter()
        .map(|kind| source.subscribe(kind, mirror_handler(&publisher)))
        .collect();

        Some(Self {
            publisher,
            _subscriptions: subscriptions,
        })
    }

    /// Current mirror.
    #[must_use]
    pub fn current(&self) -> Option<ControlState> {
        *self.publisher.borrow()
    }
}

fn mirror_handler(publisher: &ControlPublisher) -> EventHandler {
    let publisher = Arc::clone(publisher);
    Arc::new(move |event: &ProviderEvent| {
        publisher.send_if_modified(|state| match state {
            Some(state) => state.apply(event),
            None => false,
        });
    })
}

impl Drop for ControlSync {
    fn drop(&mut self) {
        self.publisher.send_replace(None);
        debug!(target: "session.control_sync", "Control state cleared");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::provider::EventHub;

    struct FakeSource {
        ready: bool,
        audio_muted: bool,
        video_muted: bool,
        hub: EventHub,
    }

    impl FakeSource {
        fn ready(audio_muted: bool, video_muted: bool) -> Self {
            Self {
                ready: true,
                audio_muted,
                video_muted,
                hub: EventHub::new(),
            }
        }
    }

    impl ControlSource for FakeSource {
        fn is_ready(&self) -> bool {
            self.ready
        }

        fn subscribe(&self, kind: ProviderEventKind, handler: EventHandler) -> Subscription {
            self.hub.subscribe(kind, handler)
        }

        fn query_audio_muted(&self) -> Option<bool> {
            self.ready.then_some(self.audio_muted)
        }

        fn query_video_muted(&self) -> Option<bool> {
            self.ready.then_some(self.video_muted)
        }
    }

    fn publisher() -> (ControlPublisher, watch::Receiver<Option<ControlState>>) {
        let (tx, rx) = watch::channel(None);
        (Arc::new(tx), rx)
    }

    #[test]
    fn test_attach_seeds_from_queries() {
        let source = FakeSource::ready(true, false);
        let (tx, rx) = publisher();

        let sync = ControlSync::attach(&source, tx).unwrap();

        let expected = ControlState {
            mic_muted: true,
            video_muted: false,
            streaming: false,
        };
        assert_eq!(*rx.borrow(), Some(expected));
        assert_eq!(sync.current(), Some(expected));
    }

    #[test]
    fn test_attach_refused_before_ready() {
        let mut source = FakeSource::ready(false, false);
        source.ready = false;
        let (tx, rx) = publisher();

        assert!(ControlSync::attach(&source, tx).is_none());
        assert_eq!(*rx.borrow(), None);
        assert!(source.hub.is_empty());
    }

    #[test]
    fn test_events_rewrite_fields() {
        let source = FakeSource::ready(false, false);
        let (tx, rx) = publisher();
        let _sync = ControlSync::attach(&source, tx).unwrap();

        source.hub.emit(&ProviderEvent::AudioMuteChanged { muted: true });
        source.hub.emit(&ProviderEvent::StreamStatusChanged { on: true });

        assert_eq!(
            *rx.borrow(),
            Some(ControlState {
                mic_muted: true,
                video_muted: false,
                streaming: true,
            })
        );
    }

    #[test]
    fn test_unchanged_value_does_not_notify() {
        let source = FakeSource::ready(false, true);
        let (tx, mut rx) = publisher();
        let _sync = ControlSync::attach(&source, tx).unwrap();
        let _ = rx.borrow_and_update();

        source.hub.emit(&ProviderEvent::VideoMuteChanged { muted: true });
        assert!(!rx.has_changed().unwrap());

        source.hub.emit(&ProviderEvent::VideoMuteChanged { muted: false });
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn test_drop_clears_state_and_unsubscribes() {
        let source = FakeSource::ready(false, false);
        let (tx, rx) = publisher();
        let sync = ControlSync::attach(&source, tx).unwrap();
        assert_eq!(source.hub.len(), 3);

        drop(sync);

        assert_eq!(*rx.borrow(), None);
        assert!(source.hub.is_empty());
        source.hub.emit(&ProviderEvent::AudioMuteChanged { muted: true });
        assert_eq!(*rx.borrow(), None);
    }
}
