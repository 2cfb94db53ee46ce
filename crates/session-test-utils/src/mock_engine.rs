//! Fake real-time engine and script fetcher.
//!
//! [`FakeEngineRuntime`] is a cloneable handle onto shared state: every
//! instance it constructs writes back into that state, so a test can keep
//! one clone for assertions while the controller owns another.
//!
//! # Example
//!
//! ```rust,ignore
//! use session_test_utils::FakeEngineRuntime;
//!
//! let engine = FakeEngineRuntime::new().with_initial_mute(true, false);
//! // ... hand `Arc::new(engine.clone())` to the controller ...
//! engine.join();
//! engine.set_audio_muted(false);
//! assert_eq!(engine.commands().len(), 0);
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use common::error::CollaboratorError;
use common::secret::SecretString;
use serde_json::{json, Value};
use session_controller::provider::events::{
    EVENT_AUDIO_MUTE, EVENT_JOINED, EVENT_LEFT, EVENT_STREAM_STATUS, EVENT_VIDEO_MUTE,
};
use session_controller::provider::{
    EngineConfig, EngineError, EngineInstance, EngineListener, EngineRuntime, ListenerId,
    LoadedScript, ScriptFetcher,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct EngineInner {
    constructions: usize,
    disposals: usize,
    fail_construction: Option<String>,
    audio_muted: bool,
    video_muted: bool,
    last_domain: Option<String>,
    last_config: Option<Value>,
    last_auth_token: bool,
    commands: Vec<(String, Vec<Value>)>,
    listeners: Vec<(String, ListenerId, EngineListener)>,
    next_listener: u64,
}

/// Engine runtime that records everything it is asked to do.
#[derive(Clone, Default)]
pub struct FakeEngineRuntime {
    inner: Arc<Mutex<EngineInner>>,
}

impl FakeEngineRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every construction fails with `reason`.
    #[must_use]
    pub fn failing(reason: &str) -> Self {
        let runtime = Self::new();
        runtime.inner.lock().unwrap().fail_construction = Some(reason.to_string());
        runtime
    }

    /// Mute flags reported by instances until changed.
    #[must_use]
    pub fn with_initial_mute(self, audio_muted: bool, video_muted: bool) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.audio_muted = audio_muted;
            inner.video_muted = video_muted;
        }
        self
    }

    #[must_use]
    pub fn constructions(&self) -> usize {
        self.inner.lock().unwrap().constructions
    }

    #[must_use]
    pub fn disposals(&self) -> usize {
        self.inner.lock().unwrap().disposals
    }

    /// Commands executed on any instance, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<(String, Vec<Value>)> {
        self.inner.lock().unwrap().commands.clone()
    }

    /// Listeners currently registered.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.lock().unwrap().listeners.len()
    }

    /// Domain passed to the last construction.
    #[must_use]
    pub fn last_domain(&self) -> Option<String> {
        self.inner.lock().unwrap().last_domain.clone()
    }

    /// Constructor options of the last construction, as serialized for the engine.
    #[must_use]
    pub fn last_config(&self) -> Option<Value> {
        self.inner.lock().unwrap().last_config.clone()
    }

    /// Whether the last construction received an auth token.
    #[must_use]
    pub fn last_had_auth_token(&self) -> bool {
        self.inner.lock().unwrap().last_auth_token
    }

    /// Fire `event` at every listener registered for it. Returns how many ran.
    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        let listeners: Vec<EngineListener> = self
            .inner
            .lock()
            .unwrap()
            .listeners
            .iter()
            .filter(|(name, _, _)| name == event)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();

        for listener in &listeners {
            listener(payload);
        }
        listeners.len()
    }

    /// The local participant joins.
    pub fn join(&self) -> usize {
        self.emit(EVENT_JOINED, &json!({ "roomName": "fake" }))
    }

    /// The local participant leaves.
    pub fn leave(&self) -> usize {
        self.emit(EVENT_LEFT, &json!({}))
    }

    /// Change the microphone flag and report it.
    pub fn set_audio_muted(&self, muted: bool) -> usize {
        self.inner.lock().unwrap().audio_muted = muted;
        self.emit(EVENT_AUDIO_MUTE, &json!({ "muted": muted }))
    }

    /// Change the camera flag and report it.
    pub fn set_video_muted(&self, muted: bool) -> usize {
        self.inner.lock().unwrap().video_muted = muted;
        self.emit(EVENT_VIDEO_MUTE, &json!({ "muted": muted }))
    }

    /// Report a stream status change.
    pub fn set_streaming(&self, on: bool) -> usize {
        self.emit(EVENT_STREAM_STATUS, &json!({ "on": on }))
    }
}

impl EngineRuntime for FakeEngineRuntime {
    fn construct(
        &self,
        _script: &LoadedScript,
        domain: &str,
        config: &EngineConfig,
        auth_token: Option<&SecretString>,
    ) -> Result<Box<dyn EngineInstance>, EngineError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(reason) = &inner.fail_construction {
            return Err(EngineError(reason.clone()));
        }
        inner.constructions += 1;
        inner.last_domain = Some(domain.to_string());
        inner.last_config = Some(serde_json::to_value(config).unwrap());
        inner.last_auth_token = auth_token.is_some();

        Ok(Box::new(FakeEngineInstance {
            inner: Arc::clone(&self.inner),
            disposed: false,
        }))
    }
}

/// Instance handed out by [`FakeEngineRuntime`].
pub struct FakeEngineInstance {
    inner: Arc<Mutex<EngineInner>>,
    disposed: bool,
}

impl EngineInstance for FakeEngineInstance {
    fn add_event_listener(&mut self, event: &str, listener: EngineListener) -> ListenerId {
        let mut inner = self.inner.lock().unwrap();
        inner.next_listener += 1;
        let id = ListenerId(inner.next_listener);
        inner.listeners.push((event.to_string(), id, listener));
        id
    }

    fn remove_event_listener(&mut self, event: &str, id: ListenerId) {
        self.inner
            .lock()
            .unwrap()
            .listeners
            .retain(|(name, existing, _)| !(name == event && *existing == id));
    }

    fn execute_command(&mut self, name: &str, args: &[Value]) {
        self.inner
            .lock()
            .unwrap()
            .commands
            .push((name.to_string(), args.to_vec()));
    }

    fn is_audio_muted(&self) -> bool {
        self.inner.lock().unwrap().audio_muted
    }

    fn is_video_muted(&self) -> bool {
        self.inner.lock().unwrap().video_muted
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.inner.lock().unwrap().disposals += 1;
        }
    }
}

/// Script fetcher that serves a fixed body.
#[derive(Debug)]
pub struct StaticScriptFetcher {
    body: Bytes,
    delay: Option<Duration>,
    failing: AtomicBool,
    fetches: AtomicUsize,
}

impl Default for StaticScriptFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticScriptFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            body: Bytes::from_static(b"/* engine */"),
            delay: None,
            failing: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    /// A fetcher whose every request fails.
    #[must_use]
    pub fn failing() -> Self {
        let fetcher = Self::new();
        fetcher.set_failing(true);
        fetcher
    }

    /// Every fetch takes `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Serve `body` instead of the default script.
    #[must_use]
    pub fn with_body(mut self, body: &'static [u8]) -> Self {
        self.body = Bytes::from_static(body);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[must_use]
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScriptFetcher for StaticScriptFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, CollaboratorError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Transport(format!(
                "unexpected status 404 Not Found for {url}"
            )));
        }
        Ok(self.body.clone())
    }
}
