//! `ProviderAdapter` - owns one external engine instance for one session.
//!
//! Lifecycle: `Unloaded -> Loading -> Initializing -> Ready -> Disposed`.
//!
//! - `Loading`: the engine script is being acquired from the [`ScriptLoader`]
//!   on a spawned task guarded by a `CancellationToken`.
//! - `Initializing`: the instance is constructed and listeners are attached,
//!   but the local participant has not joined yet.
//! - `Ready`: the engine emitted `videoConferenceJoined`. Only now are
//!   commands delivered and control events fanned out to subscribers.
//! - `Disposed`: terminal. Reached by [`ProviderAdapter::dispose`] or by a
//!   failed load/construction.
//!
//! Engine callbacks and the load task never touch adapter state directly.
//! They post [`AdapterInput`] values into an unbounded inbox which the owner
//! drains through [`ProviderAdapter::next_signal`]. Anything still queued at
//! disposal is discarded.

use common::secret::SecretString;
use common::types::SessionId;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::commands::{CommandDispatch, ControlCommand};
use super::engine::{EngineConfig, EngineInstance, EngineRuntime, ListenerId};
use super::events::{
    ControlSource, EventHandler, EventHub, ProviderEvent, ProviderEventKind, Subscription,
    ENGINE_EVENTS,
};
use super::loader::{ScriptLease, ScriptLoadError, ScriptLoader};
use crate::config::Config;
use crate::observability::metrics;

/// Adapter failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    #[error("engine script failed to load: {0}")]
    ResourceLoad(String),

    #[error("provider is already initializing")]
    AlreadyInitializing,

    #[error("engine construction failed: {0}")]
    Construction(String),

    #[error("provider has been disposed")]
    Disposed,
}

/// Adapter lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Unloaded,
    Loading,
    Initializing,
    Ready,
    Disposed,
}

impl AdapterState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Disposed => "disposed",
        }
    }
}

/// Lifecycle transitions reported to the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterSignal {
    /// The engine instance was constructed (not yet joined).
    Constructed,
    /// Load or construction failed; the adapter is now disposed.
    Failed(AdapterError),
    /// The local participant joined.
    Ready,
    /// The engine reported the participant left.
    Left,
}

/// Per-session engine configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub room_id: SessionId,
    pub display_name: String,
    pub password: Option<SecretString>,
    pub start_muted: bool,
    pub start_video_off: bool,
    pub skip_prejoin: bool,
    pub visible_controls: Vec<String>,
}

/// Where and how to reach the engine.
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub domain: String,
    pub script_url: String,
    pub auth_token: Option<SecretString>,
}

impl From<&Config> for ProviderEndpoint {
    fn from(config: &Config) -> Self {
        Self {
            domain: config.engine_domain.clone(),
            script_url: config.engine_script_url.clone(),
            auth_token: config.engine_auth_token.clone(),
        }
    }
}

/// Work posted into the adapter's inbox.
#[derive(Debug)]
enum AdapterInput {
    ScriptLoaded(Result<ScriptLease, ScriptLoadError>),
    Engine {
        name: &'static str,
        payload: serde_json::Value,
    },
}

/// Owner of exactly one engine instance.
pub struct ProviderAdapter {
    session_id: SessionId,
    state: AdapterState,
    endpoint: ProviderEndpoint,
    loader: ScriptLoader,
    runtime: Arc<dyn EngineRuntime>,
    inbox_tx: mpsc::UnboundedSender<AdapterInput>,
    inbox_rx: mpsc::UnboundedReceiver<AdapterInput>,
    /// Cancels the in-flight script load.
    load_cancel: CancellationToken,
    pending_config: Option<ProviderConfig>,
    instance: Option<Box<dyn EngineInstance>>,
    listeners: Vec<(&'static str, ListenerId)>,
    lease: Option<ScriptLease>,
    hub: EventHub,
    initialized_at: Option<Instant>,
}

impl ProviderAdapter {
    /// Create an unloaded adapter. `cancel_token` is typically a child of the
    /// owning actor's token.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        endpoint: ProviderEndpoint,
        loader: ScriptLoader,
        runtime: Arc<dyn EngineRuntime>,
        cancel_token: CancellationToken,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            session_id,
            state: AdapterState::Unloaded,
            endpoint,
            loader,
            runtime,
            inbox_tx,
            inbox_rx,
            load_cancel: cancel_token,
            pending_config: None,
            instance: None,
            listeners: Vec::new(),
            lease: None,
            hub: EventHub::new(),
            initialized_at: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> AdapterState {
        self.state
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Begin loading the engine script. Construction happens once the load
    /// completes, inside [`next_signal`](Self::next_signal).
    ///
    /// # Errors
    ///
    /// - `AlreadyInitializing` unless the adapter is `Unloaded`
    /// - `Disposed` after disposal
    pub fn initialize(&mut self, config: ProviderConfig) -> Result<(), AdapterError> {
        match self.state {
            AdapterState::Unloaded => {}
            AdapterState::Loading | AdapterState::Initializing | AdapterState::Ready => {
                warn!(
                    target: "session.provider.adapter",
                    session_id = %self.session_id,
                    state = self.state.as_str(),
                    "Rejected reentrant initialize"
                );
                return Err(AdapterError::AlreadyInitializing);
            }
            AdapterState::Disposed => return Err(AdapterError::Disposed),
        }

        self.state = AdapterState::Loading;
        self.pending_config = Some(config);
        self.initialized_at = Some(Instant::now());

        let loader = self.loader.clone();
        let url = self.endpoint.script_url.clone();
        let tx = self.inbox_tx.clone();
        let cancel = self.load_cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                result = loader.acquire(&url) => {
                    // Receiver is closed once the adapter is disposed.
                    let _ = tx.send(AdapterInput::ScriptLoaded(result));
                }
            }
        });

        info!(
            target: "session.provider.adapter",
            session_id = %self.session_id,
            script_url = %self.endpoint.script_url,
            "Loading engine script"
        );
        Ok(())
    }

    /// Wait for the next lifecycle transition.
    ///
    /// Cancel-safe. Pending forever once the adapter is disposed, so it can
    /// sit in a `select!` arm.
    pub async fn next_signal(&mut self) -> AdapterSignal {
        loop {
            if self.state == AdapterState::Disposed {
                return std::future::pending().await;
            }
            let Some(input) = self.inbox_rx.recv().await else {
                return std::future::pending().await;
            };
            if let Some(signal) = self.apply(input) {
                return signal;
            }
        }
    }

    fn apply(&mut self, input: AdapterInput) -> Option<AdapterSignal> {
        match input {
            AdapterInput::ScriptLoaded(result) => self.on_script_loaded(result),
            AdapterInput::Engine { name, payload } => self.on_engine_event(name, &payload),
        }
    }

    fn on_script_loaded(
        &mut self,
        result: Result<ScriptLease, ScriptLoadError>,
    ) -> Option<AdapterSignal> {
        if self.state != AdapterState::Loading {
            debug!(
                target: "session.provider.adapter",
                session_id = %self.session_id,
                state = self.state.as_str(),
                "Discarding late script load"
            );
            return None;
        }

        let lease = match result {
            Ok(lease) => lease,
            Err(e) => {
                warn!(
                    target: "session.provider.adapter",
                    session_id = %self.session_id,
                    error = %e,
                    "Engine script failed to load"
                );
                self.dispose();
                return Some(AdapterSignal::Failed(AdapterError::ResourceLoad(
                    e.to_string(),
                )));
            }
        };

        let Some(config) = self.pending_config.take() else {
            self.dispose();
            return Some(AdapterSignal::Failed(AdapterError::Construction(
                "missing provider configuration".to_string(),
            )));
        };

        let engine_config = EngineConfig::from(&config);
        let mut instance = match self.runtime.construct(
            lease.script(),
            &self.endpoint.domain,
            &engine_config,
            self.endpoint.auth_token.as_ref(),
        ) {
            Ok(instance) => instance,
            Err(e) => {
                warn!(
                    target: "session.provider.adapter",
                    session_id = %self.session_id,
                    error = %e,
                    "Engine construction failed"
                );
                drop(lease);
                self.dispose();
                return Some(AdapterSignal::Failed(AdapterError::Construction(e.0)));
            }
        };

        for name in ENGINE_EVENTS {
            let tx = self.inbox_tx.clone();
            let id = instance.add_event_listener(
                name,
                Arc::new(move |payload: &serde_json::Value| {
                    let _ = tx.send(AdapterInput::Engine {
                        name,
                        payload: payload.clone(),
                    });
                }),
            );
            self.listeners.push((name, id));
        }

        self.instance = Some(instance);
        self.lease = Some(lease);
        self.state = AdapterState::Initializing;
        metrics::record_provider_construction();

        info!(
            target: "session.provider.adapter",
            session_id = %self.session_id,
            "Engine instance constructed, awaiting join"
        );
        Some(AdapterSignal::Constructed)
    }

    fn on_engine_event(
        &mut self,
        name: &'static str,
        payload: &serde_json::Value,
    ) -> Option<AdapterSignal> {
        let Some(event) = ProviderEvent::from_engine(name, payload) else {
            debug!(
                target: "session.provider.adapter",
                session_id = %self.session_id,
                event = name,
                "Ignoring unparseable engine event"
            );
            return None;
        };

        match (event, self.state) {
            (ProviderEvent::Joined, AdapterState::Initializing) => {
                self.state = AdapterState::Ready;
                if let Some(started) = self.initialized_at {
                    metrics::record_provider_ready(started.elapsed());
                }
                info!(
                    target: "session.provider.adapter",
                    session_id = %self.session_id,
                    "Engine joined, provider ready"
                );
                self.hub.emit(&event);
                Some(AdapterSignal::Ready)
            }
            (ProviderEvent::Left, AdapterState::Initializing | AdapterState::Ready) => {
                info!(
                    target: "session.provider.adapter",
                    session_id = %self.session_id,
                    "Engine reported participant left"
                );
                if self.state == AdapterState::Ready {
                    self.hub.emit(&event);
                }
                Some(AdapterSignal::Left)
            }
            (_, AdapterState::Ready) => {
                self.hub.emit(&event);
                None
            }
            (_, state) => {
                debug!(
                    target: "session.provider.adapter",
                    session_id = %self.session_id,
                    event = name,
                    state = state.as_str(),
                    "Dropping engine event before readiness"
                );
                None
            }
        }
    }

    /// Send a control command to the engine. Dropped unless `Ready`.
    pub fn issue_command(&mut self, command: &ControlCommand) -> CommandDispatch {
        let label = command.label();

        let dispatch = match (self.state, self.instance.as_mut(), command.engine_call()) {
            (AdapterState::Ready, Some(instance), Some((name, args))) => {
                instance.execute_command(name, &args);
                debug!(
                    target: "session.provider.adapter",
                    session_id = %self.session_id,
                    command = label,
                    "Command delivered"
                );
                CommandDispatch::Delivered
            }
            _ => {
                debug!(
                    target: "session.provider.adapter",
                    session_id = %self.session_id,
                    command = label,
                    state = self.state.as_str(),
                    "Command ignored"
                );
                CommandDispatch::Ignored
            }
        };

        metrics::record_command(
            label,
            match dispatch {
                CommandDispatch::Delivered => "delivered",
                CommandDispatch::Ignored => "ignored",
            },
        );
        dispatch
    }

    /// Tear everything down. Valid from any state; idempotent.
    pub fn dispose(&mut self) {
        if self.state == AdapterState::Disposed {
            return;
        }
        let previous = self.state;
        self.state = AdapterState::Disposed;

        self.load_cancel.cancel();

        if let Some(mut instance) = self.instance.take() {
            for (name, id) in self.listeners.drain(..) {
                instance.remove_event_listener(name, id);
            }
            instance.dispose();
            metrics::record_provider_disposal();
        }

        self.hub.clear();
        self.lease = None;
        self.pending_config = None;

        // Late loads and queued engine events must have no effect.
        self.inbox_rx.close();
        while self.inbox_rx.try_recv().is_ok() {}

        info!(
            target: "session.provider.adapter",
            session_id = %self.session_id,
            previous_state = previous.as_str(),
            "Provider disposed"
        );
    }
}

impl ControlSource for ProviderAdapter {
    fn is_ready(&self) -> bool {
        self.state == AdapterState::Ready
    }

    fn subscribe(&self, kind: ProviderEventKind, handler: EventHandler) -> Subscription {
        self.hub.subscribe(kind, handler)
    }

    fn query_audio_muted(&self) -> Option<bool> {
        self.instance
            .as_ref()
            .filter(|_| self.is_ready())
            .map(|i| i.is_audio_muted())
    }

    fn query_video_muted(&self) -> Option<bool> {
        self.instance
            .as_ref()
            .filter(|_| self.is_ready())
            .map(|i| i.is_video_muted())
    }
}

impl Drop for ProviderAdapter {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAdapter")
            .field("session_id", &self.session_id)
            .field("state", &self.state)
            .field("subscriptions", &self.hub.len())
            .finish_non_exhaustive()
    }
}
