//! `SessionControllerActor` - sole owner of session state transitions.
//!
//! States: `Idle -> Validating -> Persisting -> {Active | Scheduled} -> Ending -> Idle`.
//!
//! The actor owns at most one [`ProviderAdapter`]. An active session holds
//! exactly one adapter; its construction and disposal are paired whether the
//! session ends through [`SessionControllerHandle::end`], through the
//! engine's own `videoConferenceLeft`, or through cancellation.
//!
//! While waiting for the adapter to confirm construction the state stays
//! `Persisting`; the transition to `Active` happens only after construction
//! was issued. Readiness (the engine's join event) arrives later through the
//! main loop and attaches [`ControlSync`].

use crate::collaborators::Collaborators;
use crate::config::Config;
use crate::control_sync::{ControlPublisher, ControlState, ControlSync};
use crate::errors::SessionError;
use crate::notification::NewNotification;
use crate::observability::metrics;
use crate::provider::{
    AdapterSignal, CommandDispatch, ControlCommand, ProviderAdapter, ProviderConfig,
    ProviderEndpoint, ScriptLoader,
};
use crate::session::{
    resolve_display_name, Session, SessionDraft, SessionRequest, SessionSnapshot, SessionState,
    GUEST_DISPLAY_NAME,
};

use super::messages::ControllerMessage;
use super::notifications::NotificationCenterHandle;

use chrono::{Local, Utc};
use common::types::SessionId;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Mailbox size for the session controller.
const CONTROLLER_CHANNEL_BUFFER: usize = 32;

/// Handle to the `SessionControllerActor`.
#[derive(Clone)]
pub struct SessionControllerHandle {
    sender: mpsc::Sender<ControllerMessage>,
    state: watch::Receiver<SessionSnapshot>,
    controls: watch::Receiver<Option<ControlState>>,
    cancel_token: CancellationToken,
}

impl SessionControllerHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ControllerMessage,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|e| SessionError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SessionError::Internal(format!("response receive failed: {e}")))
    }

    /// Create a session from `request`.
    ///
    /// An immediate request returns once the engine instance was constructed
    /// (not necessarily joined). A request whose date and time both lie in
    /// the future is persisted as scheduled and starts no engine.
    ///
    /// # Errors
    ///
    /// - `Validation` when nobody is signed in
    /// - `Persistence` when the storage write fails
    /// - `ResourceLoad` when the engine script or instance cannot be brought up
    /// - `InvalidState` when a session is already active
    pub async fn submit(&self, request: SessionRequest) -> Result<Session, SessionError> {
        self.request(|respond_to| ControllerMessage::Submit {
            request,
            respond_to,
        })
        .await?
    }

    /// Start an immediate session titled with today's date.
    pub async fn quick_start(&self) -> Result<Session, SessionError> {
        self.submit(SessionRequest::quick_start(Local::now().date_naive()))
            .await
    }

    /// Forward a control command. Ignored unless the provider is ready.
    pub async fn issue_command(
        &self,
        command: ControlCommand,
    ) -> Result<CommandDispatch, SessionError> {
        self.request(|respond_to| ControllerMessage::IssueCommand {
            command,
            respond_to,
        })
        .await
    }

    /// End the current session. A no-op when idle.
    pub async fn end(&self) -> Result<(), SessionError> {
        self.request(|respond_to| ControllerMessage::End { respond_to })
            .await?
    }

    /// Display name a creation form should start with.
    pub async fn default_display_name(&self) -> Result<String, SessionError> {
        self.request(|respond_to| ControllerMessage::DefaultDisplayName { respond_to })
            .await
    }

    /// Observe session state.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }

    /// Observe the control-state mirror. `None` while no provider is ready.
    #[must_use]
    pub fn watch_controls(&self) -> watch::Receiver<Option<ControlState>> {
        self.controls.clone()
    }

    /// Current session state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Cancel the actor. A live provider is disposed.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The provider bound to the active session.
struct ActiveProvider {
    control_sync: Option<ControlSync>,
    adapter: ProviderAdapter,
}

/// The `SessionControllerActor` implementation.
pub struct SessionControllerActor {
    config: Config,
    collaborators: Collaborators,
    notifications: NotificationCenterHandle,
    loader: ScriptLoader,
    receiver: mpsc::Receiver<ControllerMessage>,
    cancel_token: CancellationToken,
    state_tx: watch::Sender<SessionSnapshot>,
    controls_tx: ControlPublisher,
    active: Option<ActiveProvider>,
}

impl SessionControllerActor {
    /// Spawn the session controller.
    ///
    /// # Arguments
    ///
    /// * `config` - Engine endpoint, storage collection, timeouts
    /// * `collaborators` - Storage, principal source, preferences, engine
    /// * `notifications` - Where user-facing outcomes are shown
    /// * `cancel_token` - Shutdown signal; adapters get child tokens
    pub fn spawn(
        config: Config,
        collaborators: Collaborators,
        notifications: NotificationCenterHandle,
        cancel_token: CancellationToken,
    ) -> (SessionControllerHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(CONTROLLER_CHANNEL_BUFFER);
        let (state_tx, state_rx) = watch::channel(SessionSnapshot::idle());
        let (controls_tx, controls_rx) = watch::channel(None);

        let actor = Self {
            loader: ScriptLoader::new(Arc::clone(&collaborators.scripts)),
            config,
            collaborators,
            notifications,
            receiver,
            cancel_token: cancel_token.clone(),
            state_tx,
            controls_tx: Arc::new(controls_tx),
            active: None,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = SessionControllerHandle {
            sender,
            state: state_rx,
            controls: controls_rx,
            cancel_token,
        };

        (handle, task_handle)
    }

    #[instrument(skip_all, name = "session.actor.controller", fields(engine_domain = %self.config.engine_domain))]
    async fn run(mut self) {
        info!(
            target: "session.actor.controller",
            engine_domain = %self.config.engine_domain,
            "SessionControllerActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "session.actor.controller",
                        "SessionControllerActor received cancellation signal"
                    );
                    self.shutdown();
                    break;
                }

                signal = next_provider_signal(&mut self.active) => {
                    self.handle_provider_signal(signal).await;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message).await,
                        None => {
                            info!(
                                target: "session.actor.controller",
                                "SessionControllerActor channel closed, exiting"
                            );
                            self.shutdown();
                            break;
                        }
                    }
                }
            }
        }

        info!(target: "session.actor.controller", "SessionControllerActor stopped");
    }

    async fn handle_message(&mut self, message: ControllerMessage) {
        match message {
            ControllerMessage::Submit {
                request,
                respond_to,
            } => {
                let result = self.handle_submit(request).await;
                let _ = respond_to.send(result);
            }
            ControllerMessage::IssueCommand {
                command,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_command(&command));
            }
            ControllerMessage::End { respond_to } => {
                let result = self.handle_end().await;
                let _ = respond_to.send(result);
            }
            ControllerMessage::DefaultDisplayName { respond_to } => {
                let _ = respond_to.send(self.default_display_name());
            }
        }
    }

    fn state(&self) -> SessionState {
        self.state_tx.borrow().state
    }

    fn set_state(&self, state: SessionState) {
        self.state_tx.send_modify(|snapshot| snapshot.state = state);
    }

    fn publish(&self, state: SessionState, session: Session, share_link: String) {
        self.state_tx.send_replace(SessionSnapshot {
            state,
            session: Some(session),
            share_link: Some(share_link),
        });
    }

    #[instrument(skip_all, name = "session.submit")]
    async fn handle_submit(&mut self, request: SessionRequest) -> Result<Session, SessionError> {
        let state = self.state();
        if !matches!(state, SessionState::Idle | SessionState::Scheduled) {
            let err = SessionError::InvalidState(format!("cannot submit while {state}"));
            warn!(target: "session.actor.controller", state = %state, "Rejected submit");
            metrics::record_session_failure(err.reason());
            self.notify(error_notification(&err)).await;
            return Err(err);
        }

        self.set_state(SessionState::Validating);
        let Some(principal) = self.collaborators.principals.current_principal() else {
            return self
                .fail(SessionError::Validation("no signed-in principal".to_string()))
                .await;
        };

        let remembered = self.collaborators.preferences.load();
        let draft =
            SessionDraft::from_request(&request, &principal, remembered.as_deref(), Utc::now());
        let requested_name = request.display_name.trim();
        if !requested_name.is_empty() {
            self.collaborators.preferences.remember(requested_name);
        }

        self.set_state(SessionState::Persisting);
        let created_at = Utc::now();
        let record = match serde_json::to_value(draft.record(&principal.id, created_at)) {
            Ok(record) => record,
            Err(e) => return self.fail(SessionError::Internal(e.to_string())).await,
        };

        let id = match self
            .collaborators
            .store
            .create(&self.config.session_collection, record)
            .await
        {
            Ok(id) => SessionId::from(id),
            Err(e) => return self.fail(SessionError::Persistence(e.to_string())).await,
        };

        let password = draft.password.clone();
        let session = draft.into_session(id.clone(), principal.id.clone(), created_at);
        let share_link = self.config.share_link(id.as_str());

        info!(
            target: "session.actor.controller",
            session_id = %id,
            is_scheduled = session.is_scheduled,
            "Session persisted"
        );

        if session.is_scheduled {
            self.publish(SessionState::Scheduled, session.clone(), share_link.clone());
            metrics::record_session_created("scheduled");
            self.notify(NewNotification::success(
                "Success!",
                format!("Meeting scheduled! Share link: {share_link}"),
            ))
            .await;
            return Ok(session);
        }

        let provider_config = ProviderConfig {
            room_id: id.clone(),
            display_name: session.host_name.clone(),
            password,
            start_muted: session.options.mute_on_entry,
            start_video_off: session.options.camera_off_on_entry,
            skip_prejoin: self.config.skip_prejoin,
            visible_controls: self.config.toolbar_buttons.clone(),
        };

        if let Err(err) = self.start_provider(id, provider_config).await {
            return self.fail(err).await;
        }

        self.publish(SessionState::Active, session.clone(), share_link);
        metrics::record_session_created("immediate");
        self.notify(NewNotification::success("Success!", "Meeting created!"))
            .await;
        Ok(session)
    }

    /// Construct the adapter and wait until the engine instance exists.
    async fn start_provider(
        &mut self,
        session_id: SessionId,
        provider_config: ProviderConfig,
    ) -> Result<(), SessionError> {
        let mut adapter = ProviderAdapter::new(
            session_id,
            ProviderEndpoint::from(&self.config),
            self.loader.clone(),
            Arc::clone(&self.collaborators.engine),
            self.cancel_token.child_token(),
        );
        adapter.initialize(provider_config)?;

        let deadline = self.config.script_load_timeout;
        let outcome = tokio::select! {
            () = self.cancel_token.cancelled() => {
                Err(SessionError::Internal("shutdown during provider start".to_string()))
            }
            result = tokio::time::timeout(deadline, adapter.next_signal()) => match result {
                Ok(AdapterSignal::Constructed) => Ok(()),
                Ok(AdapterSignal::Failed(e)) => Err(SessionError::from(e)),
                Ok(other) => Err(SessionError::Internal(format!(
                    "unexpected provider signal before construction: {other:?}"
                ))),
                Err(_) => Err(SessionError::ResourceLoad(format!(
                    "engine not constructed within {}ms",
                    deadline.as_millis()
                ))),
            },
        };

        match outcome {
            Ok(()) => {
                self.active = Some(ActiveProvider {
                    control_sync: None,
                    adapter,
                });
                Ok(())
            }
            Err(err) => {
                adapter.dispose();
                Err(err)
            }
        }
    }

    async fn handle_provider_signal(&mut self, signal: AdapterSignal) {
        match signal {
            AdapterSignal::Ready => {
                let Some(active) = self.active.as_mut() else {
                    return;
                };
                active.control_sync =
                    ControlSync::attach(&active.adapter, Arc::clone(&self.controls_tx));
                info!(
                    target: "session.actor.controller",
                    session_id = %active.adapter.session_id(),
                    "Provider ready"
                );
            }
            AdapterSignal::Left => {
                info!(
                    target: "session.actor.controller",
                    "Engine reported leave, ending session"
                );
                self.set_state(SessionState::Ending);
                self.teardown().await;
            }
            AdapterSignal::Failed(e) => {
                let err = SessionError::from(e);
                warn!(target: "session.actor.controller", error = %err, "Provider failed");
                self.release_provider();
                let _: Result<(), _> = self.fail(err).await;
            }
            AdapterSignal::Constructed => {
                debug!(target: "session.actor.controller", "Ignoring late construction signal");
            }
        }
    }

    fn handle_command(&mut self, command: &ControlCommand) -> CommandDispatch {
        match self.active.as_mut() {
            Some(active) => active.adapter.issue_command(command),
            None => {
                debug!(
                    target: "session.actor.controller",
                    command = command.label(),
                    "Command ignored, no active provider"
                );
                metrics::record_command(command.label(), "ignored");
                CommandDispatch::Ignored
            }
        }
    }

    async fn handle_end(&mut self) -> Result<(), SessionError> {
        match self.state() {
            SessionState::Active => {
                self.set_state(SessionState::Ending);
                self.teardown().await;
            }
            SessionState::Scheduled => {
                info!(target: "session.actor.controller", "Leaving scheduled session");
                self.state_tx.send_replace(SessionSnapshot::idle());
            }
            state => {
                debug!(target: "session.actor.controller", state = %state, "End ignored");
            }
        }
        Ok(())
    }

    fn default_display_name(&self) -> String {
        match self.collaborators.principals.current_principal() {
            Some(principal) => resolve_display_name(
                "",
                self.collaborators.preferences.load().as_deref(),
                &principal,
            ),
            None => GUEST_DISPLAY_NAME.to_string(),
        }
    }

    /// Dispose the provider, announce the end and return to `Idle`.
    async fn teardown(&mut self) {
        self.release_provider();
        self.state_tx.send_replace(SessionSnapshot::idle());
        self.notify(NewNotification::info(
            "Meeting Ended",
            "You have left the meeting.",
        ))
        .await;
    }

    fn release_provider(&mut self) {
        if let Some(mut active) = self.active.take() {
            drop(active.control_sync.take());
            active.adapter.dispose();
        }
    }

    /// Report a failure and return to `Idle`.
    async fn fail<T>(&mut self, err: SessionError) -> Result<T, SessionError> {
        warn!(
            target: "session.actor.controller",
            reason = err.reason(),
            error = %err,
            "Session operation failed"
        );
        metrics::record_session_failure(err.reason());
        self.state_tx.send_replace(SessionSnapshot::idle());
        self.notify(error_notification(&err)).await;
        Err(err)
    }

    async fn notify(&self, notification: NewNotification) {
        if let Err(e) = self.notifications.schedule(notification).await {
            warn!(target: "session.actor.controller", error = %e, "Failed to show notification");
        }
    }

    fn shutdown(&mut self) {
        self.release_provider();
        self.state_tx.send_replace(SessionSnapshot::idle());
    }
}

async fn next_provider_signal(active: &mut Option<ActiveProvider>) -> AdapterSignal {
    match active {
        Some(active) => active.adapter.next_signal().await,
        None => std::future::pending().await,
    }
}

fn error_notification(err: &SessionError) -> NewNotification {
    let (title, message) = err.notification();
    NewNotification::error(title, message)
}
