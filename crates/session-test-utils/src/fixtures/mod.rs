//! Test fixtures for session core tests.

use chrono::{Duration as ChronoDuration, Local, NaiveDate, NaiveTime};
use common::secret::SecretString;
use session_controller::collaborators::{Collaborators, Principal};
use session_controller::config::Config;
use session_controller::control_sync::ControlState;
use session_controller::session::{SessionRequest, SessionSnapshot, SessionState};
use session_controller::{
    NotificationCenter, NotificationCenterHandle, SessionControllerActor, SessionControllerHandle,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::mock_engine::{FakeEngineRuntime, StaticScriptFetcher};
use crate::mock_store::{MemoryPreferences, MockPrincipalSource, MockSessionStore};

/// Principal id used by [`TestSessionCore::start`].
pub const TEST_PRINCIPAL_ID: &str = "uid-host-1";

/// Principal display name used by [`TestSessionCore::start`].
pub const TEST_PRINCIPAL_NAME: &str = "Ada Host";

/// Configuration pointing at a fictional engine.
#[must_use]
pub fn test_config() -> Config {
    Config {
        engine_domain: "meet.test".to_string(),
        engine_script_url: "https://meet.test/external_api.js".to_string(),
        engine_auth_token: None,
        app_origin: "https://app.test".to_string(),
        session_collection: "meetings".to_string(),
        toolbar_buttons: vec!["microphone".to_string(), "camera".to_string()],
        skip_prejoin: true,
        script_load_timeout: Duration::from_secs(2),
        notification_duration: Duration::from_millis(5_000),
    }
}

/// Builder for test session requests.
#[derive(Debug, Clone, Default)]
pub struct SessionRequestBuilder {
    request: SessionRequest,
}

impl SessionRequestBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn title(mut self, title: &str) -> Self {
        self.request.title = title.to_string();
        self
    }

    #[must_use]
    pub fn display_name(mut self, name: &str) -> Self {
        self.request.display_name = name.to_string();
        self
    }

    #[must_use]
    pub fn purpose(mut self, purpose: &str) -> Self {
        self.request.purpose = Some(purpose.to_string());
        self
    }

    #[must_use]
    pub fn password(mut self, password: &str) -> Self {
        self.request.password = Some(SecretString::from(password.to_string()));
        self
    }

    #[must_use]
    pub fn invitees(mut self, raw: &str) -> Self {
        self.request.invitees = Some(raw.to_string());
        self
    }

    #[must_use]
    pub fn schedule_date(mut self, date: NaiveDate) -> Self {
        self.request.schedule_date = Some(date);
        self
    }

    #[must_use]
    pub fn schedule_time(mut self, time: NaiveTime) -> Self {
        self.request.schedule_time = Some(time);
        self
    }

    /// Schedule for `days` days from now at noon local time.
    #[must_use]
    pub fn scheduled_in_days(self, days: i64) -> Self {
        let date = Local::now().date_naive() + ChronoDuration::days(days);
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        self.schedule_date(date).schedule_time(noon)
    }

    #[must_use]
    pub fn mic_enabled(mut self, enabled: bool) -> Self {
        self.request.mic_enabled_on_join = enabled;
        self
    }

    #[must_use]
    pub fn camera_enabled(mut self, enabled: bool) -> Self {
        self.request.camera_enabled_on_join = enabled;
        self
    }

    #[must_use]
    pub fn waiting_room(mut self, enabled: bool) -> Self {
        self.request.waiting_room_enabled = enabled;
        self
    }

    #[must_use]
    pub fn build(self) -> SessionRequest {
        self.request
    }
}

/// A spawned session controller and notification center wired to fakes.
pub struct TestSessionCore {
    pub controller: SessionControllerHandle,
    pub notifications: NotificationCenterHandle,
    pub store: Arc<MockSessionStore>,
    pub principals: Arc<MockPrincipalSource>,
    pub preferences: Arc<MemoryPreferences>,
    pub engine: FakeEngineRuntime,
    pub scripts: Arc<StaticScriptFetcher>,
    pub cancel_token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Collaborator fakes to start a [`TestSessionCore`] with.
pub struct TestCollaborators {
    pub store: MockSessionStore,
    pub principals: MockPrincipalSource,
    pub preferences: MemoryPreferences,
    pub engine: FakeEngineRuntime,
    pub scripts: StaticScriptFetcher,
}

impl Default for TestCollaborators {
    fn default() -> Self {
        Self {
            store: MockSessionStore::new(),
            principals: MockPrincipalSource::signed_in(TEST_PRINCIPAL_ID, Some(TEST_PRINCIPAL_NAME)),
            preferences: MemoryPreferences::new(),
            engine: FakeEngineRuntime::new(),
            scripts: StaticScriptFetcher::new(),
        }
    }
}

impl TestCollaborators {
    #[must_use]
    pub fn with_store(mut self, store: MockSessionStore) -> Self {
        self.store = store;
        self
    }

    #[must_use]
    pub fn with_principals(mut self, principals: MockPrincipalSource) -> Self {
        self.principals = principals;
        self
    }

    #[must_use]
    pub fn with_preferences(mut self, preferences: MemoryPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    #[must_use]
    pub fn with_engine(mut self, engine: FakeEngineRuntime) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub fn with_scripts(mut self, scripts: StaticScriptFetcher) -> Self {
        self.scripts = scripts;
        self
    }
}

impl TestSessionCore {
    /// Start with default fakes and [`test_config`].
    #[must_use]
    pub fn start() -> Self {
        Self::start_with(test_config(), TestCollaborators::default())
    }

    /// Start with the given configuration and fakes.
    #[must_use]
    pub fn start_with(config: Config, fakes: TestCollaborators) -> Self {
        let cancel_token = CancellationToken::new();
        let store = Arc::new(fakes.store);
        let principals = Arc::new(fakes.principals);
        let preferences = Arc::new(fakes.preferences);
        let scripts = Arc::new(fakes.scripts);
        let engine = fakes.engine;

        let (notifications, notifications_task) =
            NotificationCenter::spawn(config.notification_duration, cancel_token.child_token());

        let collaborators = Collaborators {
            store: store.clone(),
            principals: principals.clone(),
            preferences: preferences.clone(),
            engine: Arc::new(engine.clone()),
            scripts: scripts.clone(),
        };

        let (controller, controller_task) = SessionControllerActor::spawn(
            config,
            collaborators,
            notifications.clone(),
            cancel_token.child_token(),
        );

        Self {
            controller,
            notifications,
            store,
            principals,
            preferences,
            engine,
            scripts,
            cancel_token,
            tasks: vec![notifications_task, controller_task],
        }
    }

    /// Sign a different principal in.
    pub fn sign_in(&self, id: &str, display_name: Option<&str>) {
        self.principals
            .sign_in(Principal::new(id, display_name.map(str::to_string)));
    }

    /// Titles of the notifications currently shown.
    pub async fn notification_titles(&self) -> Vec<String> {
        self.notifications
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect()
    }

    /// Wait until the session reaches `state`.
    ///
    /// # Panics
    ///
    /// Panics if the state is not reached within one second.
    pub async fn wait_for_state(&self, state: SessionState) -> SessionSnapshot {
        let mut rx = self.controller.watch_state();
        let reached = rx.wait_for(|s| s.state == state);
        let snapshot = tokio::time::timeout(Duration::from_secs(1), reached)
            .await
            .unwrap_or_else(|_| panic!("session never reached {state}"))
            .unwrap()
            .clone();
        snapshot
    }

    /// Wait until the control mirror satisfies `predicate`.
    ///
    /// # Panics
    ///
    /// Panics if the predicate does not hold within one second.
    pub async fn wait_for_controls(
        &self,
        predicate: impl FnMut(&Option<ControlState>) -> bool,
    ) -> Option<ControlState> {
        let mut rx = self.controller.watch_controls();
        let controls = *tokio::time::timeout(Duration::from_secs(1), rx.wait_for(predicate))
            .await
            .expect("control state never matched")
            .unwrap();
        controls
    }

    /// Cancel both actors and wait for them to exit.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        for task in self.tasks {
            let _ = tokio::time::timeout(Duration::from_secs(1), task).await;
        }
    }
}
