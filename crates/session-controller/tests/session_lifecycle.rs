//! End-to-end tests for the session controller.
//!
//! Drives a spawned `SessionControllerActor` against in-memory collaborators
//! and a fake engine:
//! - Immediate and scheduled session creation
//! - Readiness gating of commands and the control mirror
//! - Ending sessions (user and engine initiated)
//! - Failure paths and their notifications

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use chrono::{Local, NaiveTime};
use common::secret::SecretString;
use session_controller::provider::{CommandDispatch, ControlCommand};
use session_controller::session::{SessionState, INSTANT_TITLE};
use session_controller::SessionError;
use session_test_utils::{
    test_config, FakeEngineRuntime, MemoryPreferences, MockPrincipalSource, MockSessionStore,
    SessionRequestBuilder, StaticScriptFetcher, TestCollaborators, TestSessionCore,
    TEST_PRINCIPAL_ID, TEST_PRINCIPAL_NAME,
};
use std::time::Duration;

fn start_with(fakes: TestCollaborators) -> TestSessionCore {
    TestSessionCore::start_with(test_config(), fakes)
}

// ============================================================================
// Immediate Sessions
// ============================================================================

#[tokio::test]
async fn test_immediate_submit_constructs_exactly_one_engine() {
    let core = TestSessionCore::start();

    let session = core
        .controller
        .submit(SessionRequestBuilder::new().title("Standup").build())
        .await
        .unwrap();

    assert!(!session.is_scheduled);
    assert_eq!(session.title, "Standup");
    assert_eq!(core.engine.constructions(), 1);
    assert_eq!(core.store.writes(), 1);

    let snapshot = core.controller.snapshot();
    assert_eq!(snapshot.state, SessionState::Active);
    assert_eq!(
        snapshot.share_link.as_deref(),
        Some("https://app.test/meeting/session-1")
    );

    let record = core.store.last_record().unwrap();
    assert_eq!(record["isScheduled"], false);
    assert_eq!(record["createdBy"], TEST_PRINCIPAL_ID);
    assert_eq!(record["hostName"], TEST_PRINCIPAL_NAME);
    assert_eq!(core.store.records()[0].0, "meetings");

    assert!(core
        .notification_titles()
        .await
        .contains(&"Success!".to_string()));

    core.shutdown().await;
}

#[tokio::test]
async fn test_empty_title_defaults_to_instant_meeting() {
    let core = TestSessionCore::start();

    let session = core
        .controller
        .submit(SessionRequestBuilder::new().title("   ").build())
        .await
        .unwrap();

    assert_eq!(session.title, INSTANT_TITLE);
    assert_eq!(core.store.writes(), 1);
    assert_eq!(core.store.last_record().unwrap()["title"], INSTANT_TITLE);

    core.shutdown().await;
}

#[tokio::test]
async fn test_engine_receives_session_id_and_entry_options() {
    let core = TestSessionCore::start();

    let session = core
        .controller
        .submit(
            SessionRequestBuilder::new()
                .display_name("Grace")
                .purpose("Weekly sync")
                .password("s3cret")
                .mic_enabled(false)
                .camera_enabled(true)
                .build(),
        )
        .await
        .unwrap();

    let config = core.engine.last_config().unwrap();
    assert_eq!(config["roomName"], session.id.as_str());
    assert_eq!(config["userInfo"]["displayName"], "Grace");
    assert_eq!(config["password"], "s3cret");
    assert_eq!(config["configOverwrite"]["startWithAudioMuted"], true);
    assert_eq!(config["configOverwrite"]["startWithVideoMuted"], false);
    assert_eq!(config["configOverwrite"]["prejoinPageEnabled"], false);
    assert_eq!(core.engine.last_domain().as_deref(), Some("meet.test"));

    // The password goes to the engine only.
    let record = core.store.last_record().unwrap();
    assert!(record.get("password").is_none());
    assert_eq!(record["purpose"], "Weekly sync");
    assert_eq!(core.preferences.remembered().as_deref(), Some("Grace"));
    assert!(!core.engine.last_had_auth_token());

    core.shutdown().await;
}

#[tokio::test]
async fn test_configured_auth_token_reaches_the_engine() {
    let mut config = test_config();
    config.engine_auth_token = Some(SecretString::from("eyJhbGciOiJSUzI1NiJ9".to_string()));
    let core = TestSessionCore::start_with(config, TestCollaborators::default());

    core.controller
        .submit(SessionRequestBuilder::new().build())
        .await
        .unwrap();

    assert_eq!(core.engine.constructions(), 1);
    assert!(core.engine.last_had_auth_token());

    core.shutdown().await;
}

#[tokio::test]
async fn test_partial_schedule_is_treated_as_immediate() {
    let core = TestSessionCore::start();

    let date_only = core
        .controller
        .submit(
            SessionRequestBuilder::new()
                .schedule_date(Local::now().date_naive() + chrono::Duration::days(3))
                .build(),
        )
        .await
        .unwrap();
    assert!(!date_only.is_scheduled);
    core.controller.end().await.unwrap();

    let time_only = core
        .controller
        .submit(
            SessionRequestBuilder::new()
                .schedule_time(NaiveTime::from_hms_opt(23, 59, 0).unwrap())
                .build(),
        )
        .await
        .unwrap();
    assert!(!time_only.is_scheduled);

    assert_eq!(core.engine.constructions(), 2);
    assert_eq!(core.engine.disposals(), 1);

    core.shutdown().await;
}

// ============================================================================
// Scheduled Sessions
// ============================================================================

#[tokio::test]
async fn test_future_schedule_persists_without_constructing() {
    let core = TestSessionCore::start();

    let session = core
        .controller
        .submit(
            SessionRequestBuilder::new()
                .scheduled_in_days(2)
                .invitees("a@x.com, ,b@x.com")
                .build(),
        )
        .await
        .unwrap();

    assert!(session.is_scheduled);
    assert!(session.scheduled_for.is_some());
    assert_eq!(session.title, "Scheduled Meeting");
    assert_eq!(session.invitees, vec!["a@x.com", "b@x.com"]);
    assert_eq!(core.engine.constructions(), 0);
    assert_eq!(core.scripts.fetches(), 0);
    assert_eq!(core.controller.snapshot().state, SessionState::Scheduled);

    let shown = core.notifications.list().await.unwrap();
    assert!(shown
        .iter()
        .any(|n| n.message.starts_with("Meeting scheduled! Share link: https://app.test/meeting/")));

    // Leaving a scheduled session has nothing to dispose.
    core.controller.end().await.unwrap();
    assert_eq!(core.controller.snapshot().state, SessionState::Idle);
    assert_eq!(core.engine.disposals(), 0);

    core.shutdown().await;
}

// ============================================================================
// Readiness and Control State
// ============================================================================

#[tokio::test]
async fn test_commands_before_ready_are_ignored() {
    let core = TestSessionCore::start();
    core.controller
        .submit(SessionRequestBuilder::new().build())
        .await
        .unwrap();

    let dispatch = core
        .controller
        .issue_command(ControlCommand::ToggleAudio)
        .await
        .unwrap();

    assert_eq!(dispatch, CommandDispatch::Ignored);
    assert!(core.engine.commands().is_empty());
    assert_eq!(*core.controller.watch_controls().borrow(), None);

    core.shutdown().await;
}

#[tokio::test]
async fn test_join_seeds_control_state_from_engine_queries() {
    let fakes = TestCollaborators::default()
        .with_engine(FakeEngineRuntime::new().with_initial_mute(true, false));
    let core = start_with(fakes);
    core.controller
        .submit(SessionRequestBuilder::new().build())
        .await
        .unwrap();

    assert_eq!(core.engine.join(), 1);

    let controls = core.wait_for_controls(Option::is_some).await.unwrap();
    assert!(controls.mic_muted);
    assert!(!controls.video_muted);
    assert!(!controls.streaming);

    core.shutdown().await;
}

#[tokio::test]
async fn test_engine_events_update_control_state_after_join() {
    let core = TestSessionCore::start();
    core.controller
        .submit(SessionRequestBuilder::new().build())
        .await
        .unwrap();
    core.engine.join();
    core.wait_for_controls(Option::is_some).await;

    core.engine.set_video_muted(true);
    core.engine.set_streaming(true);

    let controls = core
        .wait_for_controls(|c| c.is_some_and(|c| c.video_muted && c.streaming))
        .await
        .unwrap();
    assert!(!controls.mic_muted);

    core.shutdown().await;
}

#[tokio::test]
async fn test_commands_after_ready_reach_the_engine() {
    let core = TestSessionCore::start();
    core.controller
        .submit(SessionRequestBuilder::new().build())
        .await
        .unwrap();
    core.engine.join();
    core.wait_for_controls(Option::is_some).await;

    let toggled = core
        .controller
        .issue_command(ControlCommand::ToggleVideo)
        .await
        .unwrap();
    let streamed = core
        .controller
        .issue_command(ControlCommand::StartStream("abcd-efgh".to_string()))
        .await
        .unwrap();
    let blank_key = core
        .controller
        .issue_command(ControlCommand::StartStream("  ".to_string()))
        .await
        .unwrap();

    assert_eq!(toggled, CommandDispatch::Delivered);
    assert_eq!(streamed, CommandDispatch::Delivered);
    assert_eq!(blank_key, CommandDispatch::Ignored);

    let commands = core.engine.commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].0, "toggleVideo");
    assert_eq!(commands[1].0, "startRecording");
    assert_eq!(commands[1].1[0]["youtubeStreamKey"], "abcd-efgh");

    core.shutdown().await;
}

// ============================================================================
// Ending Sessions
// ============================================================================

#[tokio::test]
async fn test_double_end_disposes_once() {
    let core = TestSessionCore::start();
    core.controller
        .submit(SessionRequestBuilder::new().build())
        .await
        .unwrap();
    core.engine.join();
    core.wait_for_controls(Option::is_some).await;

    core.controller.end().await.unwrap();
    core.controller.end().await.unwrap();

    assert_eq!(core.engine.disposals(), 1);
    assert_eq!(core.engine.listener_count(), 0);
    assert_eq!(core.controller.snapshot().state, SessionState::Idle);
    assert_eq!(*core.controller.watch_controls().borrow(), None);

    let ended = core
        .notification_titles()
        .await
        .into_iter()
        .filter(|t| t == "Meeting Ended")
        .count();
    assert_eq!(ended, 1);

    core.shutdown().await;
}

#[tokio::test]
async fn test_engine_leave_tears_the_session_down() {
    let core = TestSessionCore::start();
    core.controller
        .submit(SessionRequestBuilder::new().build())
        .await
        .unwrap();
    core.engine.join();
    core.wait_for_controls(Option::is_some).await;

    core.engine.leave();

    let snapshot = core.wait_for_state(SessionState::Idle).await;
    assert!(snapshot.session.is_none());
    core.wait_for_controls(Option::is_none).await;
    assert_eq!(core.engine.disposals(), 1);

    // Events after teardown reach nobody.
    assert_eq!(core.engine.set_audio_muted(true), 0);

    core.shutdown().await;
}

#[tokio::test]
async fn test_engine_leave_before_join_tears_the_session_down() {
    let core = TestSessionCore::start();
    core.controller
        .submit(SessionRequestBuilder::new().build())
        .await
        .unwrap();

    // The engine ends the call before the local participant ever joined.
    core.engine.leave();

    let snapshot = core.wait_for_state(SessionState::Idle).await;
    assert!(snapshot.session.is_none());
    assert_eq!(core.engine.constructions(), 1);
    assert_eq!(core.engine.disposals(), 1);
    assert_eq!(core.engine.listener_count(), 0);
    assert_eq!(*core.controller.watch_controls().borrow(), None);

    let ended = core
        .notification_titles()
        .await
        .into_iter()
        .filter(|t| t == "Meeting Ended")
        .count();
    assert_eq!(ended, 1);

    core.shutdown().await;
}

#[tokio::test]
async fn test_end_while_idle_is_a_no_op() {
    let core = TestSessionCore::start();

    core.controller.end().await.unwrap();

    assert_eq!(core.controller.snapshot().state, SessionState::Idle);
    assert!(core.notification_titles().await.is_empty());

    core.shutdown().await;
}

#[tokio::test]
async fn test_submit_while_active_is_rejected() {
    let core = TestSessionCore::start();
    core.controller
        .submit(SessionRequestBuilder::new().build())
        .await
        .unwrap();

    let result = core
        .controller
        .submit(SessionRequestBuilder::new().build())
        .await;

    assert!(matches!(result, Err(SessionError::InvalidState(_))));
    assert_eq!(core.engine.constructions(), 1);
    assert_eq!(core.controller.snapshot().state, SessionState::Active);

    core.shutdown().await;
}

// ============================================================================
// Failure Paths
// ============================================================================

#[tokio::test]
async fn test_persistence_failure_returns_to_idle_with_error() {
    let fakes = TestCollaborators::default().with_store(MockSessionStore::failing());
    let core = start_with(fakes);

    let result = core
        .controller
        .submit(SessionRequestBuilder::new().build())
        .await;

    assert!(matches!(result, Err(SessionError::Persistence(_))));
    assert_eq!(core.store.attempts(), 1);
    assert_eq!(core.engine.constructions(), 0);
    assert_eq!(core.controller.snapshot().state, SessionState::Idle);

    let shown = core.notifications.list().await.unwrap();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, "Error");
    assert_eq!(shown[0].message, "Failed to create meeting.");

    core.shutdown().await;
}

#[tokio::test]
async fn test_script_load_failure_is_a_resource_error() {
    let fakes = TestCollaborators::default().with_scripts(StaticScriptFetcher::failing());
    let core = start_with(fakes);

    let result = core
        .controller
        .submit(SessionRequestBuilder::new().build())
        .await;

    assert!(matches!(result, Err(SessionError::ResourceLoad(_))));
    assert_eq!(core.engine.constructions(), 0);
    assert_eq!(core.controller.snapshot().state, SessionState::Idle);
    assert!(core
        .notification_titles()
        .await
        .contains(&"Connection Error".to_string()));

    // A later attempt fetches again once the script is reachable.
    core.scripts.set_failing(false);
    core.controller
        .submit(SessionRequestBuilder::new().build())
        .await
        .unwrap();
    assert_eq!(core.scripts.fetches(), 2);
    assert_eq!(core.engine.constructions(), 1);

    core.shutdown().await;
}

#[tokio::test]
async fn test_engine_construction_failure_is_a_resource_error() {
    let fakes =
        TestCollaborators::default().with_engine(FakeEngineRuntime::failing("invalid domain"));
    let core = start_with(fakes);

    let result = core
        .controller
        .submit(SessionRequestBuilder::new().build())
        .await;

    assert!(matches!(result, Err(SessionError::ResourceLoad(_))));
    assert_eq!(core.controller.snapshot().state, SessionState::Idle);

    core.shutdown().await;
}

#[tokio::test]
async fn test_slow_script_load_times_out() {
    let mut config = test_config();
    config.script_load_timeout = Duration::from_millis(50);
    let fakes = TestCollaborators::default()
        .with_scripts(StaticScriptFetcher::new().with_delay(Duration::from_secs(5)));
    let core = TestSessionCore::start_with(config, fakes);

    let result = core
        .controller
        .submit(SessionRequestBuilder::new().build())
        .await;

    assert!(matches!(result, Err(SessionError::ResourceLoad(_))));
    assert_eq!(core.engine.constructions(), 0);
    assert_eq!(core.controller.snapshot().state, SessionState::Idle);

    core.shutdown().await;
}

#[tokio::test]
async fn test_signed_out_submit_is_a_validation_error() {
    let fakes = TestCollaborators::default().with_principals(MockPrincipalSource::signed_out());
    let core = start_with(fakes);

    let result = core
        .controller
        .submit(SessionRequestBuilder::new().build())
        .await;

    assert!(matches!(result, Err(SessionError::Validation(_))));
    assert_eq!(core.store.attempts(), 0);
    assert!(core
        .notification_titles()
        .await
        .contains(&"Auth Error".to_string()));

    core.shutdown().await;
}

// ============================================================================
// Display Names
// ============================================================================

#[tokio::test]
async fn test_default_display_name_sources() {
    let fakes = TestCollaborators::default()
        .with_principals(MockPrincipalSource::signed_out())
        .with_preferences(MemoryPreferences::with_name("Remembered"));
    let core = start_with(fakes);

    assert_eq!(core.controller.default_display_name().await.unwrap(), "Guest");

    core.sign_in("uid-9", Some("Linus"));
    assert_eq!(
        core.controller.default_display_name().await.unwrap(),
        "Remembered"
    );

    core.shutdown().await;
}

#[tokio::test]
async fn test_quick_start_creates_dated_immediate_session() {
    let core = TestSessionCore::start();

    let session = core.controller.quick_start().await.unwrap();

    let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
    assert_eq!(session.title, format!("{INSTANT_TITLE} - {today}"));
    assert_eq!(session.purpose.as_deref(), Some("Quick call"));
    assert!(!session.is_scheduled);
    assert_eq!(core.engine.constructions(), 1);

    core.shutdown().await;
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_cancellation_disposes_active_provider() {
    let core = TestSessionCore::start();
    core.controller
        .submit(SessionRequestBuilder::new().build())
        .await
        .unwrap();

    core.cancel_token.cancel();
    core.wait_for_state(SessionState::Idle).await;

    assert_eq!(core.engine.disposals(), 1);
    assert!(core.controller.is_cancelled());

    core.shutdown().await;
}
