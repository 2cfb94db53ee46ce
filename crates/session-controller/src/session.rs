//! Session data model and request normalization.
//!
//! A [`SessionRequest`] is what the user submitted. [`SessionDraft`] is the
//! normalized form (title defaulted, name resolved, invitees split, schedule
//! resolved). Once persisted the draft becomes a [`Session`].

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use common::secret::SecretString;
use common::types::{PrincipalId, SessionId};
use serde::Serialize;

use crate::collaborators::Principal;

/// Title used for an untitled immediate session.
pub const INSTANT_TITLE: &str = "Instant Meeting";

/// Title used for an untitled scheduled session.
pub const SCHEDULED_TITLE: &str = "Scheduled Meeting";

/// Display name used when nothing better is known.
pub const FALLBACK_DISPLAY_NAME: &str = "User";

/// Display name offered to forms when nobody is signed in.
pub const GUEST_DISPLAY_NAME: &str = "Guest";

/// A user's request to start or schedule a session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub display_name: String,
    pub title: String,
    pub purpose: Option<String>,
    /// Passed only to the engine, never persisted.
    pub password: Option<SecretString>,
    pub schedule_date: Option<NaiveDate>,
    pub schedule_time: Option<NaiveTime>,
    /// Raw comma-separated invitee list.
    pub invitees: Option<String>,
    pub mic_enabled_on_join: bool,
    pub camera_enabled_on_join: bool,
    pub waiting_room_enabled: bool,
}

impl Default for SessionRequest {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            title: String::new(),
            purpose: None,
            password: None,
            schedule_date: None,
            schedule_time: None,
            invitees: None,
            mic_enabled_on_join: true,
            camera_enabled_on_join: true,
            waiting_room_enabled: true,
        }
    }
}

impl SessionRequest {
    /// One-click immediate session dated `today`.
    #[must_use]
    pub fn quick_start(today: NaiveDate) -> Self {
        Self {
            title: format!("{INSTANT_TITLE} - {}", today.format("%Y-%m-%d")),
            purpose: Some("Quick call".to_string()),
            ..Self::default()
        }
    }

    /// Local wall-clock schedule. Present only when both date and time are set.
    #[must_use]
    pub fn schedule_at(&self) -> Option<NaiveDateTime> {
        match (self.schedule_date, self.schedule_time) {
            (Some(date), Some(time)) => Some(date.and_time(time)),
            _ => None,
        }
    }
}

/// Resolve the display name: requested, remembered, principal, fallback.
#[must_use]
pub fn resolve_display_name(
    requested: &str,
    remembered: Option<&str>,
    principal: &Principal,
) -> String {
    [
        Some(requested),
        remembered,
        principal.display_name.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|name| !name.is_empty())
    .unwrap_or(FALLBACK_DISPLAY_NAME)
    .to_string()
}

/// Split a comma-separated invitee list, dropping blanks.
#[must_use]
pub fn split_invitees(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Convert a local wall-clock schedule to UTC, keeping it only if it lies
/// after `now`. Nonexistent local times (DST gaps) resolve to `None`.
#[must_use]
pub fn resolve_schedule(local: NaiveDateTime, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&local)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
        .filter(|at| *at > now)
}

/// Per-session join options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    pub waiting_room_enabled: bool,
    pub mute_on_entry: bool,
    pub camera_off_on_entry: bool,
}

/// Normalized request, ready to persist.
#[derive(Debug, Clone)]
pub struct SessionDraft {
    pub title: String,
    pub purpose: Option<String>,
    pub host_name: String,
    pub invitees: Vec<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub options: SessionOptions,
    pub password: Option<SecretString>,
}

impl SessionDraft {
    /// Normalize `request` for `principal` at time `now`.
    #[must_use]
    pub fn from_request(
        request: &SessionRequest,
        principal: &Principal,
        remembered_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let scheduled_for = request
            .schedule_at()
            .and_then(|local| resolve_schedule(local, now));

        let title = match request.title.trim() {
            "" if scheduled_for.is_some() => SCHEDULED_TITLE.to_string(),
            "" => INSTANT_TITLE.to_string(),
            title => title.to_string(),
        };

        let purpose = request
            .purpose
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Self {
            title,
            purpose,
            host_name: resolve_display_name(&request.display_name, remembered_name, principal),
            invitees: split_invitees(request.invitees.as_deref()),
            scheduled_for,
            options: SessionOptions {
                waiting_room_enabled: request.waiting_room_enabled,
                mute_on_entry: !request.mic_enabled_on_join,
                camera_off_on_entry: !request.camera_enabled_on_join,
            },
            password: request.password.clone(),
        }
    }

    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.scheduled_for.is_some()
    }

    /// Storage record for this draft. The password is not part of it.
    #[must_use]
    pub fn record<'a>(
        &'a self,
        created_by: &'a PrincipalId,
        created_at: DateTime<Utc>,
    ) -> SessionRecord<'a> {
        SessionRecord {
            title: &self.title,
            purpose: self.purpose.as_deref(),
            host_name: &self.host_name,
            created_by,
            created_at,
            is_scheduled: self.is_scheduled(),
            scheduled_for: self.scheduled_for,
            invitees: &self.invitees,
            options: &self.options,
        }
    }

    /// The persisted session.
    #[must_use]
    pub fn into_session(
        self,
        id: SessionId,
        created_by: PrincipalId,
        created_at: DateTime<Utc>,
    ) -> Session {
        Session {
            id,
            is_scheduled: self.is_scheduled(),
            title: self.title,
            purpose: self.purpose,
            host_name: self.host_name,
            created_by,
            created_at,
            scheduled_for: self.scheduled_for,
            invitees: self.invitees,
            options: self.options,
        }
    }
}

/// Record written to the storage collaborator.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord<'a> {
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<&'a str>,
    pub host_name: &'a str,
    pub created_by: &'a PrincipalId,
    pub created_at: DateTime<Utc>,
    pub is_scheduled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    pub invitees: &'a [String],
    pub options: &'a SessionOptions,
}

/// A persisted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub title: String,
    pub purpose: Option<String>,
    pub host_name: String,
    pub created_by: PrincipalId,
    pub created_at: DateTime<Utc>,
    pub is_scheduled: bool,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub invitees: Vec<String>,
    pub options: SessionOptions,
}

/// Session controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Validating,
    Persisting,
    Active,
    Scheduled,
    Ending,
}

impl SessionState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Persisting => "persisting",
            Self::Active => "active",
            Self::Scheduled => "scheduled",
            Self::Ending => "ending",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub session: Option<Session>,
    pub share_link: Option<String>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            session: None,
            share_link: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn principal(display_name: Option<&str>) -> Principal {
        Principal::new("uid-42", display_name.map(str::to_string))
    }

    fn far_future() -> (NaiveDate, NaiveTime) {
        (
            NaiveDate::from_ymd_opt(2099, 6, 1).unwrap(),
            NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
        )
    }

    #[test]
    fn test_empty_title_defaults_to_instant() {
        let request = SessionRequest {
            title: "   ".to_string(),
            ..SessionRequest::default()
        };
        let draft = SessionDraft::from_request(&request, &principal(None), None, Utc::now());
        assert_eq!(draft.title, INSTANT_TITLE);
        assert!(!draft.is_scheduled());
    }

    #[test]
    fn test_empty_title_defaults_to_scheduled() {
        let (date, time) = far_future();
        let request = SessionRequest {
            schedule_date: Some(date),
            schedule_time: Some(time),
            ..SessionRequest::default()
        };
        let draft = SessionDraft::from_request(&request, &principal(None), None, Utc::now());
        assert_eq!(draft.title, SCHEDULED_TITLE);
        assert!(draft.is_scheduled());
    }

    #[test]
    fn test_title_is_trimmed() {
        let request = SessionRequest {
            title: "  Weekly sync ".to_string(),
            ..SessionRequest::default()
        };
        let draft = SessionDraft::from_request(&request, &principal(None), None, Utc::now());
        assert_eq!(draft.title, "Weekly sync");
    }

    #[test]
    fn test_partial_schedule_is_immediate() {
        let (date, time) = far_future();
        for request in [
            SessionRequest {
                schedule_date: Some(date),
                ..SessionRequest::default()
            },
            SessionRequest {
                schedule_time: Some(time),
                ..SessionRequest::default()
            },
        ] {
            assert!(request.schedule_at().is_none());
            let draft = SessionDraft::from_request(&request, &principal(None), None, Utc::now());
            assert!(draft.scheduled_for.is_none());
            assert!(!draft.is_scheduled());
        }
    }

    #[test]
    fn test_past_schedule_is_immediate() {
        let local = NaiveDate::from_ymd_opt(2001, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert!(resolve_schedule(local, Utc::now()).is_none());
    }

    #[test]
    fn test_future_schedule_converts_to_utc() {
        let now = Utc::now();
        let local = (Local::now() + Duration::hours(3)).naive_local();
        let at = resolve_schedule(local, now).unwrap();
        assert!(at > now + Duration::hours(2));
    }

    #[test]
    fn test_display_name_resolution_order() {
        let p = principal(Some("Ada Lovelace"));
        assert_eq!(resolve_display_name(" Ada ", Some("Remembered"), &p), "Ada");
        assert_eq!(resolve_display_name("", Some("Remembered"), &p), "Remembered");
        assert_eq!(resolve_display_name("", None, &p), "Ada Lovelace");
        assert_eq!(resolve_display_name("  ", Some(" "), &principal(None)), "User");
    }

    #[test]
    fn test_invitees_split_and_filtered() {
        assert_eq!(
            split_invitees(Some("a@x.io, b@x.io,, ,c@x.io ")),
            vec!["a@x.io", "b@x.io", "c@x.io"]
        );
        assert!(split_invitees(None).is_empty());
        assert!(split_invitees(Some(" , ")).is_empty());
    }

    #[test]
    fn test_options_invert_join_flags() {
        let request = SessionRequest {
            mic_enabled_on_join: false,
            camera_enabled_on_join: true,
            waiting_room_enabled: false,
            ..SessionRequest::default()
        };
        let draft = SessionDraft::from_request(&request, &principal(None), None, Utc::now());
        assert_eq!(
            draft.options,
            SessionOptions {
                waiting_room_enabled: false,
                mute_on_entry: true,
                camera_off_on_entry: false,
            }
        );
    }

    #[test]
    fn test_record_shape_omits_password() {
        let request = SessionRequest {
            title: "Design review".to_string(),
            password: Some(SecretString::from("s3cret".to_string())),
            invitees: Some("a@x.io".to_string()),
            ..SessionRequest::default()
        };
        let p = principal(Some("Ada"));
        let draft = SessionDraft::from_request(&request, &p, None, Utc::now());
        let created_at = DateTime::parse_from_rfc3339("2024-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let value = serde_json::to_value(draft.record(&p.id, created_at)).unwrap();

        assert_eq!(
            value,
            json!({
                "title": "Design review",
                "hostName": "Ada",
                "createdBy": "uid-42",
                "createdAt": "2024-03-01T10:00:00Z",
                "isScheduled": false,
                "invitees": ["a@x.io"],
                "options": {
                    "waitingRoomEnabled": true,
                    "muteOnEntry": false,
                    "cameraOffOnEntry": false
                }
            })
        );
        assert!(!value.to_string().contains("s3cret"));
    }

    #[test]
    fn test_quick_start_title() {
        let request = SessionRequest::quick_start(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        assert_eq!(request.title, "Instant Meeting - 2024-03-09");
        assert_eq!(request.purpose.as_deref(), Some("Quick call"));
        assert!(request.schedule_at().is_none());
    }
}
