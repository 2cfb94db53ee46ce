//! Control commands and their engine mapping.

use serde_json::{json, Value};

/// Command issued by the UI layer to the active provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    ToggleAudio,
    ToggleVideo,
    ToggleScreenShare,
    ToggleRaisedHand,
    /// Start a live stream with the given stream key.
    StartStream(String),
    StopStream,
}

/// Outcome of [`issue_command`](super::ProviderAdapter::issue_command).
///
/// `Ignored` is not an error: commands issued before readiness (or with an
/// unusable argument) are dropped and logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandDispatch {
    Delivered,
    Ignored,
}

impl ControlCommand {
    /// Bounded label for logs and metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::ToggleAudio => "toggle_audio",
            Self::ToggleVideo => "toggle_video",
            Self::ToggleScreenShare => "toggle_screen_share",
            Self::ToggleRaisedHand => "toggle_raised_hand",
            Self::StartStream(_) => "start_stream",
            Self::StopStream => "stop_stream",
        }
    }

    /// Engine command name and arguments, or `None` if the command carries
    /// nothing the engine can act on.
    #[must_use]
    pub fn engine_call(&self) -> Option<(&'static str, Vec<Value>)> {
        match self {
            Self::ToggleAudio => Some(("toggleAudio", Vec::new())),
            Self::ToggleVideo => Some(("toggleVideo", Vec::new())),
            Self::ToggleScreenShare => Some(("toggleShareScreen", Vec::new())),
            Self::ToggleRaisedHand => Some(("toggleRaiseHand", Vec::new())),
            Self::StartStream(key) => {
                let key = key.trim();
                if key.is_empty() {
                    return None;
                }
                Some((
                    "startRecording",
                    vec![json!({ "mode": "stream", "youtubeStreamKey": key })],
                ))
            }
            Self::StopStream => Some(("stopRecording", vec![json!("stream")])),
        }
    }
}
