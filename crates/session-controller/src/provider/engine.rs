//! Contract for the external real-time engine.
//!
//! The engine is consumed through two traits: [`EngineRuntime`] constructs
//! instances from a loaded script, and [`EngineInstance`] is the live handle
//! owned by exactly one [`ProviderAdapter`](super::ProviderAdapter).

use common::secret::{ExposeSecret, SecretString};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use thiserror::Error;

use super::adapter::ProviderConfig;
use super::loader::LoadedScript;

/// Callback registered on an engine instance. Receives the raw event payload.
pub type EngineListener = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Identifier returned by [`EngineInstance::add_event_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Engine construction failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("engine construction failed: {0}")]
pub struct EngineError(pub String);

/// One live engine instance (the opaque provider handle).
pub trait EngineInstance: Send + Sync {
    /// Register a listener for a named engine event.
    fn add_event_listener(&mut self, event: &str, listener: EngineListener) -> ListenerId;

    /// Remove a previously registered listener.
    fn remove_event_listener(&mut self, event: &str, id: ListenerId);

    /// Execute a named engine command.
    fn execute_command(&mut self, name: &str, args: &[serde_json::Value]);

    /// Current microphone mute flag.
    fn is_audio_muted(&self) -> bool;

    /// Current camera mute flag.
    fn is_video_muted(&self) -> bool;

    /// Tear down the instance.
    fn dispose(&mut self);
}

/// Factory for engine instances (the `construct` entry point of the engine script).
pub trait EngineRuntime: Send + Sync {
    /// Construct an instance. Construction does not imply the local
    /// participant has joined.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the engine rejects the configuration.
    fn construct(
        &self,
        script: &LoadedScript,
        domain: &str,
        config: &EngineConfig,
        auth_token: Option<&SecretString>,
    ) -> Result<Box<dyn EngineInstance>, EngineError>;
}

/// Option object handed to the engine constructor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Room name; always the session id.
    pub room_name: String,
    pub user_info: UserInfo,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_password"
    )]
    pub password: Option<SecretString>,
    pub config_overwrite: ConfigOverwrite,
    pub interface_config_overwrite: InterfaceConfigOverwrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverwrite {
    pub start_with_audio_muted: bool,
    pub start_with_video_muted: bool,
    pub prejoin_page_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceConfigOverwrite {
    #[serde(rename = "TOOLBAR_BUTTONS")]
    pub toolbar_buttons: Vec<String>,
    #[serde(rename = "SHOW_JITSI_WATERMARK")]
    pub show_watermark: bool,
}

impl From<&ProviderConfig> for EngineConfig {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            room_name: config.room_id.to_string(),
            user_info: UserInfo {
                display_name: config.display_name.clone(),
            },
            password: config.password.clone(),
            config_overwrite: ConfigOverwrite {
                start_with_audio_muted: config.start_muted,
                start_with_video_muted: config.start_video_off,
                prejoin_page_enabled: !config.skip_prejoin,
            },
            interface_config_overwrite: InterfaceConfigOverwrite {
                toolbar_buttons: config.visible_controls.clone(),
                show_watermark: false,
            },
        }
    }
}

// The engine needs the plain password; nothing else serializes this struct.
fn serialize_password<S: Serializer>(
    password: &Option<SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match password {
        Some(secret) => serializer.serialize_str(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}
