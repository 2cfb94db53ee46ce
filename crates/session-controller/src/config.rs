//! Session core configuration.
//!
//! Configuration is loaded from environment variables. The engine auth token
//! is redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default real-time engine domain.
pub const DEFAULT_ENGINE_DOMAIN: &str = "meet.in8.com";

/// Default origin used to build shareable session links.
pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:5173";

/// Default storage collection for session records.
pub const DEFAULT_SESSION_COLLECTION: &str = "meetings";

/// Default upper bound for script load plus engine construction.
pub const DEFAULT_SCRIPT_LOAD_TIMEOUT_MS: u64 = 15_000;

/// Default notification countdown.
pub const DEFAULT_NOTIFICATION_DURATION_MS: u64 = 5_000;

/// Session core configuration.
#[derive(Clone)]
pub struct Config {
    /// Real-time engine domain, passed to the engine constructor.
    pub engine_domain: String,

    /// URL of the remotely hosted engine script.
    pub engine_script_url: String,

    /// Optional auth token (JWT) passed to the engine constructor.
    /// Protected by `SecretString` to prevent accidental logging.
    pub engine_auth_token: Option<SecretString>,

    /// Origin for shareable links (`{origin}/meeting/{id}`).
    pub app_origin: String,

    /// Storage collection that session records are written to.
    pub session_collection: String,

    /// Engine controls left visible (the engine's `TOOLBAR_BUTTONS`).
    pub toolbar_buttons: Vec<String>,

    /// Skip the engine's own pre-join page.
    pub skip_prejoin: bool,

    /// Upper bound for script load plus engine construction.
    pub script_load_timeout: Duration,

    /// Countdown for notifications that do not set their own.
    pub notification_duration: Duration,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("engine_domain", &self.engine_domain)
            .field("engine_script_url", &self.engine_script_url)
            .field(
                "engine_auth_token",
                &self.engine_auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("app_origin", &self.app_origin)
            .field("session_collection", &self.session_collection)
            .field("toolbar_buttons", &self.toolbar_buttons)
            .field("skip_prejoin", &self.skip_prejoin)
            .field("script_load_timeout", &self.script_load_timeout)
            .field("notification_duration", &self.notification_duration)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine_domain: DEFAULT_ENGINE_DOMAIN.to_string(),
            engine_script_url: script_url_for(DEFAULT_ENGINE_DOMAIN),
            engine_auth_token: None,
            app_origin: DEFAULT_APP_ORIGIN.to_string(),
            session_collection: DEFAULT_SESSION_COLLECTION.to_string(),
            toolbar_buttons: Vec::new(),
            skip_prejoin: true,
            script_load_timeout: Duration::from_millis(DEFAULT_SCRIPT_LOAD_TIMEOUT_MS),
            notification_duration: Duration::from_millis(DEFAULT_NOTIFICATION_DURATION_MS),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let engine_domain = vars
            .get("MEETLINE_ENGINE_DOMAIN")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_ENGINE_DOMAIN.to_string());

        if engine_domain.is_empty() || engine_domain.contains('/') {
            return Err(ConfigError::InvalidValue(format!(
                "MEETLINE_ENGINE_DOMAIN must be a bare host name, got '{engine_domain}'"
            )));
        }

        let engine_script_url = vars
            .get("MEETLINE_ENGINE_SCRIPT_URL")
            .cloned()
            .unwrap_or_else(|| script_url_for(&engine_domain));

        let engine_auth_token = vars
            .get("MEETLINE_ENGINE_AUTH_TOKEN")
            .filter(|s| !s.is_empty())
            .map(|s| SecretString::from(s.clone()));

        let app_origin = vars
            .get("MEETLINE_APP_ORIGIN")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_APP_ORIGIN.to_string());

        let session_collection = vars
            .get("MEETLINE_SESSION_COLLECTION")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SESSION_COLLECTION.to_string());

        let toolbar_buttons = vars
            .get("MEETLINE_TOOLBAR_BUTTONS")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|b| !b.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let skip_prejoin = parse_var(vars, "MEETLINE_SKIP_PREJOIN", true)?;

        let script_load_timeout = Duration::from_millis(parse_var(
            vars,
            "MEETLINE_SCRIPT_LOAD_TIMEOUT_MS",
            DEFAULT_SCRIPT_LOAD_TIMEOUT_MS,
        )?);

        let notification_duration = Duration::from_millis(parse_var(
            vars,
            "MEETLINE_NOTIFICATION_DURATION_MS",
            DEFAULT_NOTIFICATION_DURATION_MS,
        )?);

        if script_load_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "MEETLINE_SCRIPT_LOAD_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            engine_domain,
            engine_script_url,
            engine_auth_token,
            app_origin,
            session_collection,
            toolbar_buttons,
            skip_prejoin,
            script_load_timeout,
            notification_duration,
        })
    }

    /// Shareable link for a persisted session.
    #[must_use]
    pub fn share_link(&self, session_id: &str) -> String {
        format!("{}/meeting/{}", self.app_origin, session_id)
    }
}

fn script_url_for(domain: &str) -> String {
    format!("https://{domain}/external_api.js")
}

fn parse_var<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{name} has invalid value '{raw}'"))),
    }
}
