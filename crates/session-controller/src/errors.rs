//! Session core error types.
//!
//! Every user-facing failure maps to an `error` notification via
//! [`SessionError::notification`]. Internal details are logged but never
//! placed in notification text.

use crate::provider::AdapterError;
use thiserror::Error;

/// Session core error type.
///
/// Failure classes:
/// - `Validation`: no signed-in principal
/// - `Persistence`: storage collaborator rejected the write
/// - `ResourceLoad`: engine script failed to load or the engine could not be constructed
/// - `AlreadyInitializing`: reentrant construction attempt
/// - `InvalidState`: operation not valid in the current session state
/// - `Config`, `Internal`: local failures
#[derive(Debug, Error)]
pub enum SessionError {
    /// Request failed validation (missing principal).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage write failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Engine resource failed to load or construct.
    #[error("Resource load error: {0}")]
    ResourceLoad(String),

    /// A construction request arrived while one was already in flight.
    #[error("Provider is already initializing")]
    AlreadyInitializing,

    /// Operation is not valid in the current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (actor channel closed, shutdown in progress).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Title and message for the `error` notification shown to the user.
    #[must_use]
    pub fn notification(&self) -> (&'static str, &'static str) {
        match self {
            SessionError::Validation(_) => ("Auth Error", "You must be logged in."),
            SessionError::Persistence(_) => ("Error", "Failed to create meeting."),
            SessionError::ResourceLoad(_) => ("Connection Error", "Could not start the meeting."),
            SessionError::AlreadyInitializing | SessionError::InvalidState(_) => {
                ("Busy", "A meeting is already in progress.")
            }
            SessionError::Config(_) | SessionError::Internal(_) => {
                ("Error", "An internal error occurred.")
            }
        }
    }

    /// Bounded label for failure metrics.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            SessionError::Validation(_) => "validation",
            SessionError::Persistence(_) => "persistence",
            SessionError::ResourceLoad(_) => "resource_load",
            SessionError::AlreadyInitializing => "already_initializing",
            SessionError::InvalidState(_) => "invalid_state",
            SessionError::Config(_) => "config",
            SessionError::Internal(_) => "internal",
        }
    }
}

impl From<AdapterError> for SessionError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::AlreadyInitializing => SessionError::AlreadyInitializing,
            AdapterError::ResourceLoad(msg) | AdapterError::Construction(msg) => {
                SessionError::ResourceLoad(msg)
            }
            AdapterError::Disposed => {
                SessionError::InvalidState("provider already disposed".to_string())
            }
        }
    }
}

impl From<crate::config::ConfigError> for SessionError {
    fn from(err: crate::config::ConfigError) -> Self {
        SessionError::Config(err.to_string())
    }
}
