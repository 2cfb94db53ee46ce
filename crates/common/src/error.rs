//! Errors reported by external collaborators (storage, identity, transport).
//!
//! Collaborators live outside the session core, so their failures are
//! carried as opaque strings. The session core maps them onto its own
//! taxonomy and never shows the inner text to users.

use thiserror::Error;

/// Failure reported by a collaborator the session core depends on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// Record storage write failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Network transport error (e.g., fetching a remote resource)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CollaboratorError {
    fn from(err: serde_json::Error) -> Self {
        CollaboratorError::Serialization(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            CollaboratorError::Storage("quota exceeded".to_string()).to_string(),
            "Storage error: quota exceeded"
        );
        assert_eq!(
            CollaboratorError::Transport("connection reset".to_string()).to_string(),
            "Transport error: connection reset"
        );
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let converted: CollaboratorError = err.into();
        assert!(matches!(converted, CollaboratorError::Serialization(_)));
    }
}
