//! Interfaces to the collaborators that live outside the session core.
//!
//! - [`SessionStore`]: create a record, get back an id
//! - [`PrincipalSource`]: who is signed in right now
//! - [`DisplayNamePreferences`]: the remembered display name
//! - [`EngineRuntime`] and [`ScriptFetcher`]: the real-time engine and its script
//!
//! Traits (rather than concrete clients) so the controller can be tested
//! against in-memory fakes.

use common::error::CollaboratorError;
use common::types::PrincipalId;
use std::sync::Arc;

use crate::provider::{EngineRuntime, ScriptFetcher};

/// The signed-in principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Identity provider user id.
    pub id: PrincipalId,
    /// Display name from the identity provider, if any.
    pub display_name: Option<String>,
}

impl Principal {
    /// Create a principal.
    #[must_use]
    pub fn new(id: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            id: PrincipalId(id.into()),
            display_name,
        }
    }
}

/// Persisted-record storage.
///
/// Only record creation is needed by the session core.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a record in `collection` and return its storage-assigned id.
    async fn create(
        &self,
        collection: &str,
        record: serde_json::Value,
    ) -> Result<String, CollaboratorError>;
}

/// Source of the current principal.
pub trait PrincipalSource: Send + Sync {
    /// The principal currently signed in, or `None`.
    fn current_principal(&self) -> Option<Principal>;
}

/// Storage for the user's preferred display name.
pub trait DisplayNamePreferences: Send + Sync {
    /// Previously remembered display name.
    fn load(&self) -> Option<String>;

    /// Remember a display name for the next session.
    fn remember(&self, display_name: &str);
}

/// Preferences backend that remembers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPreferences;

impl DisplayNamePreferences for NoPreferences {
    fn load(&self) -> Option<String> {
        None
    }

    fn remember(&self, _display_name: &str) {}
}

/// Bundle of collaborators handed to the session controller.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn SessionStore>,
    pub principals: Arc<dyn PrincipalSource>,
    pub preferences: Arc<dyn DisplayNamePreferences>,
    pub engine: Arc<dyn EngineRuntime>,
    pub scripts: Arc<dyn ScriptFetcher>,
}
