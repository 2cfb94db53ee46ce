//! In-memory storage, identity and preference collaborators.
//!
//! # Example
//!
//! ```rust,ignore
//! use session_test_utils::{MockPrincipalSource, MockSessionStore};
//!
//! let store = MockSessionStore::new();
//! store.set_failing(true);
//!
//! let principals = MockPrincipalSource::signed_in("uid-1", Some("Ada"));
//! principals.sign_out();
//! ```

use async_trait::async_trait;
use common::error::CollaboratorError;
use session_controller::collaborators::{
    DisplayNamePreferences, Principal, PrincipalSource, SessionStore,
};
use std::sync::Mutex;

/// Storage collaborator that keeps records in memory.
#[derive(Debug, Default)]
pub struct MockSessionStore {
    inner: Mutex<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    records: Vec<(String, serde_json::Value)>,
    failing: bool,
    attempts: usize,
}

impl MockSessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects every write.
    #[must_use]
    pub fn failing() -> Self {
        let store = Self::new();
        store.set_failing(true);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().unwrap().failing = failing;
    }

    /// Number of successful writes.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    /// Number of write attempts, including failures.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.inner.lock().unwrap().attempts
    }

    /// All stored `(collection, record)` pairs, in write order.
    #[must_use]
    pub fn records(&self) -> Vec<(String, serde_json::Value)> {
        self.inner.lock().unwrap().records.clone()
    }

    /// The most recent record.
    #[must_use]
    pub fn last_record(&self) -> Option<serde_json::Value> {
        self.inner
            .lock()
            .unwrap()
            .records
            .last()
            .map(|(_, record)| record.clone())
    }
}

#[async_trait]
impl SessionStore for MockSessionStore {
    async fn create(
        &self,
        collection: &str,
        record: serde_json::Value,
    ) -> Result<String, CollaboratorError> {
        let mut inner = self.inner.lock().unwrap();
        inner.attempts += 1;
        if inner.failing {
            return Err(CollaboratorError::Storage(
                "PERMISSION_DENIED: missing or insufficient permissions".to_string(),
            ));
        }
        inner.records.push((collection.to_string(), record));
        Ok(format!("session-{}", inner.records.len()))
    }
}

/// Principal source with a settable signed-in user.
#[derive(Debug, Default)]
pub struct MockPrincipalSource {
    principal: Mutex<Option<Principal>>,
}

impl MockPrincipalSource {
    #[must_use]
    pub fn signed_in(id: &str, display_name: Option<&str>) -> Self {
        Self {
            principal: Mutex::new(Some(Principal::new(id, display_name.map(str::to_string)))),
        }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn sign_out(&self) {
        *self.principal.lock().unwrap() = None;
    }

    pub fn sign_in(&self, principal: Principal) {
        *self.principal.lock().unwrap() = Some(principal);
    }
}

impl PrincipalSource for MockPrincipalSource {
    fn current_principal(&self) -> Option<Principal> {
        self.principal.lock().unwrap().clone()
    }
}

/// Display-name preferences held in memory.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    name: Mutex<Option<String>>,
}

impl MemoryPreferences {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_name(name: &str) -> Self {
        Self {
            name: Mutex::new(Some(name.to_string())),
        }
    }

    /// What was last remembered.
    #[must_use]
    pub fn remembered(&self) -> Option<String> {
        self.name.lock().unwrap().clone()
    }
}

impl DisplayNamePreferences for MemoryPreferences {
    fn load(&self) -> Option<String> {
        self.remembered()
    }

    fn remember(&self, display_name: &str) {
        *self.name.lock().unwrap() = Some(display_name.to_string());
    }
}
