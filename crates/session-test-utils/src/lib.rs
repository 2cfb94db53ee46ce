//! # Session Test Utilities
//!
//! Shared test utilities for the Meetline session core.
//!
//! This crate provides in-memory collaborators and fixtures so the session
//! controller can be exercised without storage, identity or a real engine.
//!
//! ## Modules
//!
//! - `mock_store` - Storage, principal source and display-name preferences
//! - `mock_engine` - Fake real-time engine and script fetcher
//! - `fixtures` - Request builder, test configuration, spawned session core
//!
//! ## Usage
//!
//! ```rust,ignore
//! use session_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let core = TestSessionCore::start();
//!
//!     let session = core
//!         .controller
//!         .submit(SessionRequestBuilder::new().title("Standup").build())
//!         .await
//!         .unwrap();
//!
//!     core.engine.join();
//!     assert_eq!(core.engine.constructions(), 1);
//! }
//! ```

pub mod fixtures;
pub mod mock_engine;
pub mod mock_store;

pub use fixtures::*;
pub use mock_engine::{FakeEngineInstance, FakeEngineRuntime, StaticScriptFetcher};
pub use mock_store::{MemoryPreferences, MockPrincipalSource, MockSessionStore};
