//! Meetline Session Core Library
//!
//! Orchestrates one real-time call session on top of an external
//! real-time-communication engine:
//!
//! - Session state machine: create, schedule, run and end a meeting
//! - Provider adapter: load the engine script, construct exactly one engine
//!   instance per active session, bridge commands and events, dispose
//! - Control-state mirror of the engine's mic/video/stream flags
//! - Countdown notifications that pause and resume without losing time
//!
//! # Architecture
//!
//! ```text
//! SessionControllerHandle ──mpsc──▶ SessionControllerActor
//!                                     ├── SessionStore / PrincipalSource (collaborators)
//!                                     ├── ProviderAdapter ──▶ EngineRuntime
//!                                     │     └── ScriptLoader (memoized, lease-counted)
//!                                     └── ControlSync ──watch──▶ UI
//! NotificationCenterHandle ──mpsc──▶ NotificationCenter ──broadcast──▶ UI
//! ```
//!
//! # Key Design Decisions
//!
//! - **Readiness is the join event**: constructing the engine never implies
//!   readiness; only `videoConferenceJoined` does
//! - **Commands before readiness are dropped**: `CommandDispatch::Ignored`,
//!   never an error and never queued
//! - **Dispose cancels everything**: a script load that completes after
//!   disposal is discarded
//!
//! # Modules
//!
//! - [`actors`] - Session controller and notification center actors
//! - [`collaborators`] - Storage, principal and preference interfaces
//! - [`config`] - Configuration from environment
//! - [`control_sync`] - Control-state mirror
//! - [`errors`] - Error types and user-facing notification mapping
//! - [`notification`] - Notification data model
//! - [`observability`] - Tracing setup and metrics
//! - [`provider`] - Engine contract, script loader, provider adapter
//! - [`session`] - Session data model and request normalization

pub mod actors;
pub mod collaborators;
pub mod config;
pub mod control_sync;
pub mod errors;
pub mod notification;
pub mod observability;
pub mod provider;
pub mod session;

pub use actors::{
    NotificationCenter, NotificationCenterHandle, SessionControllerActor, SessionControllerHandle,
};
pub use errors::SessionError;
