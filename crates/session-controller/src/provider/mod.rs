//! External real-time engine integration.
//!
//! ```text
//! ScriptLoader (memoized by URL, lease-counted)
//!     │ ScriptLease
//!     ▼
//! ProviderAdapter ──construct──▶ EngineRuntime ──▶ Box<dyn EngineInstance>
//!     │ EventHub (typed subscriptions)
//!     ▼
//! ControlSync / SessionController
//! ```
//!
//! # Modules
//!
//! - [`adapter`] - `ProviderAdapter` lifecycle and command gating
//! - [`commands`] - `ControlCommand` to engine command mapping
//! - [`engine`] - Engine contract and constructor options
//! - [`events`] - Typed events, `EventHub`, `Subscription`
//! - [`loader`] - `ScriptLoader` and script fetchers

pub mod adapter;
pub mod commands;
pub mod engine;
pub mod events;
pub mod loader;

pub use adapter::{
    AdapterError, AdapterSignal, AdapterState, ProviderAdapter, ProviderConfig, ProviderEndpoint,
};
pub use commands::{CommandDispatch, ControlCommand};
pub use engine::{
    EngineConfig, EngineError, EngineInstance, EngineListener, EngineRuntime, ListenerId,
};
pub use events::{
    ControlSource, EventHandler, EventHub, ProviderEvent, ProviderEventKind, Subscription,
};
pub use loader::{
    HttpScriptFetcher, LoadedScript, ScriptFetcher, ScriptLease, ScriptLoadError, ScriptLoader,
};
