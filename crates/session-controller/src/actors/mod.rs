//! Actor model implementation for the session core.
//!
//! ```text
//! SessionControllerActor (one per client)
//! ├── owns session state (watch channel)
//! ├── owns at most one ProviderAdapter
//! │   └── ControlSync (while the provider is ready)
//! └── reports outcomes to NotificationCenter
//!
//! NotificationCenter (one per client)
//! └── one countdown task per running notification
//! ```
//!
//! # Key Design Decisions
//!
//! - **Single owner**: only the controller actor changes session state
//! - **CancellationToken propagation**: adapters and countdowns use child tokens
//! - **Message passing**: requests over `tokio::sync::mpsc`, replies over `oneshot`
//!
//! # Modules
//!
//! - [`controller`] - `SessionControllerActor` and its handle
//! - [`notifications`] - `NotificationCenter` and its handle
//! - [`messages`] - Message types for actor communication

pub mod controller;
pub mod messages;
pub mod notifications;

pub use controller::{SessionControllerActor, SessionControllerHandle};
pub use messages::*;
pub use notifications::{NotificationCenter, NotificationCenterHandle};
