//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports [`secrecy`] types. Meeting passwords and engine auth tokens are
//! carried as `SecretString` so that deriving `Debug` on a request or config
//! struct never leaks them into `tracing` output.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct JoinOptions {
//!     room: String,
//!     password: Option<SecretString>,
//! }
//!
//! let opts = JoinOptions {
//!     room: "standup".to_string(),
//!     password: Some(SecretString::from("hunter2")),
//! };
//!
//! assert!(!format!("{opts:?}").contains("hunter2"));
//! assert_eq!(opts.password.as_ref().map(|p| p.expose_secret()), Some("hunter2"));
//! ```
//!
//! Call `expose_secret()` only at the boundary that needs the raw value
//! (building the engine option object). Never persist an exposed secret.

pub use secrecy::{ExposeSecret, SecretString};
