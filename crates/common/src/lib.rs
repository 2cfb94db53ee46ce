//! Common utilities and types shared across Meetline components.

#![warn(clippy::pedantic)]

/// Module for collaborator error types
pub mod error;

/// Module for identifier newtypes
pub mod types;

/// Module for common configuration
pub mod config;

/// Module for secret types that prevent accidental logging
pub mod secret;
