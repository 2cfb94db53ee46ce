//! Logging and metrics for the session core.
//!
//! # Privacy by Default
//!
//! Actor loops use `#[instrument(skip_all)]` with explicit safe fields.
//! Passwords and engine auth tokens are `SecretString` and never logged.
//! Metric labels are bounded (see [`metrics`]).
//!
//! # Log Targets
//!
//! | Target | Component |
//! |--------|-----------|
//! | `session.actor.controller` | `SessionControllerActor` |
//! | `session.actor.notifications` | `NotificationCenter` |
//! | `session.provider.adapter` | `ProviderAdapter` |
//! | `session.provider.loader` | `ScriptLoader` |
//! | `session.control_sync` | `ControlSync` |

pub mod metrics;

pub use metrics::init_metrics_recorder;

use common::config::ObservabilityConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `config.log_level` is used.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), String> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| format!("Failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_second_tracing_install_is_rejected() {
        let config = ObservabilityConfig {
            log_level: "debug".to_string(),
            json_logs: true,
        };

        // The first call may race other installers in this binary; the second never succeeds.
        let _ = init_tracing(&config);
        let err = init_tracing(&ObservabilityConfig::default()).unwrap_err();
        assert!(err.contains("Failed to install tracing subscriber"));
    }
}
