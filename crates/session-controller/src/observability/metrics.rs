//! Metrics definitions for the session core.
//!
//! All metrics follow Prometheus naming conventions:
//! - `meetline_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Every label is bounded by code:
//! - `kind`: 2 session kinds (immediate, scheduled), 4 notification kinds
//! - `reason`: 7 failure reasons (`SessionError::reason`)
//! - `command`: 6 commands, `outcome`: delivered, ignored
//! - script `outcome`: fetched, cached, failed

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return its handle.
///
/// Must be called before any metrics are recorded. Provider readiness
/// buckets span a fast join (100ms) to a slow network (30s).
///
/// # Errors
///
/// Returns error if a recorder is already installed.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("meetline_provider_ready_seconds".to_string()),
            &[0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 15.000, 30.000],
        )
        .map_err(|e| format!("Failed to set provider readiness buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Session Lifecycle
// ============================================================================

/// Metric: `meetline_sessions_created_total`
/// Labels: `kind` (immediate, scheduled)
pub fn record_session_created(kind: &'static str) {
    counter!("meetline_sessions_created_total", "kind" => kind).increment(1);
}

/// Metric: `meetline_session_failures_total`
/// Labels: `reason`
pub fn record_session_failure(reason: &'static str) {
    counter!("meetline_session_failures_total", "reason" => reason).increment(1);
}

// ============================================================================
// Provider
// ============================================================================

/// Metric: `meetline_provider_constructions_total`
pub fn record_provider_construction() {
    counter!("meetline_provider_constructions_total").increment(1);
}

/// Metric: `meetline_provider_disposals_total`
///
/// Counted only for adapters that held a constructed instance, so it pairs
/// one-to-one with constructions.
pub fn record_provider_disposal() {
    counter!("meetline_provider_disposals_total").increment(1);
}

/// Metric: `meetline_provider_ready_seconds`
///
/// Time from `initialize` to the engine's join confirmation.
pub fn record_provider_ready(duration: Duration) {
    histogram!("meetline_provider_ready_seconds").record(duration.as_secs_f64());
}

/// Metric: `meetline_commands_total`
/// Labels: `command`, `outcome` (delivered, ignored)
pub fn record_command(command: &'static str, outcome: &'static str) {
    counter!("meetline_commands_total", "command" => command, "outcome" => outcome).increment(1);
}

/// Metric: `meetline_script_loads_total`
/// Labels: `outcome` (fetched, cached, failed)
pub fn record_script_load(outcome: &'static str) {
    counter!("meetline_script_loads_total", "outcome" => outcome).increment(1);
}

// ============================================================================
// Notifications
// ============================================================================

/// Metric: `meetline_notifications_total`
/// Labels: `kind` (success, error, warning, info)
pub fn record_notification(kind: &'static str) {
    counter!("meetline_notifications_total", "kind" => kind).increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use metrics_util::{CompositeKey, MetricKind};

    fn counter_value(
        snapshot: &[(CompositeKey, Option<metrics::Unit>, Option<metrics::SharedString>, DebugValue)],
        name: &str,
        labels: &[(&str, &str)],
    ) -> Option<u64> {
        snapshot.iter().find_map(|(key, _, _, value)| {
            let matches = key.kind() == MetricKind::Counter
                && key.key().name() == name
                && labels.iter().all(|(k, v)| {
                    key.key()
                        .labels()
                        .any(|label| label.key() == *k && label.value() == *v)
                });
            match (matches, value) {
                (true, DebugValue::Counter(n)) => Some(*n),
                _ => None,
            }
        })
    }

    #[test]
    fn test_counters_record_with_labels() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_session_created("immediate");
            record_session_created("immediate");
            record_session_failure("persistence");
            record_command("toggle_audio", "ignored");
            record_script_load("cached");
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(
            counter_value(&snapshot, "meetline_sessions_created_total", &[("kind", "immediate")]),
            Some(2)
        );
        assert_eq!(
            counter_value(&snapshot, "meetline_session_failures_total", &[("reason", "persistence")]),
            Some(1)
        );
        assert_eq!(
            counter_value(
                &snapshot,
                "meetline_commands_total",
                &[("command", "toggle_audio"), ("outcome", "ignored")]
            ),
            Some(1)
        );
        assert_eq!(
            counter_value(&snapshot, "meetline_script_loads_total", &[("outcome", "cached")]),
            Some(1)
        );
    }

    #[test]
    fn test_provider_metrics_pair() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_provider_construction();
            record_provider_ready(Duration::from_millis(850));
            record_provider_disposal();
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(
            counter_value(&snapshot, "meetline_provider_constructions_total", &[]),
            Some(1)
        );
        assert_eq!(
            counter_value(&snapshot, "meetline_provider_disposals_total", &[]),
            Some(1)
        );
        assert!(snapshot.iter().any(|(key, _, _, value)| {
            key.key().name() == "meetline_provider_ready_seconds"
                && matches!(value, DebugValue::Histogram(v) if v.len() == 1)
        }));
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_notification("info");
        record_provider_disposal();
    }
}
