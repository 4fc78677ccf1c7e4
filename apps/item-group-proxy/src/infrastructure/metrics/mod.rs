//! Prometheus Metrics Module
//!
//! Exposes router metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Events**: Inbound events handled, by kind
//! - **Statuses**: Statuses forwarded to and rejected by the outbound sink
//! - **Index**: Service, group and stream counts
//! - **Input**: Lines that failed to decode
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::application::services::RouteOutcome;
use crate::domain::group::GroupIndexStats;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if a different global recorder is already installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "item_group_events_total",
        "Total inbound events handled, by kind"
    );
    describe_counter!(
        "item_group_statuses_forwarded_total",
        "Total statuses forwarded to client streams"
    );
    describe_counter!(
        "item_group_statuses_failed_total",
        "Total statuses rejected by the outbound sink"
    );
    describe_counter!(
        "item_group_pending_requests_total",
        "Item requests ignored because no service was routed yet"
    );
    describe_counter!(
        "item_group_decode_errors_total",
        "Inbound lines that could not be decoded"
    );

    describe_gauge!("item_group_services", "Services with indexed streams");
    describe_gauge!("item_group_groups", "Item groups across all services");
    describe_gauge!("item_group_subscriptions", "Indexed item streams");
    describe_gauge!(
        "item_group_unassigned_subscriptions",
        "Indexed item streams without a group"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record the outcome of one routed event.
pub fn record_outcome(outcome: &RouteOutcome) {
    counter!("item_group_events_total", "kind" => outcome.kind.as_str()).increment(1);

    if outcome.forwarded > 0 {
        counter!(
            "item_group_statuses_forwarded_total",
            "kind" => outcome.kind.as_str()
        )
        .increment(outcome.forwarded as u64);
    }
    if outcome.failed > 0 {
        counter!(
            "item_group_statuses_failed_total",
            "kind" => outcome.kind.as_str()
        )
        .increment(outcome.failed as u64);
    }
    if outcome.pending {
        counter!("item_group_pending_requests_total").increment(1);
    }
}

/// Record an inbound line that failed to decode.
pub fn record_decode_error() {
    counter!("item_group_decode_errors_total").increment(1);
}

/// Update the index size gauges.
#[allow(clippy::cast_precision_loss)]
pub fn set_index_stats(stats: &GroupIndexStats) {
    gauge!("item_group_services").set(stats.service_count as f64);
    gauge!("item_group_groups").set(stats.group_count as f64);
    gauge!("item_group_subscriptions").set(stats.subscription_count as f64);
    gauge!("item_group_unassigned_subscriptions").set(stats.unassigned_count as f64);
}
