//! Item Group Router
//!
//! Applies inbound boundary events to the group index and fans the
//! resulting statuses out through a [`StatusSink`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::application::ports::{ForwardedStatus, SinkError, StatusSink};
use crate::domain::events::{EventKind, InboundEvent};
use crate::domain::group::{
    ClientToken, GroupId, GroupIndex, GroupIndexStats, ModelType, StreamHandle, Subscription,
};
use crate::domain::status::{Status, StreamStatus};

// =============================================================================
// Options / Outcome / Stats
// =============================================================================

/// Router behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouterOptions {
    /// Drop groups emptied by a merge immediately instead of keeping them
    /// around for late messages.
    pub purge_empty_groups: bool,
}

/// Result of handling one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Kind of event handled.
    pub kind: EventKind,
    /// Statuses accepted by the sink.
    pub forwarded: usize,
    /// Statuses the sink rejected.
    pub failed: usize,
    /// Whether the index changed.
    pub changed: bool,
    /// Whether the event was a request still pending routing.
    pub pending: bool,
}

impl RouteOutcome {
    const fn new(kind: EventKind) -> Self {
        Self {
            kind,
            forwarded: 0,
            failed: 0,
            changed: false,
            pending: false,
        }
    }
}

/// Running router counters plus the latest index snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouterStats {
    /// Latest index sizes.
    pub index: GroupIndexStats,
    /// Events handled.
    pub events_processed: u64,
    /// Statuses accepted by the sink.
    pub statuses_forwarded: u64,
    /// Statuses the sink rejected.
    pub forward_failures: u64,
    /// Requests ignored because they had no service yet.
    pub pending_requests: u64,
    /// When the sink last rejected a status.
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Stats shared with the health endpoint.
pub type SharedRouterStats = Arc<RwLock<RouterStats>>;

// =============================================================================
// Delivery
// =============================================================================

/// Per-event delivery tally.
#[derive(Debug, Default)]
struct Delivery {
    forwarded: usize,
    failed: usize,
}

impl Delivery {
    fn send<K: StatusSink>(&mut self, sink: &mut K, subscription: &Subscription, status: &Status) {
        match sink.forward(ForwardedStatus::for_subscription(subscription, status.clone())) {
            Ok(()) => self.forwarded += 1,
            Err(e) => {
                self.failed += 1;
                tracing::error!(
                    token = %subscription.token,
                    item = %subscription.item_name,
                    error = %e,
                    "Status not delivered"
                );
            }
        }
    }
}

// =============================================================================
// Router
// =============================================================================

/// Drives a [`GroupIndex`] from inbound events.
///
/// Owned by the event-loop task; every call runs to completion without
/// suspending.
pub struct ItemGroupRouter<K> {
    index: GroupIndex,
    sink: K,
    options: RouterOptions,
    stats: SharedRouterStats,
}

impl<K: StatusSink> ItemGroupRouter<K> {
    /// Create a router delivering to `sink`.
    #[must_use]
    pub fn new(sink: K, options: RouterOptions) -> Self {
        Self {
            index: GroupIndex::new(),
            sink,
            options,
            stats: Arc::new(RwLock::new(RouterStats::default())),
        }
    }

    /// Shared handle to the router stats.
    #[must_use]
    pub fn stats_handle(&self) -> SharedRouterStats {
        Arc::clone(&self.stats)
    }

    /// Current stats snapshot.
    #[must_use]
    pub fn stats(&self) -> RouterStats {
        self.stats.read().clone()
    }

    /// The underlying index.
    #[must_use]
    pub const fn index(&self) -> &GroupIndex {
        &self.index
    }

    /// The sink.
    #[must_use]
    pub const fn sink(&self) -> &K {
        &self.sink
    }

    /// Mutable access to the sink, for draining buffered output.
    pub const fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    /// Consume the router, returning its sink.
    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Apply one event.
    pub fn handle(&mut self, event: InboundEvent) -> RouteOutcome {
        let mut outcome = RouteOutcome::new(event.kind());

        match event {
            InboundEvent::ItemRequest {
                service,
                handle,
                token,
                item,
                model,
            } => self.on_item_request(&service, handle, token, item, model, &mut outcome),
            InboundEvent::ItemResponse {
                handle,
                group,
                status,
            } => self.on_item_response(handle, group.as_ref(), status, &mut outcome),
            InboundEvent::GroupMerge { service, from, to } => {
                let moved = self.index.merge_group(&service, &from, &to);
                let purged = if self.options.purge_empty_groups && moved > 0 {
                    self.index.purge_empty_groups(&service)
                } else {
                    0
                };
                tracing::debug!(
                    service = %service,
                    from = %from,
                    to = %to,
                    moved,
                    purged,
                    "Item groups merged"
                );
                outcome.changed = moved > 0 || purged > 0;
            }
            InboundEvent::GroupStatus {
                service,
                group,
                status,
            } => self.on_group_status(&service, &group, &status, &mut outcome),
            InboundEvent::ServiceStatus { service, status } => {
                self.on_service_status(&service, &status, &mut outcome);
            }
            InboundEvent::ServiceRemoved { service } => {
                let existed = self.index.contains_service(&service);
                let removed = self.index.remove_service(&service);
                tracing::info!(service = %service, removed, "Service removed");
                outcome.changed = existed;
            }
            InboundEvent::ItemClose { handle } => {
                if let Some(sub) = self.index.remove_subscription(handle) {
                    tracing::debug!(handle = %handle, item = %sub.item_name, "Item closed");
                    outcome.changed = true;
                }
            }
        }

        self.publish(&outcome);
        outcome
    }

    fn on_item_request(
        &mut self,
        service: &str,
        handle: StreamHandle,
        token: ClientToken,
        item: String,
        model: ModelType,
        outcome: &mut RouteOutcome,
    ) {
        if service.is_empty() {
            tracing::debug!(handle = %handle, item = %item, "Request pending routing, not grouped");
            outcome.pending = true;
            return;
        }

        outcome.changed = self
            .index
            .add_subscription(service, handle, token, item, model);
        if !outcome.changed {
            tracing::debug!(handle = %handle, "Duplicate item request ignored");
        }
    }

    fn on_item_response(
        &mut self,
        handle: StreamHandle,
        group: Option<&GroupId>,
        status: Option<Status>,
        outcome: &mut RouteOutcome,
    ) {
        let terminal = status.as_ref().is_some_and(|s| s.is_terminal());

        // A stream closing in this response is never grouped
        if let Some(group) = group
            && !terminal
        {
            outcome.changed = self.index.assign_group(handle, group);
        }

        let Some(status) = status else {
            return;
        };

        let mut delivery = Delivery::default();
        if terminal {
            if let Some(sub) = self.index.remove_subscription(handle) {
                delivery.send(&mut self.sink, &sub, &status);
                outcome.changed = true;
            }
        } else if let Some(sub) = self.index.subscription(handle) {
            delivery.send(&mut self.sink, sub, &status);
        }

        outcome.forwarded = delivery.forwarded;
        outcome.failed = delivery.failed;
    }

    fn on_group_status(
        &mut self,
        service: &str,
        group: &GroupId,
        status: &Status,
        outcome: &mut RouteOutcome,
    ) {
        let existed = self.index.contains_group(service, group);
        let mut delivery = Delivery::default();
        let sink = &mut self.sink;

        let visited = self
            .index
            .apply_status_to_group(service, group, status, |sub, status| {
                delivery.send(&mut *sink, sub, status);
            });

        tracing::info!(
            service = %service,
            group = %group,
            stream_state = status.stream_state.as_str(),
            data_state = status.data_state.as_str(),
            visited,
            "Group status applied"
        );

        outcome.forwarded = delivery.forwarded;
        outcome.failed = delivery.failed;
        outcome.changed = existed && status.is_terminal();
    }

    fn on_service_status(&mut self, service: &str, status: &Status, outcome: &mut RouteOutcome) {
        let existed = self.index.contains_service(service);
        let mut delivery = Delivery::default();
        let sink = &mut self.sink;

        let visited = self
            .index
            .apply_status_to_service(service, status, |sub, status| {
                delivery.send(&mut *sink, sub, status);
            });

        tracing::info!(
            service = %service,
            stream_state = status.stream_state.as_str(),
            data_state = status.data_state.as_str(),
            visited,
            "Service status applied"
        );

        outcome.forwarded = delivery.forwarded;
        outcome.failed = delivery.failed;
        outcome.changed = existed && status.is_terminal();
    }

    fn publish(&self, outcome: &RouteOutcome) {
        let mut stats = self.stats.write();
        stats.events_processed += 1;
        stats.statuses_forwarded += outcome.forwarded as u64;
        stats.forward_failures += outcome.failed as u64;
        if outcome.failed > 0 {
            stats.last_failure_at = Some(Utc::now());
        }
        if outcome.pending {
            stats.pending_requests += 1;
        }
        if outcome.changed {
            stats.index = self.index.stats();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
