//! Port Interfaces
//!
//! Defines the interfaces (ports) between the router and the transport
//! that carries statuses back to clients. Infrastructure adapters
//! implement these.
//!
//! ## Driven Ports (Outbound)
//!
//! - `StatusSink`: receives one forwarded status per affected client stream

use serde::Serialize;

use crate::domain::group::{ClientToken, ServiceName, StreamHandle, Subscription};
use crate::domain::status::Status;

/// A status addressed to one client stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardedStatus {
    /// Client-facing token of the stream.
    pub token: ClientToken,
    /// Backend handle of the stream.
    pub handle: StreamHandle,
    /// Service the stream belongs to.
    pub service: ServiceName,
    /// Item name.
    pub item: String,
    /// Status to deliver.
    pub status: Status,
}

impl ForwardedStatus {
    /// Address `status` to the client behind `subscription`.
    #[must_use]
    pub fn for_subscription(subscription: &Subscription, status: Status) -> Self {
        Self {
            token: subscription.token,
            handle: subscription.handle,
            service: subscription.service.clone(),
            item: subscription.item_name.clone(),
            status,
        }
    }
}

/// Outbound delivery errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The receiving side has gone away.
    #[error("status sink closed")]
    Closed,
}

/// Receives forwarded statuses.
///
/// Called synchronously from the event loop, once per affected stream.
/// Implementations must not block and must not drop statuses while the
/// receiving side is alive; a sink backed by a bounded queue holds the
/// overflow until it can be handed on.
pub trait StatusSink {
    /// Deliver one status.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if the status could not be queued.
    fn forward(&mut self, status: ForwardedStatus) -> Result<(), SinkError>;
}

impl<K: StatusSink + ?Sized> StatusSink for &mut K {
    fn forward(&mut self, status: ForwardedStatus) -> Result<(), SinkError> {
        (**self).forward(status)
    }
}

impl<K: StatusSink + ?Sized> StatusSink for Box<K> {
    fn forward(&mut self, status: ForwardedStatus) -> Result<(), SinkError> {
        (**self).forward(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::group::{GroupId, ModelType};

    #[test]
    fn forwarded_status_copies_client_addressing() {
        let sub = Subscription {
            handle: StreamHandle(7),
            token: ClientToken(70),
            service: "svcA".to_string(),
            item_name: "IBM.N".to_string(),
            model_type: ModelType::MarketPrice,
            group: Some(GroupId::new(vec![1])),
        };

        let forwarded = ForwardedStatus::for_subscription(&sub, Status::suspect("stale"));

        assert_eq!(forwarded.token, ClientToken(70));
        assert_eq!(forwarded.handle, StreamHandle(7));
        assert_eq!(forwarded.service, "svcA");
        assert_eq!(forwarded.item, "IBM.N");
        assert_eq!(forwarded.status.text, "stale");
    }

    #[test]
    fn sink_error_messages() {
        assert_eq!(SinkError::Closed.to_string(), "status sink closed");
    }
}
