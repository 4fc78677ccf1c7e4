//! Inbound Boundary Events
//!
//! Events delivered by the messaging boundary that drive the group index:
//! item requests and closes from the client side, item responses and
//! directory-style group/service notifications from the backend side.

use serde::{Deserialize, Serialize};

use super::group::{ClientToken, GroupId, ModelType, ServiceName, StreamHandle};
use super::status::Status;

/// An event from the messaging boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A client item request was forwarded to the backend.
    ItemRequest {
        /// Target service; empty while the request is still pending routing.
        #[serde(default)]
        service: ServiceName,
        /// Backend handle of the forwarded stream.
        handle: StreamHandle,
        /// Client-facing token.
        token: ClientToken,
        /// Requested item name.
        item: String,
        /// Message-model type.
        #[serde(default)]
        model: ModelType,
    },
    /// A refresh/status response on an item stream.
    ItemResponse {
        /// Backend handle of the stream.
        handle: StreamHandle,
        /// Item group carried by the response, if any.
        #[serde(default)]
        group: Option<GroupId>,
        /// Item-level status carried by the response, if any.
        #[serde(default)]
        status: Option<Status>,
    },
    /// The backend merged one item group into another.
    GroupMerge {
        /// Service the groups belong to.
        service: ServiceName,
        /// Group being merged away.
        from: GroupId,
        /// Group receiving the members.
        to: GroupId,
    },
    /// Status for every item in a group.
    GroupStatus {
        /// Service the group belongs to.
        service: ServiceName,
        /// Target group.
        group: GroupId,
        /// Status to fan out.
        status: Status,
    },
    /// Status for every item of a service.
    ServiceStatus {
        /// Target service.
        service: ServiceName,
        /// Status to fan out.
        status: Status,
    },
    /// The service disappeared from the source directory.
    ServiceRemoved {
        /// Removed service.
        service: ServiceName,
    },
    /// The client closed its item stream.
    ItemClose {
        /// Backend handle of the stream.
        handle: StreamHandle,
    },
}

impl InboundEvent {
    /// Event kind, for logs and metrics labels.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::ItemRequest { .. } => EventKind::ItemRequest,
            Self::ItemResponse { .. } => EventKind::ItemResponse,
            Self::GroupMerge { .. } => EventKind::GroupMerge,
            Self::GroupStatus { .. } => EventKind::GroupStatus,
            Self::ServiceStatus { .. } => EventKind::ServiceStatus,
            Self::ServiceRemoved { .. } => EventKind::ServiceRemoved,
            Self::ItemClose { .. } => EventKind::ItemClose,
        }
    }
}

/// Discriminant of [`InboundEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Item request.
    ItemRequest,
    /// Item response.
    ItemResponse,
    /// Group merge.
    GroupMerge,
    /// Group status.
    GroupStatus,
    /// Service status.
    ServiceStatus,
    /// Service removed.
    ServiceRemoved,
    /// Item close.
    ItemClose,
}

impl EventKind {
    /// Get the event kind name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ItemRequest => "item_request",
            Self::ItemResponse => "item_response",
            Self::GroupMerge => "group_merge",
            Self::GroupStatus => "group_status",
            Self::ServiceStatus => "service_status",
            Self::ServiceRemoved => "service_removed",
            Self::ItemClose => "item_close",
        }
    }
}
