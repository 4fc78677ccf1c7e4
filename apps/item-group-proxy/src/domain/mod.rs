//! Domain Layer - Core routing types with no I/O.
//!
//! - `group`: Item group index and subscription bookkeeping
//! - `status`: Stream / data state carried by status messages
//! - `events`: Inbound events from the messaging boundary

/// Item group index.
pub mod group;

/// Stream status types.
pub mod status;

/// Inbound boundary events.
pub mod events;
