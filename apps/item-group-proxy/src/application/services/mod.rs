//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `ItemGroupRouter`: Applies boundary events to the group index and fans
//!   statuses out to client streams

mod router;

pub use router::{
    ItemGroupRouter, RouteOutcome, RouterOptions, RouterStats, SharedRouterStats,
};
