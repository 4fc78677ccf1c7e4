#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Item Group Proxy - Group-Indexed Status Fan-Out
//!
//! Tracks open item streams by service and item group so that a single
//! upstream group or service status reaches every client stream it
//! covers, without scanning every open stream.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core index and data types
//!   - `group`: The service → group → stream index
//!   - `status`: Stream and data state
//!   - `events`: Inbound upstream and client events
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Outbound status sink interface
//!   - `services`: Event router driving the index
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `codec`: NDJSON event decoding and status encoding
//!   - `sink`: Channel sink and output writer task
//!   - `input`: Event loop over input lines
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//! events ──► input loop ──► codec ──► ItemGroupRouter ──► GroupIndex
//!                                           │
//!                                           └──► ChannelSink ──► writer ──► stdout
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core index types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::events::{EventKind, InboundEvent};
pub use domain::group::{
    ClientToken, GroupId, GroupIndex, GroupIndexStats, ModelType, ServiceName, StreamHandle,
    Subscription,
};
pub use domain::status::{DataState, Status, StreamState, StreamStatus};

// Application
pub use application::ports::{ForwardedStatus, SinkError, StatusSink};
pub use application::services::{
    ItemGroupRouter, RouteOutcome, RouterOptions, RouterStats, SharedRouterStats,
};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, EventInput, OutboundSettings, RouterConfig, ServerSettings,
};

// Codec, input and sinks
pub use infrastructure::codec::{CodecError, JsonLinesCodec};
pub use infrastructure::input::{InputError, LoopSummary, open_input, run_event_loop};
pub use infrastructure::sink::{ChannelSink, CollectingSink, WriterError, run_writer};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
