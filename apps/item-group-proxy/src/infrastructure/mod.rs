//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// NDJSON codec for inbound events and forwarded statuses.
pub mod codec;

/// Configuration loaded from the environment.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Event input loop.
pub mod input;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Outbound status sinks and the writer task.
pub mod sink;

/// OpenTelemetry tracing integration.
pub mod telemetry;
