//! Configuration Module
//!
//! Configuration loading for the router binary.

mod settings;

pub use settings::{ConfigError, EventInput, OutboundSettings, RouterConfig, ServerSettings};
