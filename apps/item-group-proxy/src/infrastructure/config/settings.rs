//! Router Configuration Settings
//!
//! Configuration types for the item group router, loaded from environment
//! variables.

use std::path::PathBuf;

/// Where inbound events are read from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventInput {
    /// Standard input.
    #[default]
    Stdin,
    /// A newline-delimited JSON file.
    File(PathBuf),
}

impl EventInput {
    /// Parse an input location; `-` or empty means stdin.
    #[must_use]
    pub fn from_arg(s: &str) -> Self {
        match s.trim() {
            "" | "-" => Self::Stdin,
            path => Self::File(PathBuf::from(path)),
        }
    }

    /// Human-readable description for logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Stdin => "stdin".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check HTTP port (0 = disabled).
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Outbound status channel settings.
#[derive(Debug, Clone)]
pub struct OutboundSettings {
    /// Capacity of the forwarded-status channel.
    pub capacity: usize,
}

impl Default for OutboundSettings {
    fn default() -> Self {
        Self { capacity: 4096 }
    }
}

/// Complete router configuration.
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    /// Event input location.
    pub input: EventInput,
    /// Server port settings.
    pub server: ServerSettings,
    /// Outbound channel settings.
    pub outbound: OutboundSettings,
    /// Purge groups emptied by merges immediately.
    pub purge_empty_groups: bool,
}

impl RouterConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value or
    /// the input file does not exist.
    pub fn from_env() -> Result<Self, ConfigError> {
        let input = std::env::var("ITEM_GROUP_INPUT")
            .map(|s| EventInput::from_arg(&s))
            .unwrap_or_default();

        if let EventInput::File(path) = &input
            && !path.is_file()
        {
            return Err(ConfigError::InputNotFound(path.display().to_string()));
        }

        let server = ServerSettings {
            health_port: parse_env("ITEM_GROUP_HEALTH_PORT", ServerSettings::default().health_port)?,
        };

        let capacity = parse_env(
            "ITEM_GROUP_OUTBOUND_CAPACITY",
            OutboundSettings::default().capacity,
        )?;
        if capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ITEM_GROUP_OUTBOUND_CAPACITY".to_string(),
                value: "0".to_string(),
            });
        }

        let purge_empty_groups = parse_env_bool("ITEM_GROUP_PURGE_EMPTY_GROUPS", false)?;

        Ok(Self {
            input,
            server,
            outbound: OutboundSettings { capacity },
            purge_empty_groups,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has a value that cannot be parsed.
    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
    /// Configured input file does not exist.
    #[error("input file not found: {0}")]
    InputNotFound(String),
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => {
            v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: v,
            })
        }
        _ => Ok(default),
    }
}

fn parse_env_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(key) {
        Ok(v) => parse_bool(&v).ok_or(ConfigError::InvalidValue {
            key: key.to_string(),
            value: v,
        }),
        Err(_) => Ok(default),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
