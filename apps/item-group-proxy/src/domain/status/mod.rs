//! Stream Status Types
//!
//! Status values carried by item, group and service status messages.
//! The router never interprets a status beyond asking whether it closes
//! the stream; everything else is passed through to the client untouched.

use serde::{Deserialize, Serialize};

// =============================================================================
// Terminal Check
// =============================================================================

/// A status value that can be routed through the group index.
///
/// Implement this for any status encoding that should fan out to
/// grouped item streams.
pub trait StreamStatus {
    /// Whether the status permanently closes the stream(s) it applies to.
    fn is_terminal(&self) -> bool;
}

// =============================================================================
// Stream / Data State
// =============================================================================

/// State of the stream itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    /// Stream is open and will deliver updates.
    #[default]
    Open,
    /// Snapshot-only stream; no further updates after the refresh.
    NonStreaming,
    /// Stream closed; the client may re-request the item.
    ClosedRecover,
    /// Stream closed permanently.
    Closed,
}

impl StreamState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::NonStreaming => "non_streaming",
            Self::ClosedRecover => "closed_recover",
            Self::Closed => "closed",
        }
    }

    /// Check if the stream is closed (either variant).
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed | Self::ClosedRecover)
    }
}

/// Health of the data on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataState {
    /// Data is good.
    #[default]
    Ok,
    /// Data may be stale.
    Suspect,
    /// Data state unchanged from the previous message.
    NoChange,
}

impl DataState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Suspect => "suspect",
            Self::NoChange => "no_change",
        }
    }
}

// =============================================================================
// Status
// =============================================================================

/// Status attached to an item, group or service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Status {
    /// Stream state.
    pub stream_state: StreamState,
    /// Data state.
    #[serde(default)]
    pub data_state: DataState,
    /// Backend status code (0 = none).
    #[serde(default)]
    pub code: u16,
    /// Free-form status text.
    #[serde(default)]
    pub text: String,
}

impl Status {
    /// Open stream with good data.
    #[must_use]
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            stream_state: StreamState::Open,
            data_state: DataState::Ok,
            code: 0,
            text: text.into(),
        }
    }

    /// Open stream whose data is suspect (e.g. a source went down).
    #[must_use]
    pub fn suspect(text: impl Into<String>) -> Self {
        Self {
            stream_state: StreamState::Open,
            data_state: DataState::Suspect,
            code: 0,
            text: text.into(),
        }
    }

    /// Permanently closed stream.
    #[must_use]
    pub fn closed(text: impl Into<String>) -> Self {
        Self {
            stream_state: StreamState::Closed,
            data_state: DataState::Suspect,
            code: 0,
            text: text.into(),
        }
    }

    /// Closed stream that the client may recover by re-requesting.
    #[must_use]
    pub fn closed_recover(text: impl Into<String>) -> Self {
        Self {
            stream_state: StreamState::ClosedRecover,
            data_state: DataState::Suspect,
            code: 0,
            text: text.into(),
        }
    }

    /// Set the backend status code.
    #[must_use]
    pub const fn with_code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }
}

impl StreamStatus for Status {
    fn is_terminal(&self) -> bool {
        self.stream_state.is_closed()
    }
}

impl StreamStatus for bool {
    fn is_terminal(&self) -> bool {
        *self
    }
}

// =============================================================================
// Tests
// =============================================================================
