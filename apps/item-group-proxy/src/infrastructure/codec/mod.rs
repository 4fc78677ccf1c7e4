//! Event Codec Module
//!
//! Newline-delimited JSON encoding for the router's boundary.
//!
//! - **Inbound**: one [`InboundEvent`] object per line, tagged by `type`
//! - **Outbound**: one [`ForwardedStatus`] object per line
//!
//! Example input:
//! ```json
//! {"type":"item_request","service":"svcA","handle":1,"token":10,"item":"IBM.N","model":6}
//! {"type":"item_response","handle":1,"group":[0,1]}
//! {"type":"group_status","service":"svcA","group":[0,1],"status":{"stream_state":"closed"}}
//! ```

use crate::application::ports::ForwardedStatus;
use crate::domain::events::InboundEvent;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Line is not a JSON object.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// NDJSON codec for inbound events and forwarded statuses.
#[derive(Debug, Default, Clone)]
pub struct JsonLinesCodec;

impl JsonLinesCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one input line.
    ///
    /// Blank lines and lines starting with `#` are skipped (`Ok(None)`).
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not a valid event object.
    pub fn decode(&self, line: &str) -> Result<Option<InboundEvent>, CodecError> {
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }

        if !trimmed.starts_with('{') {
            return Err(CodecError::InvalidFormat(truncate(trimmed, 64)));
        }

        Ok(Some(serde_json::from_str(trimmed)?))
    }

    /// Encode a forwarded status as a single line (no trailing newline).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self, status: &ForwardedStatus) -> Result<String, CodecError> {
        Ok(serde_json::to_string(status)?)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
