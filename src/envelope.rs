//! Response bodies of authenticated gateway commands.
//!
//! The body is one or more segments separated by `\n\r`. Only the last
//! segment carries the result, as JSON.

use serde_json::Value;

/// Separator between envelope segments.
pub const SEGMENT_SEPARATOR: &str = "\n\r";

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Gateway response has no \\n\\r segment separator")]
    MissingSeparator,
    #[error("Gateway response payload is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
}

/// Extracts the JSON payload from the last segment of `body`.
///
/// ```rust
/// use start2pay::envelope::parse_envelope;
/// use serde_json::json;
///
/// assert_eq!(parse_envelope("abc\n\r{\"ok\":true}").unwrap(), json!({"ok": true}));
/// assert!(parse_envelope("noSeparatorHere").is_err());
/// ```
pub fn parse_envelope(body: &str) -> Result<Value, ProtocolError> {
    let segments: Vec<&str> = body.split(SEGMENT_SEPARATOR).collect();
    if segments.len() < 2 {
        return Err(ProtocolError::MissingSeparator);
    }
    let payload = segments.last().copied().unwrap_or_default();
    tracing::trace!(segments = segments.len(), "Parsing response envelope");
    serde_json::from_str(payload).map_err(ProtocolError::InvalidJson)
}
