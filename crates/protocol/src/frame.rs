use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The wire shape of every message in both directions: `{event, data, seq?}`.
///
/// `seq` is only ever set by the server, and only on frames dispatched
/// through a session's sequence counter — handshake frames (`system.hello`,
/// `system.ready`, etc.) and client-originated frames omit it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self { event: event.into(), data, seq: None }
    }

    pub fn with_seq(event: impl Into<String>, data: Value, seq: u64) -> Self {
        Self { event: event.into(), data, seq: Some(seq) }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".into())
    }
}
