//! Realtime WebSocket wire protocol and the HTTP error envelope shared by
//! the session layer and every RPC router.
//!
//! Frames are a thin `{event, data, seq?}` envelope — payload shapes are
//! plain [`serde_json::Value`] rather than one variant per event, since the
//! event vocabulary is large and grows independently of the framing. Typed
//! payload structs live here for the handful of messages whose shape
//! matters outside the gateway (handshake, resume, voice signaling).

mod close;
mod error_envelope;
mod frame;
mod voice;

pub use close::CloseCode;
pub use error_envelope::ErrorEnvelope;
pub use frame::Frame;
pub use voice::{VoiceClientMessage, VoiceServerMessage};

/// Protocol version negotiated during `system.identify`. Bumped on any
/// breaking change to the handshake or frame shape.
pub const PROTOCOL_VERSION: u32 = 1;

/// Client must complete `system.identify` within this many seconds of
/// receiving `system.hello`, or the connection is closed with
/// [`CloseCode::NotAuthenticated`].
pub const IDENTIFY_TIMEOUT_SECS: u64 = 10;

/// Baseline heartbeat cadence advertised in `system.hello`.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Server closes the connection if no heartbeat is observed for this long.
pub const HEARTBEAT_TIMEOUT_SECS: u64 = 90;

/// Delay between a user's last session closing and an `offline` presence
/// broadcast, giving a reconnect window.
pub const PRESENCE_OFFLINE_GRACE_SECS: u64 = 15;

/// Hard cap and TTL for each session's replay buffer.
pub const REPLAY_BUFFER_CAP: usize = 500;
pub const REPLAY_BUFFER_TTL_SECS: u64 = 300;

/// Debounce window for the lightweight `/notify` endpoint, per channel.
pub const NOTIFY_DEBOUNCE_SECS: u64 = 2;
pub const MAX_VOICE_PARTICIPANTS: usize = 99;
pub const VOICE_WORKER_REQUEST_TIMEOUT_SECS: u64 = 10;
