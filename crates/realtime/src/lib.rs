//! Realtime session-layer state: connected WebSocket sessions, fan-out
//! delivery, presence, voice membership, per-actor rate limiting, and
//! short-lived auth caches.
//!
//! Everything here is in-memory and gateway-process-local. None of it
//! touches the database — callers resolve recipients (channel/server
//! membership) via `ecto-db` and pass the resulting session ids in.

pub mod presence;
pub mod rate_limit;
pub mod registry;
pub mod session_lock;
pub mod token_cache;
pub mod voice_state;

pub use presence::{PresenceManager, PresenceStatus};
pub use rate_limit::{RateLimitError, RateLimiter};
pub use registry::{BufferedEvent, ConnectedSession, SessionRegistry, FORCE_CLOSE_EVENT};
pub use session_lock::{ResourceBusy, ResourceLockMap};
pub use token_cache::TokenVerifyCache;
pub use voice_state::{VoiceMemberState, VoiceStateManager};
