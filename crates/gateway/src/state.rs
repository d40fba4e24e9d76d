//! Shared application state passed to every API handler and WS connection.
//!
//! Fields are grouped by concern:
//! - **Core services** — config, DB pool, HTTP client for central auth
//! - **Identity** — cached singleton server/default-role ids
//! - **Realtime** — session registry, presence, voice state, rate limiters
//! - **Voice** — the SFU control plane
//! - **Security** — token verify cache, per-resource lock map

use std::sync::Arc;

use ecto_domain::config::Config;
use ecto_realtime::{PresenceManager, RateLimiter, ResourceLockMap, SessionRegistry, TokenVerifyCache};
use ecto_voice::VoiceCoordinator;
use sqlx::AnyPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    // ── Core services ───────────────────────────────────────────────
    pub config: Arc<Config>,
    pub db: AnyPool,
    pub http: reqwest::Client,

    // ── Identity (this process serves exactly one tenant) ──────────
    pub server_id: Uuid,
    pub default_role_id: Uuid,

    // ── Realtime ─────────────────────────────────────────────────────
    pub sessions: Arc<SessionRegistry>,
    pub presence: Arc<PresenceManager>,
    pub token_cache: Arc<TokenVerifyCache>,
    pub resource_locks: Arc<ResourceLockMap>,
    /// Typing indicators: `typing:{user}:{channel}`, 1 per 3s.
    pub typing_limiter: Arc<RateLimiter>,
    /// General per-actor mutation rate limiting (message send, reactions, ...).
    pub mutation_limiter: Arc<RateLimiter>,
    /// Debounce for `/notify` mention pushes: `notify:{channel}`, 1 per 2s.
    pub notify_limiter: Arc<RateLimiter>,

    // ── Voice (SFU control plane) ─────────────────────────────────────
    pub voice: Arc<VoiceCoordinator>,
}
