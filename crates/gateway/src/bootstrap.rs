//! Process boot sequence: open the DB pool, ensure the singleton server row
//! exists, assemble [`AppState`], and spawn the background tasks that keep
//! in-memory registries honest (stale-session reaping, rate-limiter
//! sweeping, presence expiry) plus the stub media-worker loop.

use std::sync::Arc;
use std::time::Duration;

use ecto_domain::config::Config;
use ecto_domain::Result;
use ecto_realtime::{PresenceManager, RateLimiter, ResourceLockMap, SessionRegistry, TokenVerifyCache};
use ecto_voice::{VoiceCoordinator, WorkerPool, WorkerReply, WorkerRouter};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::state::AppState;

const TYPING_RATE_LIMIT: f64 = 1.0;
const TYPING_RATE_WINDOW_SECS: u64 = 3;
const MUTATION_RATE_LIMIT: f64 = 10.0;
const MUTATION_RATE_WINDOW_SECS: u64 = 10;
const NOTIFY_RATE_LIMIT: f64 = 1.0;
const NOTIFY_RATE_WINDOW_SECS: u64 = 2;

const TOKEN_CACHE_TTL_SECS: u64 = 300;
const RATE_LIMITER_SWEEP_INTERVAL_SECS: u64 = 60;
const RATE_LIMITER_SWEEP_IDLE_SECS: u64 = 120;
const PRESENCE_SWEEP_INTERVAL_SECS: u64 = 5;
const STALE_SESSION_SWEEP_INTERVAL_SECS: u64 = 30;

/// Builds the full [`AppState`], opening the DB pool and bootstrapping the
/// singleton server row (and its `@everyone` role) on a first-ever boot.
pub async fn build_app_state(config: Config) -> Result<AppState> {
    let config = Arc::new(config);
    let db = ecto_db::pool::connect(&config).await?;

    let (server_id, default_role_id) = ensure_server(&db).await?;

    let cpus = std::thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(1);
    let workers = WorkerPool::new((cpus + 1) / 2);
    let (worker_tx, worker_rx) = tokio::sync::mpsc::channel(256);
    let worker_router = WorkerRouter::new(worker_tx, Duration::from_secs(ecto_protocol::VOICE_WORKER_REQUEST_TIMEOUT_SECS));
    let voice = Arc::new(VoiceCoordinator::new(workers, worker_router));

    let state = AppState {
        config,
        db,
        http: reqwest::Client::new(),
        server_id,
        default_role_id,
        sessions: Arc::new(SessionRegistry::new()),
        presence: Arc::new(PresenceManager::new()),
        token_cache: Arc::new(TokenVerifyCache::new(Duration::from_secs(TOKEN_CACHE_TTL_SECS))),
        resource_locks: Arc::new(ResourceLockMap::new()),
        typing_limiter: Arc::new(RateLimiter::new(TYPING_RATE_LIMIT, Duration::from_secs(TYPING_RATE_WINDOW_SECS))),
        mutation_limiter: Arc::new(RateLimiter::new(MUTATION_RATE_LIMIT, Duration::from_secs(MUTATION_RATE_WINDOW_SECS))),
        notify_limiter: Arc::new(RateLimiter::new(NOTIFY_RATE_LIMIT, Duration::from_secs(NOTIFY_RATE_WINDOW_SECS))),
        voice,
    };

    spawn_stub_media_worker(state.voice.clone(), worker_rx);
    spawn_background_tasks(state.clone());
    Ok(state)
}

/// Returns `(server_id, default_role_id)`, creating the singleton server
/// row and its `@everyone` role the first time the database is empty.
async fn ensure_server(db: &sqlx::AnyPool) -> Result<(Uuid, Uuid)> {
    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM servers LIMIT 1")
        .fetch_optional(db)
        .await
        .map_err(ecto_domain::EctoError::database)?;

    let server_id = match existing {
        Some((id,)) => id,
        None => {
            let server = ecto_db::repo::servers::create_singleton(db, "My Server").await?;
            tracing::info!(server_id = %server.id, "bootstrapped singleton server row");
            server.id
        }
    };

    let roles = ecto_db::repo::roles::list_for_server(db, server_id).await?;
    let default_role_id = match roles.into_iter().find(|r| r.is_default) {
        Some(role) => role.id,
        None => {
            let role = ecto_db::repo::roles::create_default_role(db, server_id).await?;
            tracing::info!(role_id = %role.id, "bootstrapped default @everyone role");
            role.id
        }
    };

    Ok((server_id, default_role_id))
}

/// The real RTP/DTLS media engine a worker wraps is out of scope for this
/// system (see `ecto_voice`'s crate-level doc); without a process on the
/// other end of the outbound channel, `WorkerRouter::request` would just
/// time out forever. This loop plays that missing process well enough to
/// keep the control plane runnable standalone: every command gets a
/// structurally plausible reply, fabricated rather than backed by any real
/// SFU, resolved immediately since there's no actual out-of-process hop.
fn spawn_stub_media_worker(voice: Arc<VoiceCoordinator>, mut rx: tokio::sync::mpsc::Receiver<ecto_voice::WorkerCommand>) {
    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            let payload = fabricate_reply(cmd.method);
            voice.resolve_worker_reply(WorkerReply { request_id: cmd.request_id, ok: true, payload, error: None });
        }
    });
}

fn fabricate_reply(method: &'static str) -> Value {
    match method {
        "routerCapabilities" => json!({ "codecs": [], "headerExtensions": [] }),
        "createTransport" => json!({
            "id": Uuid::now_v7(),
            "iceParameters": {},
            "iceCandidates": [],
            "dtlsParameters": {},
        }),
        "createConsumer" => json!({
            "id": Uuid::now_v7(),
            "kind": "audio",
            "rtpParameters": {},
        }),
        _ => Value::Null,
    }
}

fn spawn_background_tasks(state: AppState) {
    tokio::spawn(stale_session_reaper(state.clone()));
    tokio::spawn(rate_limiter_sweeper(state.clone()));
    tokio::spawn(presence_sweeper(state));
}

async fn stale_session_reaper(state: AppState) {
    let mut ticker = tokio::time::interval(Duration::from_secs(STALE_SESSION_SWEEP_INTERVAL_SECS));
    loop {
        ticker.tick().await;
        for session_id in state.sessions.stale_sessions(ecto_protocol::HEARTBEAT_TIMEOUT_SECS as i64) {
            if let Some(session) = state.sessions.remove(session_id) {
                tracing::info!(session_id = %session_id, user_id = %session.user_id, "reaped stale session (heartbeat timeout)");
                on_session_removed(&state, session.user_id);
            }
        }
    }
}

async fn rate_limiter_sweeper(state: AppState) {
    let mut ticker = tokio::time::interval(Duration::from_secs(RATE_LIMITER_SWEEP_INTERVAL_SECS));
    loop {
        ticker.tick().await;
        state.typing_limiter.sweep(RATE_LIMITER_SWEEP_IDLE_SECS);
        state.mutation_limiter.sweep(RATE_LIMITER_SWEEP_IDLE_SECS);
        state.notify_limiter.sweep(RATE_LIMITER_SWEEP_IDLE_SECS);
        state.sessions.sweep_retired();
    }
}

async fn presence_sweeper(state: AppState) {
    let mut ticker = tokio::time::interval(Duration::from_secs(PRESENCE_SWEEP_INTERVAL_SECS));
    loop {
        ticker.tick().await;
        for user_id in state.presence.sweep_expired() {
            state.sessions.dispatch_to_server(state.server_id, "presence.update", json!({ "user_id": user_id, "status": "offline" }));
        }
    }
}

/// Shared by the stale-session reaper and the WS close path: if the user
/// has no remaining sessions, presence is marked disconnected so the grace
/// timer in `PresenceManager` starts counting down to an offline broadcast.
pub fn on_session_removed(state: &AppState, user_id: Uuid) {
    if !state.sessions.is_user_connected(user_id) {
        state.presence.mark_disconnected(user_id);
    }
}
