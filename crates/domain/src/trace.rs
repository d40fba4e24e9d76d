use serde::Serialize;

/// Structured trace events emitted across all ecto crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionOpened {
        session_id: String,
        user_id: String,
        server_id: String,
    },
    SessionClosed {
        session_id: String,
        reason: String,
        duration_ms: u64,
    },
    MutationApplied {
        kind: String,
        server_id: String,
        actor_id: String,
        duration_ms: u64,
    },
    MutationRejected {
        kind: String,
        ecto_code: u32,
        reason: String,
    },
    FanOutDispatched {
        event: String,
        recipients: usize,
        duration_ms: u64,
    },
    RateLimitTripped {
        bucket: String,
        actor_id: String,
        retry_after_ms: u64,
    },
    PermissionDenied {
        actor_id: String,
        channel_id: Option<String>,
        required: String,
    },
    VoiceWorkerClaimed {
        worker_id: String,
        channel_id: String,
    },
    VoiceWorkerLost {
        worker_id: String,
        active_sessions: usize,
    },
    VoiceCommandDispatched {
        worker_id: String,
        method: String,
        duration_ms: u64,
    },
    TokenVerified {
        user_id: String,
        cache_hit: bool,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ecto_event");
    }
}
