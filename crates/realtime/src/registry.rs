//! In-memory registry of connected WebSocket sessions: identity, channel/
//! server subscriptions, and the per-session sequence counter + replay
//! buffer that the event dispatcher uses for fan-out.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use ecto_protocol::{Frame, REPLAY_BUFFER_CAP, REPLAY_BUFFER_TTL_SECS};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Channel to push frames back to a session's WS writer task.
pub type SessionSink = mpsc::Sender<Frame>;

/// Sentinel event name recognized by the WS writer loop: rather than
/// forwarding it as a text frame, the loop closes the socket with
/// [`ecto_protocol::CloseCode::FORCED_DISCONNECT`] and the reason carried in
/// `data.reason`.
pub const FORCE_CLOSE_EVENT: &str = "system.force_close";

/// One entry in a session's replay buffer — the shape [`SessionRegistry::resume`]
/// hands back verbatim for every event the client missed.
#[derive(Debug, Clone)]
pub struct BufferedEvent {
    pub seq: u64,
    pub event: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

pub struct ConnectedSession {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub connected_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    /// Servers this session has subscribed to since identify/resume.
    pub servers: HashSet<Uuid>,
    /// Channels this session has explicitly `subscribe`d to.
    pub channels: HashSet<Uuid>,
    pub sink: SessionSink,
    seq: AtomicU64,
    buffer: Mutex<VecDeque<BufferedEvent>>,
}

impl ConnectedSession {
    pub fn new(session_id: Uuid, user_id: Uuid, sink: SessionSink) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            user_id,
            connected_at: now,
            last_heartbeat: now,
            servers: HashSet::new(),
            channels: HashSet::new(),
            sink,
            seq: AtomicU64::new(0),
            buffer: Mutex::new(VecDeque::new()),
        }
    }

    pub fn current_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    /// Bumps the seq counter up to `at_least` if it's currently behind —
    /// used when a resumed session adopts the retired predecessor's seq so
    /// numbering stays strictly increasing across the reconnect.
    fn adopt_seq(&self, at_least: u64) {
        self.seq.fetch_max(at_least, Ordering::SeqCst);
    }
}

/// What's left of a session after its socket closes: its replay buffer and
/// last-assigned seq, held a while longer so a client that reconnects with a
/// brand-new `session_id` (the only kind the WS layer ever mints) can still
/// resume against its old one via `system.resume`.
struct RetiredSession {
    last_seq: u64,
    buffer: VecDeque<BufferedEvent>,
    retired_at: DateTime<Utc>,
}

/// Thread-safe map of live sessions, plus a user → session-ids index so
/// fan-out doesn't need to scan every connection to find one user's sockets
/// (a user may have several — desktop, mobile, a second tab).
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, ConnectedSession>>,
    by_user: RwLock<HashMap<Uuid, HashSet<Uuid>>>,
    /// Sessions that just disconnected, kept around for `REPLAY_BUFFER_TTL_SECS`
    /// so a reconnect can still resume them. Swept by [`Self::sweep_retired`].
    retired: RwLock<HashMap<Uuid, RetiredSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session: ConnectedSession) {
        let session_id = session.session_id;
        let user_id = session.user_id;
        self.sessions.write().insert(session_id, session);
        self.by_user.write().entry(user_id).or_default().insert(session_id);
    }

    pub fn remove(&self, session_id: Uuid) -> Option<ConnectedSession> {
        let session = self.sessions.write().remove(&session_id)?;
        if let Some(set) = self.by_user.write().get_mut(&session.user_id) {
            set.remove(&session_id);
        }
        self.retired.write().insert(
            session_id,
            RetiredSession {
                last_seq: session.current_seq(),
                buffer: session.buffer.lock().clone(),
                retired_at: Utc::now(),
            },
        );
        Some(session)
    }

    pub fn touch_heartbeat(&self, session_id: Uuid) {
        if let Some(session) = self.sessions.write().get_mut(&session_id) {
            session.last_heartbeat = Utc::now();
        }
    }

    pub fn subscribe_server(&self, session_id: Uuid, server_id: Uuid) {
        if let Some(session) = self.sessions.write().get_mut(&session_id) {
            session.servers.insert(server_id);
        }
    }

    pub fn subscribe_channel(&self, session_id: Uuid, channel_id: Uuid) {
        if let Some(session) = self.sessions.write().get_mut(&session_id) {
            session.channels.insert(channel_id);
        }
    }

    pub fn unsubscribe_channel(&self, session_id: Uuid, channel_id: Uuid) {
        if let Some(session) = self.sessions.write().get_mut(&session_id) {
            session.channels.remove(&channel_id);
        }
    }

    pub fn is_subscribed_to_channel(&self, session_id: Uuid, channel_id: Uuid) -> bool {
        self.sessions.read().get(&session_id).is_some_and(|s| s.channels.contains(&channel_id))
    }

    pub fn sessions_for_user(&self, user_id: Uuid) -> Vec<Uuid> {
        self.by_user.read().get(&user_id).map(|set| set.iter().copied().collect()).unwrap_or_default()
    }

    pub fn is_user_connected(&self, user_id: Uuid) -> bool {
        self.by_user.read().get(&user_id).is_some_and(|set| !set.is_empty())
    }

    /// Every live session subscribed to `server_id` — the base recipient set
    /// for a server-wide fan-out before permission filtering narrows it.
    pub fn sessions_in_server(&self, server_id: Uuid) -> Vec<Uuid> {
        self.sessions
            .read()
            .values()
            .filter(|s| s.servers.contains(&server_id))
            .map(|s| s.session_id)
            .collect()
    }

    /// Every live session subscribed to `channel_id` — the recipient set for
    /// a channel-scoped fan-out (caller has already permission-filtered the
    /// *subscribe* request, so no further filtering happens here).
    pub fn sessions_in_channel(&self, channel_id: Uuid) -> Vec<Uuid> {
        self.sessions
            .read()
            .values()
            .filter(|s| s.channels.contains(&channel_id))
            .map(|s| s.session_id)
            .collect()
    }

    pub fn all_session_ids(&self) -> Vec<Uuid> {
        self.sessions.read().keys().copied().collect()
    }

    pub fn send(&self, session_id: Uuid, frame: Frame) -> bool {
        let sink = {
            let sessions = self.sessions.read();
            match sessions.get(&session_id) {
                Some(session) => session.sink.clone(),
                None => return false,
            }
        };
        sink.try_send(frame).is_ok()
    }

    pub fn send_to_many(&self, session_ids: &[Uuid], frame: Frame) {
        for session_id in session_ids {
            self.send(*session_id, frame.clone());
        }
    }

    pub fn send_to_user(&self, user_id: Uuid, frame: Frame) {
        let targets = self.sessions_for_user(user_id);
        self.send_to_many(&targets, frame);
    }

    /// Core of the event dispatcher (§4.2): bump `session_id`'s sequence
    /// counter, append the event to its replay buffer (trimming by cap and
    /// TTL), then push the sequenced frame if the socket is open. Returns
    /// the assigned seq, or `None` if the session is gone.
    pub fn dispatch_one(&self, session_id: Uuid, event: &str, data: Value) -> Option<u64> {
        let (seq, sink) = {
            let sessions = self.sessions.read();
            let session = sessions.get(&session_id)?;
            let seq = session.seq.fetch_add(1, Ordering::SeqCst) + 1;
            let mut buffer = session.buffer.lock();
            buffer.push_back(BufferedEvent { seq, event: event.to_string(), data: data.clone(), timestamp: Utc::now() });
            trim_buffer(&mut buffer);
            (seq, session.sink.clone())
        };
        let _ = sink.try_send(Frame::with_seq(event, data, seq));
        Some(seq)
    }

    /// Dispatches to every session in `session_ids`, each getting its own
    /// independently-sequenced copy.
    pub fn dispatch_many(&self, session_ids: &[Uuid], event: &str, data: Value) {
        for session_id in session_ids {
            self.dispatch_one(*session_id, event, data.clone());
        }
    }

    pub fn dispatch_to_user(&self, user_id: Uuid, event: &str, data: Value) {
        let targets = self.sessions_for_user(user_id);
        self.dispatch_many(&targets, event, data);
    }

    pub fn dispatch_to_channel(&self, channel_id: Uuid, event: &str, data: Value) {
        let started = std::time::Instant::now();
        let targets = self.sessions_in_channel(channel_id);
        let recipients = targets.len();
        self.dispatch_many(&targets, event, data);
        ecto_domain::trace::TraceEvent::FanOutDispatched {
            event: event.to_string(),
            recipients,
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();
    }

    pub fn dispatch_to_server(&self, server_id: Uuid, event: &str, data: Value) {
        let started = std::time::Instant::now();
        let targets = self.sessions_in_server(server_id);
        let recipients = targets.len();
        self.dispatch_many(&targets, event, data);
        ecto_domain::trace::TraceEvent::FanOutDispatched {
            event: event.to_string(),
            recipients,
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();
    }

    pub fn dispatch_to_all(&self, event: &str, data: Value) {
        let targets = self.all_session_ids();
        self.dispatch_many(&targets, event, data);
    }

    /// Pushes a `system.force_close` sentinel through `session_id`'s sink.
    /// The WS writer task special-cases this event and turns it into an
    /// actual close frame rather than forwarding it as text — used by kick
    /// and ban to drop a member's live connections immediately instead of
    /// waiting for their token to be rejected on the next request.
    pub fn force_close(&self, session_id: Uuid, reason: &'static str) -> bool {
        let sink = {
            let sessions = self.sessions.read();
            match sessions.get(&session_id) {
                Some(session) => session.sink.clone(),
                None => return false,
            }
        };
        sink.try_send(Frame::new(FORCE_CLOSE_EVENT, serde_json::json!({ "reason": reason }))).is_ok()
    }

    /// Force-closes every live session belonging to `user_id`.
    pub fn force_close_user(&self, user_id: Uuid, reason: &'static str) {
        for session_id in self.sessions_for_user(user_id) {
            self.force_close(session_id, reason);
        }
    }

    /// Every event buffered under `old_session_id` with `seq > last_seq`,
    /// oldest first — the payload of `system.resumed`. `old_session_id` is
    /// almost always gone from the live map by the time a client resumes
    /// (the WS layer mints a fresh id per connection and `remove` has
    /// already run on close), so this checks the retired pool first and
    /// falls back to a live session for the degenerate case of resuming
    /// against a still-open one. On a hit, `new_session_id`'s seq counter is
    /// bumped up to the retired seq so numbering stays strictly increasing
    /// across the reconnect. Returns `None` if `old_session_id` is known
    /// nowhere (expired from the retired pool, or never existed) — caller
    /// should treat this as a fresh identify.
    pub fn resume(&self, old_session_id: Uuid, new_session_id: Uuid, last_seq: u64) -> Option<Vec<BufferedEvent>> {
        let (retired_seq, events) = if let Some(retired) = self.retired.read().get(&old_session_id) {
            (retired.last_seq, retired.buffer.iter().filter(|e| e.seq > last_seq).cloned().collect::<Vec<_>>())
        } else {
            let sessions = self.sessions.read();
            let session = sessions.get(&old_session_id)?;
            let buffer = session.buffer.lock();
            (session.current_seq(), buffer.iter().filter(|e| e.seq > last_seq).cloned().collect::<Vec<_>>())
        };
        if let Some(new_session) = self.sessions.read().get(&new_session_id) {
            new_session.adopt_seq(retired_seq);
        }
        Some(events)
    }

    /// Drops retired sessions past `REPLAY_BUFFER_TTL_SECS` — called
    /// periodically alongside the other background sweepers.
    pub fn sweep_retired(&self) {
        let cutoff = Utc::now() - chrono::Duration::seconds(REPLAY_BUFFER_TTL_SECS as i64);
        self.retired.write().retain(|_, r| r.retired_at >= cutoff);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Sessions whose last heartbeat is older than `HEARTBEAT_TIMEOUT_SECS` —
    /// the caller is expected to close these and call [`Self::remove`].
    pub fn stale_sessions(&self, timeout_secs: i64) -> Vec<Uuid> {
        let cutoff = Utc::now() - chrono::Duration::seconds(timeout_secs);
        self.sessions.read().values().filter(|s| s.last_heartbeat < cutoff).map(|s| s.session_id).collect()
    }
}

/// Drops entries past the TTL, then trims from the front until the buffer
/// is back under the hard cap — whichever bound would be violated first.
fn trim_buffer(buffer: &mut VecDeque<BufferedEvent>) {
    let cutoff = Utc::now() - chrono::Duration::seconds(REPLAY_BUFFER_TTL_SECS as i64);
    while buffer.front().is_some_and(|e| e.timestamp < cutoff) {
        buffer.pop_front();
    }
    while buffer.len() > REPLAY_BUFFER_CAP {
        buffer.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(sink: SessionSink) -> ConnectedSession {
        ConnectedSession::new(Uuid::now_v7(), Uuid::now_v7(), sink)
    }

    #[tokio::test]
    async fn dispatch_assigns_increasing_seq() {
        let registry = SessionRegistry::new();
        let (tx, mut rx) = mpsc::channel(16);
        let session = session(tx);
        let id = session.session_id;
        registry.register(session);

        let seq1 = registry.dispatch_one(id, "message.create", Value::Null).unwrap();
        let seq2 = registry.dispatch_one(id, "message.create", Value::Null).unwrap();
        assert_eq!(seq1, 1);
        assert_eq!(seq2, 2);
        assert!(rx.recv().await.unwrap().seq == Some(1));
        assert!(rx.recv().await.unwrap().seq == Some(2));
    }

    #[tokio::test]
    async fn resume_replays_only_newer_events() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::channel(16);
        let session = session(tx);
        let id = session.session_id;
        registry.register(session);

        registry.dispatch_one(id, "a", Value::Null);
        registry.dispatch_one(id, "b", Value::Null);
        registry.dispatch_one(id, "c", Value::Null);

        let replayed = registry.resume(id, id, 1).unwrap();
        assert_eq!(replayed.len(), 2);
        assert_eq!(replayed[0].seq, 2);
        assert_eq!(replayed[1].seq, 3);
    }

    #[tokio::test]
    async fn resume_at_current_seq_replays_nothing() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::channel(16);
        let session = session(tx);
        let id = session.session_id;
        registry.register(session);

        registry.dispatch_one(id, "a", Value::Null);
        let replayed = registry.resume(id, id, 1).unwrap();
        assert!(replayed.is_empty());
    }

    #[tokio::test]
    async fn buffer_trims_past_hard_cap() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::channel(REPLAY_BUFFER_CAP + 16);
        let session = session(tx);
        let id = session.session_id;
        registry.register(session);

        for _ in 0..(REPLAY_BUFFER_CAP + 10) {
            registry.dispatch_one(id, "spam", Value::Null);
        }
        let replayed = registry.resume(id, id, 0).unwrap();
        assert_eq!(replayed.len(), REPLAY_BUFFER_CAP);
    }

    #[tokio::test]
    async fn resume_survives_remove_via_retired_pool() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::channel(16);
        let session = session(tx);
        let old_id = session.session_id;
        registry.register(session);

        registry.dispatch_one(old_id, "a", Value::Null);
        registry.dispatch_one(old_id, "b", Value::Null);
        registry.dispatch_one(old_id, "c", Value::Null);
        registry.remove(old_id);

        let (tx2, _rx2) = mpsc::channel(16);
        let new_session = session(tx2);
        let new_id = new_session.session_id;
        registry.register(new_session);

        let replayed = registry.resume(old_id, new_id, 1).unwrap();
        assert_eq!(replayed.len(), 2);
        assert_eq!(replayed[0].seq, 2);
        assert_eq!(replayed[1].seq, 3);

        // seq numbering continues from the retired session, not from 0.
        let next_seq = registry.dispatch_one(new_id, "d", Value::Null).unwrap();
        assert_eq!(next_seq, 4);
    }

    #[tokio::test]
    async fn resume_of_unknown_session_returns_none() {
        let registry = SessionRegistry::new();
        assert!(registry.resume(Uuid::now_v7(), Uuid::now_v7(), 0).is_none());
    }
}
