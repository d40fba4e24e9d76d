//! `/ws` and `/notify` upgrade handlers: the handshake (`system.hello` →
//! `system.identify` → `system.ready`), the post-identify read loop, and
//! heartbeat/close-code enforcement. Per-frame business logic after
//! identify lives in [`dispatch`]; voice framing lives in [`voice`].

pub mod dispatch;
mod ready;
pub mod voice;

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use ecto_domain::entities::Member;
use ecto_domain::EctoError;
use ecto_protocol::{CloseCode, Frame, HEARTBEAT_INTERVAL_SECS, IDENTIFY_TIMEOUT_SECS, PROTOCOL_VERSION};
use ecto_realtime::ConnectedSession;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use uuid::Uuid;

use crate::bootstrap::on_session_removed;
use crate::state::AppState;

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(state, socket, Mode::Full))
}

pub async fn notify_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(state, socket, Mode::Notify))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// `/ws`: the full event stream.
    Full,
    /// `/notify`: hello/identify/heartbeat plus a restricted `notify` event,
    /// nothing else is dispatched.
    Notify,
}

/// Sends an [`ecto_protocol::ErrorEnvelope`]-shaped payload as a `system.error`
/// frame rather than rejecting the whole connection — most RPC-style
/// failures on a live socket are recoverable by the client without
/// reconnecting.
pub(crate) fn reply_error(state: &AppState, session_id: Uuid, err: &EctoError) {
    let envelope = ecto_protocol::ErrorEnvelope::from(err);
    state.sessions.send(session_id, Frame::new("system.error", serde_json::to_value(envelope).unwrap_or_default()));
}

async fn run_session(state: AppState, socket: WebSocket, mode: Mode) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Frame>(256);

    let hello = Frame::new(
        "system.hello",
        json!({ "heartbeat_interval": HEARTBEAT_INTERVAL_SECS, "protocol_version": PROTOCOL_VERSION }),
    );
    if sink.send(Message::Text(hello.to_json())).await.is_err() {
        return;
    }

    let Some(member) = match tokio::time::timeout(Duration::from_secs(IDENTIFY_TIMEOUT_SECS), stream.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => identify(&state, &text).await,
        _ => None,
    } else {
        let _ = sink.send(close_message(CloseCode::NotAuthenticated)).await;
        return;
    };

    let session_id = Uuid::now_v7();
    let connected_at = chrono::Utc::now();
    let session = ConnectedSession::new(session_id, member.user_id, tx);
    state.sessions.register(session);
    state.sessions.subscribe_server(session_id, state.server_id);
    state.presence.set_online(member.user_id, ecto_realtime::PresenceStatus::Online);
    ecto_domain::trace::TraceEvent::SessionOpened {
        session_id: session_id.to_string(),
        user_id: member.user_id.to_string(),
        server_id: state.server_id.to_string(),
    }
    .emit();
    state.sessions.dispatch_to_server(
        state.server_id,
        "presence.update",
        json!({ "user_id": member.user_id, "status": "online", "custom_text": Option::<String>::None }),
    );

    let ready_payload = match mode {
        Mode::Full => match ready::build(&state, &member).await {
            Ok(payload) => payload,
            Err(e) => {
                reply_error(&state, session_id, &e);
                json!({})
            }
        },
        Mode::Notify => json!({}),
    };
    if sink.send(Message::Text(Frame::new("system.ready", ready_payload).to_json())).await.is_err() {
        cleanup(&state, session_id, member.user_id, connected_at, "ready send failed").await;
        return;
    }

    let mut last_heartbeat = chrono::Utc::now();
    let mut close_reason = "client disconnected";

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                let Some(frame) = outbound else { close_reason = "dispatcher channel closed"; break };
                if frame.event == ecto_realtime::FORCE_CLOSE_EVENT {
                    let reason = frame.data.get("reason").and_then(|v| v.as_str()).unwrap_or("forced disconnect").to_string();
                    let _ = sink.send(forced_close_message(reason)).await;
                    close_reason = "forced disconnect";
                    break;
                }
                if mode == Mode::Notify && !matches!(frame.event.as_str(), "notify" | "system.heartbeat_ack") {
                    continue;
                }
                if sink.send(Message::Text(frame.to_json())).await.is_err() {
                    close_reason = "write failed";
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let Ok(frame) = serde_json::from_str::<Frame>(&text) else {
                            reply_error(&state, session_id, &EctoError::validation(ecto_domain::error::codes::VALIDATION, "malformed frame"));
                            continue;
                        };
                        if frame.event == "system.heartbeat" {
                            last_heartbeat = chrono::Utc::now();
                        }
                        match mode {
                            Mode::Full => {
                                if let dispatch::Outcome::Close(code) = dispatch::handle(&state, session_id, &member, frame).await {
                                    let _ = sink.send(close_message(code)).await;
                                    close_reason = "protocol close";
                                    break;
                                }
                            }
                            Mode::Notify => handle_notify_frame(&state, session_id, &member, frame),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => { close_reason = "client closed"; break; }
                    Some(Ok(_)) => {}
                    Some(Err(_)) => { close_reason = "read error"; break; }
                }
            }
            _ = tokio::time::sleep(Duration::from_secs(5)) => {
                if dispatch::heartbeat_expired(last_heartbeat) {
                    let _ = sink.send(close_message(CloseCode::SessionTimeout)).await;
                    close_reason = "heartbeat timeout";
                    break;
                }
            }
        }
    }

    cleanup(&state, session_id, member.user_id, connected_at, close_reason).await;
}

fn handle_notify_frame(state: &AppState, session_id: Uuid, _member: &Member, frame: Frame) {
    match frame.event.as_str() {
        "system.heartbeat" => {
            state.sessions.touch_heartbeat(session_id);
            state.sessions.send(session_id, Frame::new("system.heartbeat_ack", json!({})));
        }
        "system.identify" => {
            // Already identified during the handshake; a second attempt is
            // simply ignored on the notify channel rather than closing it.
        }
        _ => {}
    }
}

async fn identify(state: &AppState, text: &str) -> Option<Member> {
    let frame: Frame = serde_json::from_str(text).ok()?;
    if frame.event != "system.identify" {
        return None;
    }
    let token = frame.data.get("token").and_then(|v| v.as_str())?;
    crate::auth::authenticate(state, token).await.ok()
}

async fn cleanup(state: &AppState, session_id: Uuid, user_id: Uuid, connected_at: chrono::DateTime<chrono::Utc>, reason: &str) {
    state.sessions.remove(session_id);
    on_session_removed(state, user_id);
    ecto_domain::trace::TraceEvent::SessionClosed {
        session_id: session_id.to_string(),
        reason: reason.to_string(),
        duration_ms: (chrono::Utc::now() - connected_at).num_milliseconds().max(0) as u64,
    }
    .emit();
    if let Some(voice_state) = state.voice.voice_state.get(user_id) {
        let removed = state.voice.leave(voice_state.channel_id, user_id);
        for producer_id in removed.producers {
            state.sessions.dispatch_to_channel(voice_state.channel_id, "voice.producer_closed", json!({ "producer_id": producer_id }));
        }
        state.sessions.dispatch_to_server(
            state.server_id,
            "voice.state_update",
            json!({ "user_id": user_id, "channel_id": Option::<Uuid>::None, "self_mute": false, "self_deaf": false, "_removed": true }),
        );
    }
}

fn close_message(code: CloseCode) -> Message {
    Message::Close(Some(axum::extract::ws::CloseFrame { code: code.code(), reason: reason_for(code).into() }))
}

fn forced_close_message(reason: String) -> Message {
    Message::Close(Some(axum::extract::ws::CloseFrame { code: CloseCode::FORCED_DISCONNECT, reason: reason.into() }))
}

fn reason_for(code: CloseCode) -> &'static str {
    match code {
        CloseCode::UnknownError => "unknown error",
        CloseCode::InvalidPayload => "invalid payload",
        CloseCode::ProtocolVersionMismatch => "protocol version mismatch",
        CloseCode::NotAuthenticated => "not authenticated",
        CloseCode::AuthenticationFailed => "authentication failed",
        CloseCode::SessionTimeout => "session timeout",
        CloseCode::AlreadyAuthenticated => "already authenticated",
    }
}
