//! Request/reply control channel to a media worker.
//!
//! The actual RTP/DTLS engine a worker wraps is out of scope here (see the
//! crate-level doc) — [`WorkerHandle`] models only the command/reply
//! envelope the coordinator drives it with, the way the real
//! implementation would glue it to whatever SFU library owns the worker
//! process. Pending requests are tracked the same way an RPC-style router
//! tracks in-flight calls to a remote peer: a `request_id → oneshot` map,
//! so replies arriving out of order still resolve the right caller.

use std::collections::HashMap;
use std::time::Duration;

use ecto_domain::trace::TraceEvent;
use ecto_domain::{EctoError, Result};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::worker::WorkerId;

#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub request_id: Uuid,
    pub worker_id: WorkerId,
    pub method: &'static str,
    pub params: Value,
}

#[derive(Debug, Clone)]
pub struct WorkerReply {
    pub request_id: Uuid,
    pub ok: bool,
    pub payload: Value,
    pub error: Option<String>,
}

struct Pending {
    tx: oneshot::Sender<WorkerReply>,
}

/// Dispatches [`WorkerCommand`]s to worker processes via an outbound
/// channel and resolves [`WorkerReply`]s delivered back in through
/// [`Self::resolve`]. One instance is shared by the whole voice coordinator.
pub struct WorkerRouter {
    outbound: tokio::sync::mpsc::Sender<WorkerCommand>,
    pending: Mutex<HashMap<Uuid, Pending>>,
    timeout: Duration,
}

impl WorkerRouter {
    pub fn new(outbound: tokio::sync::mpsc::Sender<WorkerCommand>, timeout: Duration) -> Self {
        Self { outbound, pending: Mutex::new(HashMap::new()), timeout }
    }

    /// Sends `method`/`params` to `worker_id` and awaits its reply, or times
    /// out with a [`EctoError::Voice`] `VOICE_WORKER_DIED` error.
    pub async fn request(&self, worker_id: WorkerId, method: &'static str, params: Value) -> Result<Value> {
        let request_id = Uuid::now_v7();
        let started = std::time::Instant::now();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id, Pending { tx });

        let command = WorkerCommand { request_id, worker_id, method, params };
        if self.outbound.send(command).await.is_err() {
            self.pending.lock().remove(&request_id);
            return Err(EctoError::Voice {
                code: ecto_domain::error::codes::VOICE_WORKER_DIED,
                message: format!("worker {worker_id} is unreachable"),
            });
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) if reply.ok => {
                TraceEvent::VoiceCommandDispatched {
                    worker_id: worker_id.to_string(),
                    method: method.to_string(),
                    duration_ms: started.elapsed().as_millis() as u64,
                }
                .emit();
                Ok(reply.payload)
            }
            Ok(Ok(reply)) => Err(EctoError::Voice {
                code: ecto_domain::error::codes::VOICE_ROUTER_UNAVAILABLE,
                message: reply.error.unwrap_or_else(|| "worker command failed".into()),
            }),
            Ok(Err(_)) => Err(EctoError::Voice {
                code: ecto_domain::error::codes::VOICE_WORKER_DIED,
                message: format!("worker {worker_id} dropped the request"),
            }),
            Err(_) => {
                self.pending.lock().remove(&request_id);
                Err(EctoError::Voice {
                    code: ecto_domain::error::codes::VOICE_WORKER_DIED,
                    message: format!("worker {worker_id} timed out"),
                })
            }
        }
    }

    /// Called by the task reading the worker's inbound control socket when
    /// a reply frame arrives.
    pub fn resolve(&self, reply: WorkerReply) {
        if let Some(pending) = self.pending.lock().remove(&reply.request_id) {
            let _ = pending.tx.send(reply);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}
