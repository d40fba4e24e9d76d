//! Media worker pool.
//!
//! Workers are the unit of process-level SFU isolation — each one abstracts
//! an OS process hosting the actual RTP/DTLS media engine (out of scope
//! here; see the module doc). The pool only tracks *which* worker owns each
//! router and reassigns work when a worker dies.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use ecto_domain::trace::TraceEvent;
use parking_lot::RwLock;
use uuid::Uuid;

pub type WorkerId = u32;

pub struct MediaWorker {
    pub id: WorkerId,
    pub alive: bool,
}

/// Round-robin pool of media workers, sized `ceil(cpus/2)` (minimum 1) at
/// boot. Routers are assigned to a worker when created and stay pinned to
/// it until the router is destroyed or the worker dies.
pub struct WorkerPool {
    workers: RwLock<HashMap<WorkerId, MediaWorker>>,
    next_worker_id: AtomicU64,
    cursor: AtomicU64,
    /// channel_id → assigned worker, so a dead worker's routers can be found.
    router_assignments: RwLock<HashMap<Uuid, WorkerId>>,
}

impl WorkerPool {
    /// `size` should be `ceil(available_parallelism / 2).max(1)` — computed
    /// by the caller so this crate doesn't need to touch `std::thread`.
    pub fn new(size: u32) -> Self {
        let size = size.max(1);
        let mut workers = HashMap::new();
        for id in 0..size {
            workers.insert(id, MediaWorker { id, alive: true });
        }
        Self {
            workers: RwLock::new(workers),
            next_worker_id: AtomicU64::new(size as u64),
            cursor: AtomicU64::new(0),
            router_assignments: RwLock::new(HashMap::new()),
        }
    }

    /// Assigns `channel_id`'s router to the next alive worker in round-robin
    /// order. Panics only if every worker in the pool is dead, which the
    /// death-replacement path is designed to prevent.
    pub fn assign_router(&self, channel_id: Uuid) -> WorkerId {
        let workers = self.workers.read();
        let alive: Vec<WorkerId> = {
            let mut ids: Vec<WorkerId> = workers.values().filter(|w| w.alive).map(|w| w.id).collect();
            ids.sort_unstable();
            ids
        };
        assert!(!alive.is_empty(), "media worker pool has no alive workers");
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) as usize % alive.len();
        let worker_id = alive[idx];
        self.router_assignments.write().insert(channel_id, worker_id);
        TraceEvent::VoiceWorkerClaimed { worker_id: worker_id.to_string(), channel_id: channel_id.to_string() }.emit();
        worker_id
    }

    pub fn release_router(&self, channel_id: Uuid) {
        self.router_assignments.write().remove(&channel_id);
    }

    pub fn worker_for_router(&self, channel_id: Uuid) -> Option<WorkerId> {
        self.router_assignments.read().get(&channel_id).copied()
    }

    /// Marks a worker dead and spawns its replacement under a fresh id.
    /// Returns the channel ids whose routers were hosted on the dead worker
    /// — callers must treat their active users as disconnected and let them
    /// rejoin (the spec doesn't attempt router migration).
    pub fn handle_worker_died(&self, worker_id: WorkerId) -> Vec<Uuid> {
        {
            let mut workers = self.workers.write();
            if let Some(worker) = workers.get_mut(&worker_id) {
                worker.alive = false;
            }
            let new_id = self.next_worker_id.fetch_add(1, Ordering::Relaxed) as WorkerId;
            workers.insert(new_id, MediaWorker { id: new_id, alive: true });
        }
        let mut assignments = self.router_assignments.write();
        let lost: Vec<Uuid> = assignments.iter().filter(|(_, w)| **w == worker_id).map(|(c, _)| *c).collect();
        for channel_id in &lost {
            assignments.remove(channel_id);
        }
        TraceEvent::VoiceWorkerLost { worker_id: worker_id.to_string(), active_sessions: lost.len() }.emit();
        lost
    }

    pub fn alive_worker_count(&self) -> usize {
        self.workers.read().values().filter(|w| w.alive).count()
    }
}
