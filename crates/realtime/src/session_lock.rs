//! Per-resource concurrency control.
//!
//! Ensures only one mutation runs per resource key at a time (e.g. one page
//! edit per channel, one role-reorder per server). A second request arriving
//! while one is in-flight waits (queue depth effectively unbounded, since
//! `Semaphore::acquire` queues fairly) rather than racing the database.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct ResourceLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Default for ResourceLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceLockMap {
    pub fn new() -> Self {
        Self { locks: Mutex::new(HashMap::new()) }
    }

    /// Acquire the run lock for a resource key. Hold the returned permit for
    /// the duration of the mutation — it auto-releases on drop.
    pub async fn acquire(&self, key: &str) -> OwnedSemaphorePermit {
        let sem = {
            let mut locks = self.locks.lock();
            locks.entry(key.to_owned()).or_insert_with(|| Arc::new(Semaphore::new(1))).clone()
        };
        sem.acquire_owned().await.expect("semaphore never closed")
    }

    pub fn tracked_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drops locks for keys with no holder and no waiter.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, sem| sem.available_permits() == 0);
    }
}

/// Returned by callers that choose not to wait and instead reject outright.
#[derive(Debug)]
pub struct ResourceBusy;

impl std::fmt::Display for ResourceBusy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "resource is busy — a mutation is already in progress")
    }
}

impl std::error::Error for ResourceBusy {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_access() {
        let map = ResourceLockMap::new();
        let p1 = map.acquire("page:1").await;
        drop(p1);
        let p2 = map.acquire("page:1").await;
        drop(p2);
    }

    #[tokio::test]
    async fn different_keys_concurrent() {
        let map = Arc::new(ResourceLockMap::new());
        let p1 = map.acquire("page:1").await;
        let p2 = map.acquire("page:2").await;
        assert_eq!(map.tracked_count(), 2);
        drop(p1);
        drop(p2);
    }

    #[tokio::test]
    async fn same_key_waits() {
        let map = Arc::new(ResourceLockMap::new());
        let map2 = map.clone();
        let p1 = map.acquire("page:1").await;

        let handle = tokio::spawn(async move {
            let _p2 = map2.acquire("page:1").await;
            42
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        drop(p1);

        let result = handle.await.unwrap();
        assert_eq!(result, 42);
    }
}
