use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

/// Per-row async mutexes keyed by entity id. Capacity-sensitive sequences
/// (booking admission, move, shrink allocation) and per-appointment
/// mutations hold the relevant lock for their whole check-then-write span
/// so concurrent requests cannot both pass a capacity check.
#[derive(Debug, Default)]
pub struct LockRegistry {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            Arc::clone(map.entry(id).or_default())
        };
        debug!("acquiring row lock for {}", id);
        lock.lock_owned().await
    }

    /// Acquire several row locks. Ids are sorted and deduplicated first so
    /// two callers locking overlapping sets cannot deadlock.
    pub async fn acquire_many(&self, ids: &[Uuid]) -> Vec<OwnedMutexGuard<()>> {
        let mut sorted: Vec<Uuid> = ids.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for id in sorted {
            guards.push(self.acquire(id).await);
        }
        guards
    }
}
