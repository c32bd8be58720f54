//! In-process serialization of queue mutations
//!
//! Database row locks protect against other processes; within one process the
//! lifecycle operations also take a keyed mutex so that two requests for the
//! same item (or the same patron's quota) never interleave between their
//! validation reads and their writes. Locks are always taken patron-first,
//! then item. An entry is dropped from the registry as soon as nobody holds
//! or awaits its key, so the map only ever tracks keys in use.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{ItemRef, Module, ReservationError};

const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    Patron { patron_id: i32, module: Module },
    Item(ItemRef),
}

/// Guards held for the duration of one unit of work
#[must_use]
pub struct QueueGuard {
    registry: QueueLocks,
    held: Vec<(LockKey, OwnedMutexGuard<()>)>,
}

impl QueueGuard {
    fn new(registry: &QueueLocks) -> Self {
        Self {
            registry: registry.clone(),
            held: Vec::with_capacity(2),
        }
    }
}

impl Drop for QueueGuard {
    fn drop(&mut self) {
        // Reverse acquisition order
        while let Some((key, guard)) = self.held.pop() {
            drop(guard);
            self.registry.forget_if_idle(key);
        }
    }
}

#[derive(Clone, Default)]
pub struct QueueLocks {
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

impl QueueLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the map's own handle is left once nobody holds or awaits `key`
    fn forget_if_idle(&self, key: LockKey) {
        self.locks.remove_if(&key, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    async fn acquire(&self, guard: &mut QueueGuard, key: LockKey) -> Result<(), ReservationError> {
        let mutex = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match tokio::time::timeout(LOCK_TIMEOUT, mutex.lock_owned()).await {
            Ok(held) => {
                guard.held.push((key, held));
                Ok(())
            }
            Err(_) => {
                self.forget_if_idle(key);
                tracing::warn!("Timed out waiting for lock {:?}", key);
                Err(ReservationError::Conflict(format!(
                    "Timed out waiting for lock on {:?}",
                    key
                )))
            }
        }
    }

    /// Lock one item's queue
    pub async fn lock_item(&self, item: ItemRef) -> Result<QueueGuard, ReservationError> {
        let mut guard = QueueGuard::new(self);
        self.acquire(&mut guard, LockKey::Item(item)).await?;
        Ok(guard)
    }

    /// Lock a patron's quota in the item's module, then the item's queue
    pub async fn lock_patron_and_item(
        &self,
        patron_id: i32,
        item: ItemRef,
    ) -> Result<QueueGuard, ReservationError> {
        // A failure on the item releases the patron lock through the guard
        let mut guard = QueueGuard::new(self);
        let patron = LockKey::Patron {
            patron_id,
            module: item.module,
        };
        self.acquire(&mut guard, patron).await?;
        self.acquire(&mut guard, LockKey::Item(item)).await?;
        Ok(guard)
    }
}
