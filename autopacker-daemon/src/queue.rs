//! Pending unpacked folders shared by the watcher and the worker.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use autopacker_core::UnpackedDir;

/// Multiset of units waiting for reconciliation.
///
/// The watcher side only ever holds the lock for a push, so `enqueue` never
/// waits on a reconcile in progress.
#[derive(Debug, Default)]
pub struct SyncQueue {
    pending: Mutex<Vec<UnpackedDir>>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, unit: UnpackedDir) {
        self.lock().push(unit);
    }

    /// Take everything queued so far, duplicates collapsed, in first-enqueue
    /// order. Units enqueued after this returns belong to the next drain.
    pub fn drain_distinct(&self) -> Vec<UnpackedDir> {
        let drained = std::mem::take(&mut *self.lock());
        let mut seen = HashSet::with_capacity(drained.len());
        drained
            .into_iter()
            .filter(|unit| seen.insert(unit.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of queued entries, duplicates included.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<UnpackedDir>> {
        // A panic while pushing or swapping cannot leave the Vec inconsistent.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
