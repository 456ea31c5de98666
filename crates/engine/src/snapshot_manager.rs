//! Registers, tracks, and releases engine snapshots (spec §4.5).

use dashmap::DashMap;
use polykv_core::error::{Error, Result};
use polykv_core::traits::Substrate;
use polykv_core::types::SnapshotId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Maps opaque snapshot ids to a reference count (`dashmap` + atomics, no
/// single global mutex beyond what `DashMap` shards internally).
pub struct SnapshotManager {
    entries: DashMap<SnapshotId, AtomicU64>,
}

impl SnapshotManager {
    pub fn new() -> Self {
        SnapshotManager { entries: DashMap::new() }
    }

    /// Create a new snapshot against `substrate` and register it with an
    /// initial reference count of 1.
    pub fn create(&self, substrate: &dyn Substrate) -> Result<SnapshotId> {
        let id = substrate.create_snapshot()?;
        self.entries.insert(id, AtomicU64::new(1));
        Ok(id)
    }

    /// Record an extra reference to an already-registered snapshot (e.g. a
    /// second transaction pinned to it). Fails if the id is unknown.
    pub fn retain(&self, id: SnapshotId) -> Result<()> {
        match self.entries.get(&id) {
            Some(refcount) => {
                refcount.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(Error::invalid_argument(format!("no such snapshot {id}"))),
        }
    }

    /// Release a reference; when it reaches zero, drop the substrate handle
    /// and remove the id. Subsequent reads at `id` then fail
    /// invalid-argument (spec §8 property 4).
    pub fn release(&self, id: SnapshotId, substrate: &dyn Substrate) -> Result<()> {
        let remaining = match self.entries.get(&id) {
            Some(refcount) => refcount.fetch_sub(1, Ordering::SeqCst) - 1,
            None => return Err(Error::invalid_argument(format!("no such snapshot {id}"))),
        };
        if remaining == 0 {
            self.entries.remove(&id);
            substrate.release_snapshot(id)?;
        }
        Ok(())
    }

    /// `true` if `id` is currently registered (not yet released to zero).
    pub fn is_live(&self, id: SnapshotId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Enumerate currently live snapshot ids.
    pub fn list(&self) -> Vec<SnapshotId> {
        self.entries.iter().map(|e| *e.key()).collect()
    }
}

impl Default for SnapshotManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polykv_storage::MemorySubstrate;

    #[test]
    fn create_and_release_round_trip() {
        let sub = MemorySubstrate::in_memory();
        let mgr = SnapshotManager::new();
        let id = mgr.create(&sub).unwrap();
        assert!(mgr.is_live(id));
        mgr.release(id, &sub).unwrap();
        assert!(!mgr.is_live(id));
    }

    #[test]
    fn release_of_unknown_snapshot_is_invalid_argument() {
        let sub = MemorySubstrate::in_memory();
        let mgr = SnapshotManager::new();
        assert!(matches!(mgr.release(999, &sub), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn retained_snapshot_survives_one_release() {
        let sub = MemorySubstrate::in_memory();
        let mgr = SnapshotManager::new();
        let id = mgr.create(&sub).unwrap();
        mgr.retain(id).unwrap();
        mgr.release(id, &sub).unwrap();
        assert!(mgr.is_live(id));
        mgr.release(id, &sub).unwrap();
        assert!(!mgr.is_live(id));
    }
}
