//! Commit orchestration: validate, allocate a generation, apply (spec §4.4).

use crate::transaction::{TransactionContext, TransactionState};
use crate::validation::validate;
use parking_lot::Mutex;
use polykv_core::error::{Error, Result};
use polykv_core::traits::{Substrate, WriteOp};
use polykv_core::types::{Generation, SnapshotId, TransactionId};
use std::sync::atomic::{AtomicU64, Ordering};

/// Coordinates transaction lifecycle and the global commit order.
///
/// Per spec §4.4 step 1 / §5: commits are serialized through one global
/// primitive (`commit_lock`) — there is no per-collection sharding, since
/// this spec has no partitioning concept above collections to shard by.
pub struct TransactionManager {
    generation: AtomicU64,
    next_txn_id: AtomicU64,
    commit_lock: Mutex<()>,
}

impl TransactionManager {
    /// Build a manager starting at `initial_generation` (e.g. recovered from
    /// a reopened substrate).
    pub fn new(initial_generation: Generation) -> Self {
        TransactionManager {
            generation: AtomicU64::new(initial_generation),
            next_txn_id: AtomicU64::new(1),
            commit_lock: Mutex::new(()),
        }
    }

    /// The generation of the most recently committed transaction.
    pub fn current_generation(&self) -> Generation {
        self.generation.load(Ordering::SeqCst)
    }

    fn next_txn_id(&self) -> TransactionId {
        self.next_txn_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Begin a new transaction. `snapshot_ref`, when set, pins all of this
    /// transaction's reads to that snapshot (spec §4.4 "Snapshot-transactions").
    pub fn begin(&self, snapshot_ref: Option<SnapshotId>) -> TransactionContext {
        TransactionContext::new(self.next_txn_id(), self.current_generation(), snapshot_ref)
    }

    /// 2PC prepare: validate now and mark the transaction `Staged`.
    ///
    /// This is an optimistic "reservation": to keep the implementation free
    /// of a guard that would have to outlive the lock between `stage` and
    /// `commit`, `commit` always re-validates under the lock regardless of
    /// whether the caller staged first. Staging still gives callers an
    /// early, non-mutating signal of a conflict.
    pub fn stage(&self, txn: &mut TransactionContext, substrate: &dyn Substrate) -> Result<()> {
        if txn.state() != TransactionState::Active {
            return Err(Error::invalid_argument("stage requires an active transaction"));
        }
        let _guard = self.commit_lock.lock();
        let conflicts = validate(txn.watch_set(), substrate)?;
        if !conflicts.is_empty() {
            txn.set_state(TransactionState::Aborted);
            tracing::warn!(txn_id = txn.id(), conflicts = conflicts.len(), "stage: conflict detected");
            return Err(Error::conflict(format!("{} watched key(s) changed", conflicts.len())));
        }
        txn.set_state(TransactionState::Staged);
        Ok(())
    }

    /// Validate, allocate a new generation, and apply the write-set
    /// atomically (spec §4.4, validation algorithm). Valid from `Active` or
    /// `Staged`.
    pub fn commit(
        &self,
        txn: &mut TransactionContext,
        substrate: &dyn Substrate,
        flush: bool,
    ) -> Result<Generation> {
        match txn.state() {
            TransactionState::Active | TransactionState::Staged => {}
            _ => return Err(Error::invalid_argument("commit requires an active or staged transaction")),
        }

        let _guard = self.commit_lock.lock();
        let conflicts = validate(txn.watch_set(), substrate)?;
        if !conflicts.is_empty() {
            txn.set_state(TransactionState::Aborted);
            tracing::warn!(txn_id = txn.id(), conflicts = conflicts.len(), "commit: conflict detected");
            return Err(Error::conflict(format!("{} watched key(s) changed", conflicts.len())));
        }

        let new_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let ops: Vec<WriteOp> = txn
            .write_set()
            .iter()
            .map(|(&(collection, key), value)| WriteOp { collection, key, value: value.clone() })
            .collect();

        if let Err(e) = substrate.batch_write(ops, new_generation, flush) {
            txn.set_state(TransactionState::Aborted);
            return Err(e);
        }

        txn.set_state(TransactionState::Committed);
        tracing::debug!(
            txn_id = txn.id(),
            commit_generation = new_generation,
            watched = txn.watch_set().len(),
            written = txn.write_set().len(),
            "transaction committed"
        );
        Ok(new_generation)
    }

    /// Abort a transaction outright (spec §4.4: "any non-committed ->
    /// aborted via reset or free").
    pub fn abort(&self, txn: &mut TransactionContext) {
        txn.set_state(TransactionState::Aborted);
    }

    /// Reset a transaction back to `Active` with a freshly observed
    /// generation and cleared watch-/write-sets (spec §4.4).
    pub fn reset(&self, txn: &mut TransactionContext) {
        txn.reset(self.current_generation());
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polykv_core::value::WriteValue;
    use polykv_storage::MemorySubstrate;

    #[test]
    fn commit_assigns_increasing_generations() {
        let mgr = TransactionManager::new(0);
        let sub = MemorySubstrate::in_memory();

        let mut t1 = mgr.begin(None);
        t1.record_write(0, 1, WriteValue::Put(b"a".to_vec()));
        let g1 = mgr.commit(&mut t1, &sub, false).unwrap();

        let mut t2 = mgr.begin(None);
        t2.record_write(0, 2, WriteValue::Put(b"b".to_vec()));
        let g2 = mgr.commit(&mut t2, &sub, false).unwrap();

        assert!(g2 > g1);
        assert_eq!(mgr.current_generation(), g2);
    }

    #[test]
    fn concurrent_writer_causes_conflict_on_commit() {
        let mgr = TransactionManager::new(0);
        let sub = MemorySubstrate::in_memory();

        let mut t = mgr.begin(None);
        // T reads key 1 (absent) -> records a watch for absence.
        t.record_watch(0, 1, None);

        // A concurrent non-transactional write commits first.
        let mut other = mgr.begin(None);
        other.record_write(0, 1, WriteValue::Put(b"A".to_vec()));
        mgr.commit(&mut other, &sub, false).unwrap();

        // T writes and tries to commit: must conflict (spec §8 property 3).
        t.record_write(0, 1, WriteValue::Put(b"B".to_vec()));
        let result = mgr.commit(&mut t, &sub, false);
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert_eq!(t.state(), TransactionState::Aborted);
    }

    #[test]
    fn reset_clears_sets_and_refreshes_start_generation() {
        let mgr = TransactionManager::new(0);
        let sub = MemorySubstrate::in_memory();
        let mut t = mgr.begin(None);
        t.record_write(0, 1, WriteValue::Put(b"a".to_vec()));
        mgr.commit(&mut t, &sub, false).unwrap();

        mgr.reset(&mut t);
        assert_eq!(t.state(), TransactionState::Active);
        assert!(t.write_set().is_empty());
        assert_eq!(t.start_generation(), mgr.current_generation());
    }
}
