//! Per-transaction watch-set + write-set (spec §3 "Transaction" entity).

use polykv_core::types::{CollectionId, Generation, Key, SnapshotId, TransactionId};
use polykv_core::value::WriteValue;
use std::collections::HashMap;

/// Lifecycle state of a transaction (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Executing: reads and writes are being accumulated.
    Active,
    /// Staged via a 2PC prepare: validated, commit slot reserved.
    Staged,
    /// Write-set applied atomically; a new generation was assigned.
    Committed,
    /// Validation failed, or the caller explicitly aborted.
    Aborted,
}

/// Accumulates the reads and writes of one transaction until it commits,
/// stages, or aborts.
pub struct TransactionContext {
    id: TransactionId,
    state: TransactionState,
    start_generation: Generation,
    /// `(collection, key) -> generation observed at first read`. `None`
    /// means the key was absent when first read.
    watch_set: HashMap<(CollectionId, Key), Option<Generation>>,
    /// `(collection, key) -> last write in this transaction`, last-writer-wins.
    write_set: HashMap<(CollectionId, Key), WriteValue>,
    snapshot_ref: Option<SnapshotId>,
}

impl TransactionContext {
    /// Begin a new, empty transaction.
    ///
    /// `snapshot_ref`, when set, pins every read in this transaction to that
    /// snapshot (spec §4.4, "Snapshot-transactions").
    pub fn new(id: TransactionId, start_generation: Generation, snapshot_ref: Option<SnapshotId>) -> Self {
        TransactionContext {
            id,
            state: TransactionState::Active,
            start_generation,
            watch_set: HashMap::new(),
            write_set: HashMap::new(),
            snapshot_ref,
        }
    }

    /// Opaque transaction handle.
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Generation observed when this transaction began (or was last reset).
    pub fn start_generation(&self) -> Generation {
        self.start_generation
    }

    /// The pinned read snapshot, if this is a snapshot-transaction.
    pub fn snapshot_ref(&self) -> Option<SnapshotId> {
        self.snapshot_ref
    }

    /// Look up `(collection, key)` in the write-set — write-set entries
    /// shadow substrate reads within the same transaction (spec §3
    /// invariants, §4.3 `read`).
    pub fn write_set_get(&self, collection: CollectionId, key: Key) -> Option<&WriteValue> {
        self.write_set.get(&(collection, key))
    }

    /// Record this transaction's write-set entry for `(collection, key)`,
    /// overwriting any earlier write in the same transaction
    /// (last-writer-wins, spec §4.3 `write`).
    pub fn record_write(&mut self, collection: CollectionId, key: Key, value: WriteValue) {
        self.write_set.insert((collection, key), value);
    }

    /// Record a watch entry for `(collection, key)` the first time it is
    /// read in this transaction; later reads of the same key do not
    /// overwrite the recorded generation (spec §3 invariants, §4.4
    /// "Watching can be disabled").
    pub fn record_watch(&mut self, collection: CollectionId, key: Key, observed: Option<Generation>) {
        self.watch_set.entry((collection, key)).or_insert(observed);
    }

    /// The accumulated watch-set.
    pub fn watch_set(&self) -> &HashMap<(CollectionId, Key), Option<Generation>> {
        &self.watch_set
    }

    /// The accumulated write-set.
    pub fn write_set(&self) -> &HashMap<(CollectionId, Key), WriteValue> {
        &self.write_set
    }

    /// `true` if this transaction has made no writes (a pure read
    /// transaction never needs a WAL record).
    pub fn is_read_only(&self) -> bool {
        self.write_set.is_empty()
    }

    pub(crate) fn set_state(&mut self, state: TransactionState) {
        self.state = state;
    }

    /// Reset an aborted or committed transaction back to `Active` with
    /// cleared watch-/write-sets and a refreshed `start_generation` (spec
    /// §4.4: "A transaction reused via reset returns to active with cleared
    /// watch-/write-sets; its start_generation is refreshed").
    pub fn reset(&mut self, new_start_generation: Generation) {
        self.state = TransactionState::Active;
        self.start_generation = new_start_generation;
        self.watch_set.clear();
        self.write_set.clear();
    }
}
