//! The substrate capability interface (spec §4.2).
//!
//! Every storage backend implements `Substrate`. Upper layers (the blob,
//! document and graph layers, and the transaction manager) never compile
//! against a concrete engine type — they branch on the three capability
//! flags instead, per Design Notes §9's "runtime-dispatched capability
//! interface" guidance.

use crate::error::Result;
use crate::types::{CollectionId, Generation, Key, SnapshotId};
use crate::value::WriteValue;

/// A single ordered write, as queued by the transaction manager or a
/// non-transactional batched write (spec §4.2 `batch_write`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOp {
    /// Target collection.
    pub collection: CollectionId,
    /// Target key.
    pub key: Key,
    /// Put or delete.
    pub value: WriteValue,
}

/// Minimum contract an ordered key-value engine must provide (spec §4.2).
///
/// Collections are namespaced either by a native "column family", or by
/// prefixing keys with a fixed-width collection id; `native_collections`
/// tells upper layers which scheme is in effect.
pub trait Substrate: Send + Sync {
    /// Point lookup, optionally as-of a snapshot. Returns `None` if absent
    /// or tombstoned.
    fn get(
        &self,
        collection: CollectionId,
        key: Key,
        snapshot: Option<SnapshotId>,
    ) -> Result<Option<Vec<u8>>>;

    /// The generation of the last commit that touched `(collection, key)`,
    /// or `None` if the key has never been written. Used by the transaction
    /// manager's watch-set validation (spec §4.4).
    fn generation_of(&self, collection: CollectionId, key: Key) -> Result<Option<Generation>>;

    /// Ascending range scan starting at `start` (inclusive), up to `limit`
    /// keys, optionally as-of a snapshot. When `bulk` is set, ordering and
    /// uniqueness may be relaxed for throughput (spec §4.3 `scan`).
    fn scan(
        &self,
        collection: CollectionId,
        start: Key,
        limit: usize,
        snapshot: Option<SnapshotId>,
        bulk: bool,
    ) -> Result<Vec<(Key, Vec<u8>)>>;

    /// Apply a batch of writes atomically, stamping every entry with
    /// `generation`. `flush` requests a durability barrier before returning
    /// (spec §4.2, §6 `write_flush`).
    fn batch_write(&self, ops: Vec<WriteOp>, generation: Generation, flush: bool) -> Result<()>;

    /// Register a new point-in-time snapshot, returning its handle.
    fn create_snapshot(&self) -> Result<SnapshotId>;

    /// Release a previously created snapshot.
    fn release_snapshot(&self, snapshot: SnapshotId) -> Result<()>;

    /// Best-effort count of keys in `[start, end)` within `collection`.
    fn approximate_size(&self, collection: CollectionId, start: Key, end: Key) -> Result<u64>;

    /// Best-effort total byte footprint of the substrate.
    fn approximate_memory_usage(&self) -> Result<u64>;

    /// Whether this substrate implements collections natively (column
    /// families or equivalent) rather than emulating them via key prefixing.
    fn native_collections(&self) -> bool;

    /// Whether this substrate offers transactions natively, or whether the
    /// optimistic-concurrency layer above it is doing all the work.
    fn native_transactions(&self) -> bool;

    /// Whether this substrate offers snapshots natively.
    fn native_snapshots(&self) -> bool;

    /// Whether the collection registry may fall back to key-prefixing when
    /// `native_collections` is `false` (spec §4.6's last bullet: engines
    /// with neither native collections nor a prefix fallback expose only the
    /// main collection, and non-empty-name creation fails not-implemented).
    /// Every real substrate in this workspace supports prefixing — only a
    /// test double overrides this to `false`.
    fn supports_prefixed_collections(&self) -> bool {
        true
    }
}
