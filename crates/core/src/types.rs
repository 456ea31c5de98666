//! Primitive identifiers shared across the engine.
//!
//! Per spec §3: `Key` is a signed 64-bit integer, `CollectionId` an opaque
//! 64-bit handle, `Generation` a monotonic 64-bit sequence number, and
//! `SnapshotId`/`TransactionId` opaque 64-bit handles minted by their
//! respective managers.

/// A user-addressable record key: a signed 64-bit integer.
pub type Key = i64;

/// Opaque handle identifying a collection (logical namespace).
pub type CollectionId = u64;

/// Monotonic sequence number assigned to a commit.
///
/// Strictly increases on every commit that produced at least one durable
/// write (spec §3, Invariants).
pub type Generation = u64;

/// Opaque handle identifying a point-in-time snapshot.
pub type SnapshotId = u64;

/// Opaque handle identifying a transaction.
pub type TransactionId = u64;

/// The handle of the always-present, unnamed main collection.
///
/// Per spec §3 and §6: id `0`, cannot be removed, never appears in the
/// collection registry's `list` results.
pub const MAIN_COLLECTION: CollectionId = 0;

/// Sentinel written into a `lengths` output column when the corresponding
/// entry is absent (spec §4.3, §6).
pub const MISSING_LENGTH: u32 = 0xFFFF_FFFF;

/// Sentinel representing "no key" / an unresolved key (spec §6).
pub const UNKNOWN_KEY: Key = i64::MAX;

/// How a collection's stored bytes should be reinterpreted by the modality
/// layer (spec §3, "Collection" entity).
///
/// The engine itself only ever stores bytes; `Modality` is metadata the
/// collection registry remembers so callers can't accidentally read a graph
/// collection through the document layer without raising an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    /// Opaque binary objects, no reinterpretation.
    Blob,
    /// Hierarchical documents (JSON/MsgPack/BSON/CBOR), canonical MsgPack on disk.
    Document,
    /// Labeled directed graph: adjacency-list-per-vertex encoding.
    Graph,
    /// String-keyed paths.
    Paths,
}

/// The three collection-drop behaviors from spec §4.6 / §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropMode {
    /// Remove the collection handle and all its contents.
    KeysValsHandle,
    /// Remove all keys and values but keep the handle registered.
    KeysVals,
    /// Keep keys registered but truncate every value to zero length.
    Vals,
}

/// Which side(s) of a directed edge a graph operation targets (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRole {
    /// Either outgoing or incoming.
    Any,
    /// Only edges where the vertex is the source.
    Source,
    /// Only edges where the vertex is the target.
    Target,
}
