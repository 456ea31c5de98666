//! Reference substrate: an in-memory, ordered key-value engine implementing
//! `polykv_core::traits::Substrate` (spec §4.2).
//!
//! A `BTreeMap` behind a `parking_lot::RwLock` for ordered iteration, plus a
//! small snapshot registry. Collections are emulated via a `(CollectionId,
//! Key)` composite key (the "fixed-width collection-id key prefix" scheme
//! from spec §4.2) since this substrate has no native column families —
//! `native_collections()` returns `false` accordingly.

pub mod memory;
pub mod snapshot;
pub mod stored_value;

pub use memory::MemorySubstrate;
pub use snapshot::ClonedSnapshot;
pub use stored_value::StoredValue;
