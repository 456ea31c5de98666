//! Durability layer: the write-ahead log backing the `write_flush` barrier.
//!
//! Everything that touches disk for the reference substrate lives here:
//! a single append-only WAL file (one record per committed batch) plus a
//! reader used to replay it on reopen. No segment rotation, compaction, or
//! snapshot-bundle export — those are engine concerns out of this crate's
//! scope.

pub mod record;
pub mod wal;

pub use record::WalRecord;
pub use wal::{WalReader, WalWriter};
