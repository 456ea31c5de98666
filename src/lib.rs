//! polykv: an embedded, multi-modal, transactional key-value storage engine.
//!
//! Values are addressed by `(collection, key)` pairs and can be interpreted
//! as opaque blobs, hierarchical documents, or labeled directed graphs.
//! Transactions use optimistic concurrency control with watch-set conflict
//! detection; reads can also be pinned to a point-in-time snapshot.
//!
//! ```no_run
//! use polykv::{Database, DatabaseConfig};
//!
//! fn main() -> polykv::Result<()> {
//!     let db = Database::open(&DatabaseConfig::for_directory("./my-data"))?;
//!     db.run_transaction(3, |txn| {
//!         txn.record_write(0, 1, polykv::WriteValue::Put(b"hello".to_vec()));
//!         Ok(())
//!     })?;
//!     Ok(())
//! }
//! ```
//!
//! This crate re-exports the engine's public surface; `polykv_engine`,
//! `polykv_core`, `polykv_concurrency`, `polykv_storage`, and
//! `polykv_durability` remain usable directly for callers that want the
//! layered API without the facade.

pub use polykv_core::error::{Error, Result};
pub use polykv_core::options::Options;
pub use polykv_core::types::{
    CollectionId, DropMode, EdgeRole, Generation, Key, Modality, SnapshotId, TransactionId, MAIN_COLLECTION,
};
pub use polykv_core::value::{Value, WriteValue};

pub use polykv_concurrency::{TransactionContext, TransactionManager, TransactionState};

pub use polykv_engine::collection::CollectionRegistry;
pub use polykv_engine::database::config::{DataDirectoryConfig, DatabaseConfig, EngineConfig, MaxSize};
pub use polykv_engine::database::Database;
pub use polykv_engine::document;
pub use polykv_engine::graph;
pub use polykv_engine::snapshot_manager::SnapshotManager;
pub use polykv_engine::{
    blob, Arena, MeasureOutputs, MeasureRequest, ReadOutputs, ReadRequest, SampleOutputs,
    SampleRequest, ScanOutputs, ScanRequest, Strided, WriteRequest,
};
