//! Transactional execution and batch I/O layer: arena + strided views, the
//! blob/document/graph modality layers, the snapshot and collection
//! registries, and the `Database` facade that wires them to a substrate.

pub mod arena;
pub mod blob;
pub mod collection;
pub mod database;
pub mod document;
pub mod graph;
pub mod snapshot_manager;
pub mod strided;

pub use arena::Arena;
pub use blob::{
    MeasureOutputs, MeasureRequest, ReadOutputs, ReadRequest, SampleOutputs, SampleRequest,
    ScanOutputs, ScanRequest, WriteRequest,
};
pub use collection::CollectionRegistry;
pub use database::{config::DatabaseConfig, Database};
pub use snapshot_manager::SnapshotManager;
pub use strided::Strided;
