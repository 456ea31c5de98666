//! Core types and traits for the polykv storage engine.
//!
//! This crate defines the foundational vocabulary shared by every other
//! crate in the workspace:
//! - [`types`]: `Key`, `CollectionId`, `Generation`, `SnapshotId`, `TransactionId`
//! - [`value`]: the owned byte-sequence `Value` type and tombstone handling
//! - [`error`]: the unified `Error` enum and `Result` alias
//! - [`traits`]: the `Substrate` capability interface every storage backend implements
//! - [`options`]: the operation-options bitset
//! - [`limits`]: sentinels and well-known constants

#![warn(missing_docs)]

pub mod error;
pub mod limits;
pub mod options;
pub mod traits;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use options::Options;
pub use traits::{Substrate, WriteOp};
pub use types::{CollectionId, Generation, Key, SnapshotId, TransactionId, MAIN_COLLECTION};
pub use value::Value;
