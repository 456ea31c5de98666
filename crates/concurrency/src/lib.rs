//! Optimistic-concurrency transaction manager (spec §4.4).
//!
//! Three-way split: a per-transaction context that accumulates a watch-set
//! and write-set ([`transaction`]), a manager that serializes and executes
//! the commit protocol ([`manager`]), and a standalone validation pass
//! ([`validation`]) the manager calls at stage/commit time. The conflict
//! unit is `(collection, key) -> generation observed at read`, per spec
//! §3/§4.4 — this spec has no sub-document conflict detection to support at
//! the transaction layer (that's the document layer's problem, built on top
//! of this).

pub mod manager;
pub mod transaction;
pub mod validation;

pub use manager::TransactionManager;
pub use transaction::{TransactionContext, TransactionState};
pub use validation::{validate, WatchConflict};
