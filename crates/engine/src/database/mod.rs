//! Database facade: owns the substrate and the engine-wide managers, and
//! wires `DatabaseConfig` to a running substrate (spec §6, C12).
//!
//! Plays the same role a storage engine's top-level handle usually does:
//! owns the substrate plus the three engine-wide managers
//! (`TransactionManager`, `SnapshotManager`, `CollectionRegistry`) and
//! exposes `open`/`in_memory`/accessors on top of them.

pub mod config;

use config::DatabaseConfig;
use polykv_concurrency::{TransactionContext, TransactionManager};
use polykv_core::error::{Error, Result};
use polykv_core::types::SnapshotId;
use polykv_storage::MemorySubstrate;
use std::sync::Arc;

use crate::collection::CollectionRegistry;
use crate::snapshot_manager::SnapshotManager;
use polykv_core::traits::Substrate;
use polykv_durability::WalReader;

const WAL_FILE_NAME: &str = "wal.log";

/// An open database: a substrate plus the engine-wide managers layered on
/// top of it (spec §3 "Database").
pub struct Database {
    substrate: Arc<dyn Substrate>,
    transactions: TransactionManager,
    snapshots: SnapshotManager,
    collections: CollectionRegistry,
}

impl Database {
    /// Open (creating if absent) the database described by `config`.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.directory)
            .map_err(|e| Error::substrate(format!("cannot create directory '{}': {e}", config.directory)))?;
        let wal_path = std::path::Path::new(&config.directory).join(WAL_FILE_NAME);
        // `MemorySubstrate::open` replays the WAL for its own state but
        // doesn't surface the highest generation it saw, so the WAL is read
        // a second time here to seed the transaction manager's counter —
        // otherwise a reopened database would hand out generations that
        // collide with (or fall behind) generations already on disk,
        // breaking spec §3's "strictly increases on every commit" invariant.
        let recovered_generation =
            WalReader::open(&wal_path)?.replay_all()?.iter().map(|r| r.generation).max().unwrap_or(0);
        let substrate = MemorySubstrate::open(wal_path)?;
        Ok(Self::from_substrate(Arc::new(substrate), recovered_generation))
    }

    /// An ephemeral, non-persistent database (tests, scratch use).
    pub fn in_memory() -> Self {
        Self::from_substrate(Arc::new(MemorySubstrate::in_memory()), 0)
    }

    fn from_substrate(substrate: Arc<dyn Substrate>, initial_generation: u64) -> Self {
        Database {
            substrate,
            transactions: TransactionManager::new(initial_generation),
            snapshots: SnapshotManager::new(),
            collections: CollectionRegistry::new(),
        }
    }

    /// The underlying substrate, for the blob/document/graph layer
    /// functions that take `&dyn Substrate` directly.
    pub fn substrate(&self) -> &dyn Substrate {
        self.substrate.as_ref()
    }

    /// The transaction manager.
    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    /// The snapshot manager.
    pub fn snapshots(&self) -> &SnapshotManager {
        &self.snapshots
    }

    /// The collection registry.
    pub fn collections(&self) -> &CollectionRegistry {
        &self.collections
    }

    /// Begin a new transaction, optionally pinned to a snapshot.
    pub fn begin(&self, snapshot_ref: Option<SnapshotId>) -> TransactionContext {
        self.transactions.begin(snapshot_ref)
    }

    /// Run `f` inside a fresh transaction and commit it, retrying up to
    /// `max_retries` additional times on `Error::Conflict`.
    ///
    /// Spec §7: "Transactions do not auto-retry; the caller is responsible
    /// for the retry loop." This is that retry loop, offered as an opt-in
    /// convenience — `max_retries = 0` is a single attempt with no retry.
    pub fn run_transaction<T>(
        &self,
        max_retries: usize,
        mut f: impl FnMut(&mut TransactionContext) -> Result<T>,
    ) -> Result<T> {
        let mut txn = self.begin(None);
        let mut attempt = 0;
        loop {
            match f(&mut txn).and_then(|value| self.transactions.commit(&mut txn, self.substrate(), false).map(|_| value)) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    attempt += 1;
                    tracing::debug!(attempt, "run_transaction: retrying after conflict");
                    self.transactions.reset(&mut txn);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
