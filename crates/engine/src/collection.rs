//! Named logical namespaces mapped to a key-prefix scheme (spec §4.6).

use parking_lot::RwLock;
use polykv_core::error::{Error, Result};
use polykv_core::traits::Substrate;
use polykv_core::types::{CollectionId, DropMode, MAIN_COLLECTION};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

struct Registry {
    by_name: HashMap<String, CollectionId>,
    by_id: HashMap<CollectionId, String>,
}

/// Tracks named collections and hands out ids. The main collection (id `0`)
/// always exists and is never listed or droppable.
pub struct CollectionRegistry {
    inner: RwLock<Registry>,
    next_id: AtomicU64,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        CollectionRegistry {
            inner: RwLock::new(Registry { by_name: HashMap::new(), by_id: HashMap::new() }),
            next_id: AtomicU64::new(MAIN_COLLECTION + 1),
        }
    }

    /// Create a named collection. Fails with `InvalidArgument` on an empty
    /// or colliding name, and `NotImplemented` when the substrate offers
    /// neither native collections nor the key-prefix fallback.
    pub fn create(&self, name: &str, substrate: &dyn Substrate) -> Result<CollectionId> {
        if name.is_empty() {
            return Err(Error::invalid_argument("collection name must not be empty"));
        }
        if !substrate.native_collections() && !substrate.supports_prefixed_collections() {
            return Err(Error::not_implemented(
                "substrate exposes only the main collection",
            ));
        }

        let mut reg = self.inner.write();
        if reg.by_name.contains_key(name) {
            return Err(Error::invalid_argument(format!("collection '{name}' already exists")));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        reg.by_name.insert(name.to_string(), id);
        reg.by_id.insert(id, name.to_string());
        Ok(id)
    }

    /// Drop a collection. `mode` controls whether the handle, contents, or
    /// only values are removed; callers are responsible for clearing the
    /// underlying keys through the blob layer per `mode` before calling this
    /// (this registry only owns the name/id mapping).
    pub fn drop(&self, id: CollectionId, mode: DropMode) -> Result<()> {
        if id == MAIN_COLLECTION {
            return Err(Error::invalid_argument("the main collection cannot be dropped"));
        }
        let mut reg = self.inner.write();
        match mode {
            DropMode::KeysValsHandle => {
                if let Some(name) = reg.by_id.remove(&id) {
                    reg.by_name.remove(&name);
                } else {
                    return Err(Error::invalid_argument(format!("no such collection {id}")));
                }
            }
            DropMode::KeysVals | DropMode::Vals => {
                if !reg.by_id.contains_key(&id) {
                    return Err(Error::invalid_argument(format!("no such collection {id}")));
                }
                // Handle (and its name) survive; key/value removal happens
                // through the blob layer since this registry does not touch
                // storage directly.
            }
        }
        Ok(())
    }

    /// Enumerate `(id, name)` pairs; the main collection is never listed.
    pub fn list(&self) -> Vec<(CollectionId, String)> {
        let reg = self.inner.read();
        let mut entries: Vec<_> = reg.by_id.iter().map(|(&id, name)| (id, name.clone())).collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    /// Resolve a name to its collection id.
    pub fn resolve(&self, name: &str) -> Option<CollectionId> {
        self.inner.read().by_name.get(name).copied()
    }
}

impl Default for CollectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
