//! Watch-set validation (spec §4.4, validation algorithm step 2).

use polykv_core::traits::Substrate;
use polykv_core::types::{CollectionId, Generation, Key};
use std::collections::HashMap;

/// One watched key whose generation changed (or whose presence flipped)
/// between read time and validation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConflict {
    /// The collection of the conflicting key.
    pub collection: CollectionId,
    /// The conflicting key.
    pub key: Key,
    /// Generation observed when the transaction first read this key (`None`
    /// if it was absent at read time).
    pub read_generation: Option<Generation>,
    /// Generation observed at validation time (`None` if absent now).
    pub current_generation: Option<Generation>,
}

/// Check every entry of `watch_set` against the substrate's current state.
///
/// A conflict is any generation mismatch, which by construction also covers
/// "present at read, absent now" and "absent at read, present now" (spec
/// §4.4 step 2: "or the key is absent when it was present at read [and vice
/// versa]"), since absence is represented as `None` on both sides.
pub fn validate(
    watch_set: &HashMap<(CollectionId, Key), Option<Generation>>,
    substrate: &dyn Substrate,
) -> polykv_core::error::Result<Vec<WatchConflict>> {
    let mut conflicts = Vec::new();
    for (&(collection, key), &read_generation) in watch_set {
        let current_generation = substrate.generation_of(collection, key)?;
        if current_generation != read_generation {
            conflicts.push(WatchConflict { collection, key, read_generation, current_generation });
        }
    }
    Ok(conflicts)
}
