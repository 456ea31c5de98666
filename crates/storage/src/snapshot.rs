//! Point-in-time snapshot view.
//!
//! A deep clone of the backing map at snapshot-creation time. Simple and
//! correct; expensive for large stores, acceptable for a reference
//! substrate. A production substrate would swap this for a lazy,
//! version-bounded view without changing the `Substrate` trait above it.

use polykv_core::types::{CollectionId, Key};
use std::collections::BTreeMap;

use crate::stored_value::StoredValue;

/// An immutable clone of the store's state at the moment it was created.
#[derive(Debug)]
pub struct ClonedSnapshot {
    pub(crate) data: BTreeMap<(CollectionId, Key), StoredValue>,
}

impl ClonedSnapshot {
    /// Capture a new snapshot from the current state of `data`.
    pub fn capture(data: &BTreeMap<(CollectionId, Key), StoredValue>) -> Self {
        ClonedSnapshot { data: data.clone() }
    }

    /// Point lookup within the snapshot. Tombstones read as absent.
    pub fn get(&self, collection: CollectionId, key: Key) -> Option<&[u8]> {
        self.data.get(&(collection, key)).and_then(|sv| sv.value.as_deref())
    }

    /// Ascending range scan within the snapshot, skipping tombstones.
    pub fn scan(&self, collection: CollectionId, start: Key, limit: usize) -> Vec<(Key, Vec<u8>)> {
        self.data
            .range((collection, start)..)
            .take_while(|((c, _), _)| *c == collection)
            .filter_map(|((_, k), sv)| sv.value.as_ref().map(|v| (*k, v.clone())))
            .take(limit)
            .collect()
    }
}
