//! The storage-layer record: a tombstone-aware value stamped with the
//! generation of the commit that produced it (spec §3, "stored record").

/// One entry in the substrate's backing map.
///
/// Tombstones are kept as entries with `value: None` rather than removed
/// outright, so `generation_of` can keep answering "what generation last
/// touched this key" after a delete — the transaction manager's watch-set
/// validation needs that to detect "present at read, absent at commit" and
/// vice versa (spec §4.4, validation algorithm step 2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    /// `None` is a tombstone.
    pub value: Option<Vec<u8>>,
    /// Generation of the commit that produced this version.
    pub generation: u64,
}

impl StoredValue {
    /// Build a present value.
    pub fn present(value: Vec<u8>, generation: u64) -> Self {
        StoredValue { value: Some(value), generation }
    }

    /// Build a tombstone.
    pub fn tombstone(generation: u64) -> Self {
        StoredValue { value: None, generation }
    }

    /// `true` unless this is a tombstone.
    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }
}
