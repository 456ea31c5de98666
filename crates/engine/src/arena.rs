//! Bump-allocated scratch memory reused across calls (spec §4.1).
//!
//! C-ABI arenas hand back raw pointers with lifetime tied to the arena; in
//! safe Rust the equivalent is an owned buffer living *inside* the arena,
//! borrowed out to the caller for the arena's lifetime. `Arena` therefore
//! stores each call's output columns as owned `Vec`s in a chunk list and
//! returns `&[T]`/`&str` slices into them.

enum Chunk {
    Bytes(Vec<u8>),
    Keys(Vec<i64>),
    Offsets(Vec<u32>),
    Presences(Vec<bool>),
}

/// Caller-owned scratch region that engine operations allocate their output
/// columns into. Not `Sync`: each caller must own its own arena (spec §5).
pub struct Arena {
    // `UnsafeCell` so a single call site can allocate several output columns
    // (e.g. `ReadOutputs`'s four fields) from one `&'a mut Arena`, each
    // borrowed out for the full `'a`: every `alloc_*` only ever appends, so
    // previously returned slices point at heap allocations owned by `Vec`s
    // that are moved, never mutated, by later pushes.
    chunks: std::cell::UnsafeCell<Vec<Chunk>>,
    // Marker only: `Cell` is `!Sync`, which is all we need from it.
    _not_sync: std::marker::PhantomData<std::cell::Cell<()>>,
}

impl Arena {
    /// A fresh, empty arena.
    pub fn new() -> Self {
        Arena { chunks: std::cell::UnsafeCell::new(Vec::new()), _not_sync: std::marker::PhantomData }
    }

    /// Reset for a new call. Defaults to truncating all prior output
    /// (`dont_discard_memory` in spec §6 skips this call site entirely).
    pub fn reset(&mut self) {
        self.chunks.get_mut().clear();
    }

    /// Allocate a values tape and return a borrow tied to the arena.
    pub fn alloc_bytes(&self, bytes: Vec<u8>) -> &[u8] {
        // Safety: `Arena` is `!Sync`, so no concurrent access is possible;
        // pushing never touches earlier chunks' heap allocations.
        let chunks = unsafe { &mut *self.chunks.get() };
        chunks.push(Chunk::Bytes(bytes));
        match chunks.last().unwrap() {
            Chunk::Bytes(b) => b.as_slice(),
            _ => unreachable!(),
        }
    }

    /// Allocate a keys column.
    pub fn alloc_keys(&self, keys: Vec<i64>) -> &[i64] {
        let chunks = unsafe { &mut *self.chunks.get() };
        chunks.push(Chunk::Keys(keys));
        match chunks.last().unwrap() {
            Chunk::Keys(k) => k.as_slice(),
            _ => unreachable!(),
        }
    }

    /// Allocate a `u32` column: Arrow-convention `offsets` (length
    /// `tasks_count + 1`), `lengths`, or scan `counts` all share this shape.
    pub fn alloc_u32s(&self, values: Vec<u32>) -> &[u32] {
        let chunks = unsafe { &mut *self.chunks.get() };
        chunks.push(Chunk::Offsets(values));
        match chunks.last().unwrap() {
            Chunk::Offsets(o) => o.as_slice(),
            _ => unreachable!(),
        }
    }

    /// Allocate a presence bitset.
    pub fn alloc_presences(&self, presences: Vec<bool>) -> &[bool] {
        let chunks = unsafe { &mut *self.chunks.get() };
        chunks.push(Chunk::Presences(presences));
        match chunks.last().unwrap() {
            Chunk::Presences(p) => p.as_slice(),
            _ => unreachable!(),
        }
    }

    /// Number of chunks currently held (test/diagnostic hook).
    pub fn chunk_count(&self) -> usize {
        unsafe { &*self.chunks.get() }.len()
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_prior_allocations() {
        let mut arena = Arena::new();
        arena.alloc_bytes(vec![1, 2, 3]);
        arena.alloc_keys(vec![1, 2]);
        assert_eq!(arena.chunk_count(), 2);
        arena.reset();
        assert_eq!(arena.chunk_count(), 0);
    }

    #[test]
    fn allocated_slices_round_trip() {
        let mut arena = Arena::new();
        let bytes = arena.alloc_bytes(b"hello".to_vec());
        assert_eq!(bytes, b"hello");
        let keys = arena.alloc_keys(vec![10, 20, 30]);
        assert_eq!(keys, &[10, 20, 30]);
    }
}
