//! Translates batched read/write/scan/sample/measure calls into substrate
//! calls (spec §4.3). Every other modality layer (document, graph) routes
//! its storage through here so it inherits transactional semantics for free.

use crate::arena::Arena;
use crate::strided::Strided;
use polykv_core::error::{Error, Result};
use polykv_core::options::Options;
use polykv_core::traits::Substrate;
use polykv_core::types::{CollectionId, Key, MAIN_COLLECTION, MISSING_LENGTH};
use polykv_core::value::WriteValue;
use polykv_concurrency::{TransactionContext, TransactionManager};

/// Inputs for a batched `read` (spec §4.3 `read`).
pub struct ReadRequest<'i, 't> {
    pub tasks_count: usize,
    pub collections: Strided<'i, CollectionId>,
    pub keys: Strided<'i, Key>,
    pub options: Options,
    pub transaction: Option<&'t mut TransactionContext>,
    pub snapshot: Option<u64>,
}

/// Outputs of a batched `read`, arena-backed.
pub struct ReadOutputs<'a> {
    pub presences: &'a [bool],
    pub lengths: &'a [u32],
    pub offsets: &'a [u32],
    pub values: &'a [u8],
}

fn check_mutual_exclusion(transaction: &Option<impl Sized>, snapshot: Option<u64>) -> Result<()> {
    if transaction.is_some() && snapshot.is_some() {
        return Err(Error::invalid_argument("transaction and snapshot are mutually exclusive"));
    }
    Ok(())
}

fn resolve_collection(collections: &Strided<'_, CollectionId>, i: usize) -> CollectionId {
    collections.get(i).copied().unwrap_or(MAIN_COLLECTION)
}

fn required_key(keys: &Strided<'_, Key>, i: usize) -> Result<Key> {
    keys.get(i).copied().ok_or_else(|| Error::invalid_argument("keys column shorter than tasks_count"))
}

/// Concatenate present values into one tape and derive Arrow-convention
/// offsets from their lengths (spec §4.3, testable property 7).
fn offsets_from_lengths(lengths: &[u32]) -> Vec<u32> {
    let mut offsets = Vec::with_capacity(lengths.len() + 1);
    let mut acc: u32 = 0;
    offsets.push(0);
    for &len in lengths {
        if len != MISSING_LENGTH {
            acc += len;
        }
        offsets.push(acc);
    }
    offsets
}

/// `read`: for each task, consult the transaction's write-set first, then
/// the substrate at `transaction.snapshot_ref` or `snapshot` or HEAD.
pub fn read<'a>(
    substrate: &dyn Substrate,
    mut request: ReadRequest<'_, '_>,
    arena: &'a mut Arena,
) -> Result<ReadOutputs<'a>> {
    if !request.options.dont_discard_memory() {
        arena.reset();
    }
    check_mutual_exclusion(&request.transaction, request.snapshot)?;

    let watch = !request.options.dont_watch();
    let mut presences = Vec::with_capacity(request.tasks_count);
    let mut lengths = Vec::with_capacity(request.tasks_count);
    let mut values = Vec::new();

    for i in 0..request.tasks_count {
        let collection = resolve_collection(&request.collections, i);
        let key = required_key(&request.keys, i)?;

        let value = match request.transaction.as_deref_mut() {
            Some(txn) => {
                if let Some(write) = txn.write_set_get(collection, key) {
                    write.clone().into_option()
                } else {
                    let snapshot = txn.snapshot_ref();
                    let observed = substrate.get(collection, key, snapshot)?;
                    if watch {
                        let generation = substrate.generation_of(collection, key)?;
                        txn.record_watch(collection, key, generation);
                    }
                    observed
                }
            }
            None => substrate.get(collection, key, request.snapshot)?,
        };

        match value {
            Some(bytes) => {
                presences.push(true);
                lengths.push(bytes.len() as u32);
                values.extend_from_slice(&bytes);
            }
            None => {
                presences.push(false);
                lengths.push(MISSING_LENGTH);
            }
        }
    }

    let offsets = offsets_from_lengths(&lengths);
    Ok(ReadOutputs {
        presences: arena.alloc_presences(presences),
        lengths: arena.alloc_u32s(lengths),
        offsets: arena.alloc_u32s(offsets),
        values: arena.alloc_bytes(values),
    })
}

/// Inputs for a batched `write` (spec §4.3 `write`).
pub struct WriteRequest<'i, 't> {
    pub tasks_count: usize,
    pub collections: Strided<'i, CollectionId>,
    pub keys: Strided<'i, Key>,
    pub presences: Strided<'i, bool>,
    pub values: &'i [u8],
    pub offsets: Strided<'i, u32>,
    pub lengths: Strided<'i, u32>,
    pub options: Options,
    pub transaction: Option<&'t mut TransactionContext>,
}

fn effective_value(
    presences: &Strided<'_, bool>,
    values: &[u8],
    offsets: &Strided<'_, u32>,
    lengths: &Strided<'_, u32>,
    i: usize,
) -> Option<Vec<u8>> {
    let present = presences.get(i).copied().unwrap_or(true);
    if !present {
        return None;
    }
    let start = offsets.get(i).copied().unwrap_or(0) as usize;
    let len = match lengths.get(i) {
        Some(&len) => len as usize,
        None => {
            // No explicit length: derive from consecutive offsets, falling
            // back to NUL-termination (spec §4.1, §4.3).
            match offsets.get(i + 1) {
                Some(&next) => (next as usize).saturating_sub(start),
                None => values[start..].iter().position(|&b| b == 0).unwrap_or(values.len() - start),
            }
        }
    };
    Some(values[start..start + len].to_vec())
}

/// `write`: without a transaction, stages and commits an ephemeral
/// single-use transaction through `manager` so a non-transactional write
/// still goes through the ordinary generation-allocation and watch-set
/// machinery (spec §4.4 treats every write as *some* transaction's commit).
/// With a caller-supplied transaction, stages into its write-set and leaves
/// committing to the caller.
pub fn write(substrate: &dyn Substrate, manager: &TransactionManager, mut request: WriteRequest) -> Result<()> {
    let mut ephemeral = match request.transaction {
        Some(_) => None,
        None => Some(manager.begin(None)),
    };
    let txn = request
        .transaction
        .as_deref_mut()
        .or(ephemeral.as_mut())
        .expect("either the caller's transaction or the ephemeral one is always present");

    for i in 0..request.tasks_count {
        let collection = resolve_collection(&request.collections, i);
        let key = required_key(&request.keys, i)?;
        let value = effective_value(&request.presences, request.values, &request.offsets, &request.lengths, i);
        txn.record_write(collection, key, WriteValue::from_option(value));
    }

    if let Some(mut ephemeral) = ephemeral {
        manager.commit(&mut ephemeral, substrate, request.options.write_flush())?;
    }
    Ok(())
}

/// Inputs for a batched `scan` (spec §4.3 `scan`).
pub struct ScanRequest<'i> {
    pub tasks_count: usize,
    pub collections: Strided<'i, CollectionId>,
    pub start_keys: Strided<'i, Key>,
    pub count_limits: Strided<'i, u32>,
    pub options: Options,
    pub snapshot: Option<u64>,
}

/// Outputs of a batched `scan`.
pub struct ScanOutputs<'a> {
    pub offsets: &'a [u32],
    pub counts: &'a [u32],
    pub keys: &'a [i64],
}

/// `scan`: per task, up to `count_limits[i]` ascending keys `>= start_keys[i]`.
/// Never populates a transaction's watch set (spec §4.3, §9 Open Questions).
pub fn scan<'a>(substrate: &dyn Substrate, request: ScanRequest, arena: &'a mut Arena) -> Result<ScanOutputs<'a>> {
    if !request.options.dont_discard_memory() {
        arena.reset();
    }
    let bulk = request.options.scan_bulk();
    let mut counts = Vec::with_capacity(request.tasks_count);
    let mut keys = Vec::new();

    for i in 0..request.tasks_count {
        let collection = resolve_collection(&request.collections, i);
        let start = request.start_keys.get(i).copied().unwrap_or(Key::MIN);
        let limit = request.count_limits.get(i).copied().unwrap_or(0) as usize;
        let rows = substrate.scan(collection, start, limit, request.snapshot, bulk)?;
        counts.push(rows.len() as u32);
        keys.extend(rows.into_iter().map(|(k, _)| k));
    }

    let offsets = offsets_from_lengths(&counts);
    Ok(ScanOutputs {
        offsets: arena.alloc_u32s(offsets),
        counts: arena.alloc_u32s(counts),
        keys: arena.alloc_keys(keys),
    })
}

/// Inputs for `sample` — same shape as `scan` minus `start_keys`.
pub struct SampleRequest<'i> {
    pub tasks_count: usize,
    pub collections: Strided<'i, CollectionId>,
    pub count_limits: Strided<'i, u32>,
}

/// Outputs of `sample`: unordered, same shape as [`ScanOutputs`].
pub struct SampleOutputs<'a> {
    pub offsets: &'a [u32],
    pub counts: &'a [u32],
    pub keys: &'a [i64],
}

/// `sample`: uniform reservoir sampling via Vitter's Algorithm R, delegated
/// to the substrate-specific sampler (only `polykv-storage::reservoir_sample`
/// is wired up; other substrates would need their own O(N) single-pass
/// sampler since the `Substrate` trait has no generic scan-everything op).
pub fn sample<'a>(
    sample_fn: impl Fn(CollectionId, usize) -> Result<Vec<(Key, Vec<u8>)>>,
    request: SampleRequest,
    arena: &'a mut Arena,
) -> Result<SampleOutputs<'a>> {
    arena.reset();
    let mut counts = Vec::with_capacity(request.tasks_count);
    let mut keys = Vec::new();

    for i in 0..request.tasks_count {
        let collection = resolve_collection(&request.collections, i);
        let limit = request.count_limits.get(i).copied().unwrap_or(0) as usize;
        let rows = sample_fn(collection, limit)?;
        counts.push(rows.len() as u32);
        keys.extend(rows.into_iter().map(|(k, _)| k));
    }

    let offsets = offsets_from_lengths(&counts);
    Ok(SampleOutputs {
        offsets: arena.alloc_u32s(offsets),
        counts: arena.alloc_u32s(counts),
        keys: arena.alloc_keys(keys),
    })
}

/// Inputs for `measure` (spec §4.3 `measure`).
pub struct MeasureRequest<'i> {
    pub tasks_count: usize,
    pub collections: Strided<'i, CollectionId>,
    pub start_keys: Strided<'i, Key>,
    pub end_keys: Strided<'i, Key>,
}

/// Best-effort `(min, max)` pairs per task for cardinality, value bytes, and
/// space usage. Exact values are not required (spec §4.3 `measure`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeasureOutputs {
    pub cardinality: (u64, u64),
    pub value_bytes: (u64, u64),
    pub space_usage: (u64, u64),
}

/// `measure`: best-effort estimates from the substrate. The reference
/// substrate reports exact cardinality (`approximate_size` happens to be
/// exact for an in-memory `BTreeMap`) and folds per-task min/max across the
/// batch, since the substrate contract has no per-key size estimator.
pub fn measure(substrate: &dyn Substrate, request: MeasureRequest) -> Result<Vec<MeasureOutputs>> {
    let mut out = Vec::with_capacity(request.tasks_count);
    let total_bytes = substrate.approximate_memory_usage()?;
    for i in 0..request.tasks_count {
        let collection = resolve_collection(&request.collections, i);
        let start = request.start_keys.get(i).copied().unwrap_or(Key::MIN);
        let end = request.end_keys.get(i).copied().unwrap_or(Key::MAX);
        let cardinality = substrate.approximate_size(collection, start, end)?;
        out.push(MeasureOutputs {
            cardinality: (cardinality, cardinality),
            value_bytes: (0, total_bytes),
            space_usage: (0, total_bytes),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polykv_concurrency::TransactionManager;
    use polykv_storage::MemorySubstrate;

    #[test]
    fn s1_single_write_read() {
        let sub = MemorySubstrate::in_memory();
        let mgr = TransactionManager::new(0);
        write(
            &sub,
            &mgr,
            WriteRequest {
                tasks_count: 1,
                collections: Strided::empty(),
                keys: Strided::dense(&[42]),
                presences: Strided::empty(),
                values: b"purpose of life",
                offsets: Strided::empty(),
                lengths: Strided::dense(&[15]),
                options: Options::none(),
                transaction: None,
            },
        )
        .unwrap();

        let mut arena = Arena::new();
        let out = read(
            &sub,
            ReadRequest {
                tasks_count: 1,
                collections: Strided::empty(),
                keys: Strided::dense(&[42]),
                options: Options::none(),
                transaction: None,
                snapshot: None,
            },
            &mut arena,
        )
        .unwrap();

        assert_eq!(out.presences, &[true]);
        assert_eq!(out.lengths, &[15]);
        assert_eq!(out.values, b"purpose of life");
    }

    #[test]
    fn s2_missing_key() {
        let sub = MemorySubstrate::in_memory();
        let mut arena = Arena::new();
        let out = read(
            &sub,
            ReadRequest {
                tasks_count: 1,
                collections: Strided::empty(),
                keys: Strided::dense(&[99]),
                options: Options::none(),
                transaction: None,
                snapshot: None,
            },
            &mut arena,
        )
        .unwrap();

        assert_eq!(out.presences, &[false]);
        assert_eq!(out.lengths, &[MISSING_LENGTH]);
        assert_eq!(out.offsets, &[0, 0]);
    }

    #[test]
    fn s3_conflict() {
        let sub = MemorySubstrate::in_memory();
        let mgr = TransactionManager::new(0);
        let mut txn = mgr.begin(None);
        let mut arena = Arena::new();

        read(
            &sub,
            ReadRequest {
                tasks_count: 1,
                collections: Strided::empty(),
                keys: Strided::dense(&[1]),
                options: Options::none(),
                transaction: Some(&mut txn),
                snapshot: None,
            },
            &mut arena,
        )
        .unwrap();

        write(
            &sub,
            &mgr,
            WriteRequest {
                tasks_count: 1,
                collections: Strided::empty(),
                keys: Strided::dense(&[1]),
                presences: Strided::empty(),
                values: b"A",
                offsets: Strided::empty(),
                lengths: Strided::dense(&[1]),
                options: Options::none(),
                transaction: None,
            },
        )
        .unwrap();

        write(
            &sub,
            &mgr,
            WriteRequest {
                tasks_count: 1,
                collections: Strided::empty(),
                keys: Strided::dense(&[1]),
                presences: Strided::empty(),
                values: b"B",
                offsets: Strided::empty(),
                lengths: Strided::dense(&[1]),
                options: Options::none(),
                transaction: Some(&mut txn),
            },
        )
        .unwrap();

        let result = mgr.commit(&mut txn, &sub, false);
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn s4_snapshot_read() {
        let sub = MemorySubstrate::in_memory();
        let mgr = TransactionManager::new(0);
        write(
            &sub,
            &mgr,
            WriteRequest {
                tasks_count: 1,
                collections: Strided::empty(),
                keys: Strided::dense(&[1]),
                presences: Strided::empty(),
                values: b"v1",
                offsets: Strided::empty(),
                lengths: Strided::dense(&[2]),
                options: Options::none(),
                transaction: None,
            },
        )
        .unwrap();
        let snap = sub.create_snapshot().unwrap();
        write(
            &sub,
            &mgr,
            WriteRequest {
                tasks_count: 1,
                collections: Strided::empty(),
                keys: Strided::dense(&[1]),
                presences: Strided::empty(),
                values: b"v2",
                offsets: Strided::empty(),
                lengths: Strided::dense(&[2]),
                options: Options::none(),
                transaction: None,
            },
        )
        .unwrap();

        let mut arena = Arena::new();
        let head = read(
            &sub,
            ReadRequest {
                tasks_count: 1,
                collections: Strided::empty(),
                keys: Strided::dense(&[1]),
                options: Options::none(),
                transaction: None,
                snapshot: None,
            },
            &mut arena,
        )
        .unwrap();
        assert_eq!(head.values, b"v2");

        let mut arena2 = Arena::new();
        let at_snap = read(
            &sub,
            ReadRequest {
                tasks_count: 1,
                collections: Strided::empty(),
                keys: Strided::dense(&[1]),
                options: Options::none(),
                transaction: None,
                snapshot: Some(snap),
            },
            &mut arena2,
        )
        .unwrap();
        assert_eq!(at_snap.values, b"v1");
    }

    #[test]
    fn s5_range_scan() {
        let sub = MemorySubstrate::in_memory();
        let mgr = TransactionManager::new(0);
        write(
            &sub,
            &mgr,
            WriteRequest {
                tasks_count: 3,
                collections: Strided::empty(),
                keys: Strided::dense(&[34, 35, 36]),
                presences: Strided::empty(),
                values: b"aaa",
                offsets: Strided::dense(&[0, 1, 2]),
                lengths: Strided::broadcast(&1, 3),
                options: Options::none(),
                transaction: None,
            },
        )
        .unwrap();

        let mut arena = Arena::new();
        let out = scan(
            &sub,
            ScanRequest {
                tasks_count: 1,
                collections: Strided::empty(),
                start_keys: Strided::dense(&[0]),
                count_limits: Strided::dense(&[10]),
                options: Options::none(),
                snapshot: None,
            },
            &mut arena,
        )
        .unwrap();

        assert_eq!(out.counts, &[3]);
        assert_eq!(out.keys, &[34, 35, 36]);
    }

    #[test]
    fn arrow_offsets_invariant() {
        let sub = MemorySubstrate::in_memory();
        let mgr = TransactionManager::new(0);
        write(
            &sub,
            &mgr,
            WriteRequest {
                tasks_count: 2,
                collections: Strided::empty(),
                keys: Strided::dense(&[1, 2]),
                presences: Strided::empty(),
                values: b"ab",
                offsets: Strided::dense(&[0, 1]),
                lengths: Strided::broadcast(&1, 2),
                options: Options::none(),
                transaction: None,
            },
        )
        .unwrap();

        let mut arena = Arena::new();
        let out = read(
            &sub,
            ReadRequest {
                tasks_count: 2,
                collections: Strided::empty(),
                keys: Strided::dense(&[1, 2]),
                options: Options::none(),
                transaction: None,
                snapshot: None,
            },
            &mut arena,
        )
        .unwrap();

        assert_eq!(out.offsets[0], 0);
        assert_eq!(*out.offsets.last().unwrap(), out.lengths.iter().sum::<u32>());
    }
}
