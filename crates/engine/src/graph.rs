//! Adjacency-list-per-vertex graph layer (spec §4.8).
//!
//! Each vertex's edges live in one blob keyed by the vertex, encoded as a
//! flat run of fixed-width `(neighbor: i64, edge_id: i64, direction: u8)`
//! triples via `byteorder`, little-endian — the same framing style the
//! durability crate uses for its own WAL records
//! (`polykv-durability::record`). An edge `e` from `s` to `t` produces one
//! outgoing entry in `s`'s list and one incoming entry in `t`'s list; a
//! self-loop (`s == t`) produces both entries in that one list. All reads
//! and writes route through the blob layer, so graph mutations inherit
//! transactional semantics when the caller wraps them in one.

use crate::arena::Arena;
use crate::blob::{self, ReadRequest, WriteRequest};
use crate::strided::Strided;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use polykv_concurrency::{TransactionContext, TransactionManager};
use polykv_core::error::{Error, Result};
use polykv_core::options::Options;
use polykv_core::traits::Substrate;
use polykv_core::types::{CollectionId, EdgeRole, Key};
use std::io::Cursor;

const TRIPLE_WIDTH: usize = 17;

/// Which side of a directed edge one adjacency-list entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Outgoing,
    Incoming,
}

impl Direction {
    fn to_byte(self) -> u8 {
        match self {
            Direction::Outgoing => 0,
            Direction::Incoming => 1,
        }
    }

    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(Direction::Outgoing),
            1 => Ok(Direction::Incoming),
            other => Err(Error::substrate(format!("corrupt adjacency triple: unknown direction byte {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Triple {
    neighbor: Key,
    edge_id: Key,
    direction: Direction,
}

fn encode_triples(triples: &[Triple]) -> Vec<u8> {
    let mut out = Vec::with_capacity(triples.len() * TRIPLE_WIDTH);
    for t in triples {
        out.write_i64::<LittleEndian>(t.neighbor).expect("writing to a Vec cannot fail");
        out.write_i64::<LittleEndian>(t.edge_id).expect("writing to a Vec cannot fail");
        out.write_u8(t.direction.to_byte()).expect("writing to a Vec cannot fail");
    }
    out
}

fn decode_triples(bytes: &[u8]) -> Result<Vec<Triple>> {
    if bytes.len() % TRIPLE_WIDTH != 0 {
        return Err(Error::substrate("corrupt adjacency blob: length is not a multiple of the triple width"));
    }
    let mut cursor = Cursor::new(bytes);
    let mut out = Vec::with_capacity(bytes.len() / TRIPLE_WIDTH);
    while (cursor.position() as usize) < bytes.len() {
        let neighbor = cursor.read_i64::<LittleEndian>().map_err(|e| Error::substrate(format!("corrupt adjacency triple: {e}")))?;
        let edge_id = cursor.read_i64::<LittleEndian>().map_err(|e| Error::substrate(format!("corrupt adjacency triple: {e}")))?;
        let direction = Direction::from_byte(
            cursor.read_u8().map_err(|e| Error::substrate(format!("corrupt adjacency triple: {e}")))?,
        )?;
        out.push(Triple { neighbor, edge_id, direction });
    }
    Ok(out)
}

fn read_adjacency(
    substrate: &dyn Substrate,
    collection: CollectionId,
    vertex: Key,
    transaction: Option<&mut TransactionContext>,
    snapshot: Option<u64>,
    arena: &mut Arena,
) -> Result<Vec<Triple>> {
    let out = blob::read(
        substrate,
        ReadRequest {
            tasks_count: 1,
            collections: Strided::broadcast(&collection, 1),
            keys: Strided::dense(std::slice::from_ref(&vertex)),
            options: Options::none(),
            transaction,
            snapshot,
        },
        arena,
    )?;
    if !out.presences[0] {
        return Ok(Vec::new());
    }
    decode_triples(out.values)
}

fn write_adjacency(
    substrate: &dyn Substrate,
    manager: &TransactionManager,
    collection: CollectionId,
    vertex: Key,
    triples: &[Triple],
    transaction: Option<&mut TransactionContext>,
) -> Result<()> {
    let bytes = encode_triples(triples);
    let lengths = [bytes.len() as u32];
    blob::write(
        substrate,
        manager,
        WriteRequest {
            tasks_count: 1,
            collections: Strided::broadcast(&collection, 1),
            keys: Strided::dense(std::slice::from_ref(&vertex)),
            presences: Strided::empty(),
            values: &bytes,
            offsets: Strided::empty(),
            lengths: Strided::dense(&lengths),
            options: Options::none(),
            transaction,
        },
    )
}

fn delete_vertex(
    substrate: &dyn Substrate,
    manager: &TransactionManager,
    collection: CollectionId,
    vertex: Key,
    transaction: Option<&mut TransactionContext>,
) -> Result<()> {
    let presences = [false];
    blob::write(
        substrate,
        manager,
        WriteRequest {
            tasks_count: 1,
            collections: Strided::broadcast(&collection, 1),
            keys: Strided::dense(std::slice::from_ref(&vertex)),
            presences: Strided::dense(&presences),
            values: &[],
            offsets: Strided::empty(),
            lengths: Strided::empty(),
            options: Options::none(),
            transaction,
        },
    )
}

fn offsets_from_counts(counts: &[u32]) -> Vec<u32> {
    let mut offsets = Vec::with_capacity(counts.len() + 1);
    let mut acc: u32 = 0;
    offsets.push(0);
    for &c in counts {
        acc += c;
        offsets.push(acc);
    }
    offsets
}

fn cascades(direction: Direction, role: EdgeRole) -> bool {
    matches!(
        (direction, role),
        (Direction::Outgoing, EdgeRole::Any | EdgeRole::Source) | (Direction::Incoming, EdgeRole::Any | EdgeRole::Target)
    )
}

/// `upsert_vertices`: materialize an empty adjacency list for each vertex
/// that does not yet exist. A no-op for vertices already present, even if
/// their list is already empty.
pub fn upsert_vertices(
    substrate: &dyn Substrate,
    manager: &TransactionManager,
    collection: CollectionId,
    vertices: &[Key],
    mut transaction: Option<&mut TransactionContext>,
) -> Result<()> {
    let mut arena = Arena::new();
    for &vertex in vertices {
        let out = blob::read(
            substrate,
            ReadRequest {
                tasks_count: 1,
                collections: Strided::broadcast(&collection, 1),
                keys: Strided::dense(std::slice::from_ref(&vertex)),
                options: Options::none(),
                transaction: transaction.as_deref_mut(),
                snapshot: None,
            },
            &mut arena,
        )?;
        if !out.presences[0] {
            write_adjacency(substrate, manager, collection, vertex, &[], transaction.as_deref_mut())?;
        }
    }
    Ok(())
}

fn add_triple(
    substrate: &dyn Substrate,
    manager: &TransactionManager,
    collection: CollectionId,
    vertex: Key,
    triple: Triple,
    mut transaction: Option<&mut TransactionContext>,
    arena: &mut Arena,
) -> Result<()> {
    let mut triples = read_adjacency(substrate, collection, vertex, transaction.as_deref_mut(), None, arena)?;
    if !triples.contains(&triple) {
        triples.push(triple);
        write_adjacency(substrate, manager, collection, vertex, &triples, transaction.as_deref_mut())?;
    }
    Ok(())
}

fn remove_triple(
    substrate: &dyn Substrate,
    manager: &TransactionManager,
    collection: CollectionId,
    vertex: Key,
    triple: Triple,
    mut transaction: Option<&mut TransactionContext>,
    arena: &mut Arena,
) -> Result<()> {
    let mut triples = read_adjacency(substrate, collection, vertex, transaction.as_deref_mut(), None, arena)?;
    let before = triples.len();
    triples.retain(|t| *t != triple);
    if triples.len() != before {
        write_adjacency(substrate, manager, collection, vertex, &triples, transaction.as_deref_mut())?;
    }
    Ok(())
}

/// `upsert_edges`: append `(s, t, e)` to both endpoints' adjacencies.
/// Idempotent per edge: an already-present `(s, t, e)` triple is left alone.
pub fn upsert_edges(
    substrate: &dyn Substrate,
    manager: &TransactionManager,
    collection: CollectionId,
    sources: &[Key],
    targets: &[Key],
    edge_ids: &[Key],
    mut transaction: Option<&mut TransactionContext>,
) -> Result<()> {
    if sources.len() != targets.len() || sources.len() != edge_ids.len() {
        return Err(Error::invalid_argument("sources, targets, and edge_ids must have equal length"));
    }
    let mut arena = Arena::new();
    for i in 0..sources.len() {
        let (s, t, e) = (sources[i], targets[i], edge_ids[i]);
        add_triple(
            substrate,
            manager,
            collection,
            s,
            Triple { neighbor: t, edge_id: e, direction: Direction::Outgoing },
            transaction.as_deref_mut(),
            &mut arena,
        )?;
        add_triple(
            substrate,
            manager,
            collection,
            t,
            Triple { neighbor: s, edge_id: e, direction: Direction::Incoming },
            transaction.as_deref_mut(),
            &mut arena,
        )?;
    }
    Ok(())
}

/// `remove_edges`: delete matching `(s, t, e)` triples from both adjacencies.
pub fn remove_edges(
    substrate: &dyn Substrate,
    manager: &TransactionManager,
    collection: CollectionId,
    sources: &[Key],
    targets: &[Key],
    edge_ids: &[Key],
    mut transaction: Option<&mut TransactionContext>,
) -> Result<()> {
    if sources.len() != targets.len() || sources.len() != edge_ids.len() {
        return Err(Error::invalid_argument("sources, targets, and edge_ids must have equal length"));
    }
    let mut arena = Arena::new();
    for i in 0..sources.len() {
        let (s, t, e) = (sources[i], targets[i], edge_ids[i]);
        remove_triple(
            substrate,
            manager,
            collection,
            s,
            Triple { neighbor: t, edge_id: e, direction: Direction::Outgoing },
            transaction.as_deref_mut(),
            &mut arena,
        )?;
        remove_triple(
            substrate,
            manager,
            collection,
            t,
            Triple { neighbor: s, edge_id: e, direction: Direction::Incoming },
            transaction.as_deref_mut(),
            &mut arena,
        )?;
    }
    Ok(())
}

/// `remove_vertices`: delete the vertex blob and cascade-remove the edges it
/// participates in, according to `role` (`Any`, `Source`-only, `Target`-only).
pub fn remove_vertices(
    substrate: &dyn Substrate,
    manager: &TransactionManager,
    collection: CollectionId,
    vertices: &[Key],
    role: EdgeRole,
    mut transaction: Option<&mut TransactionContext>,
) -> Result<()> {
    let mut arena = Arena::new();
    for &vertex in vertices {
        let triples = read_adjacency(substrate, collection, vertex, transaction.as_deref_mut(), None, &mut arena)?;
        for triple in &triples {
            if !cascades(triple.direction, role) {
                continue;
            }
            let reverse_direction = match triple.direction {
                Direction::Outgoing => Direction::Incoming,
                Direction::Incoming => Direction::Outgoing,
            };
            remove_triple(
                substrate,
                manager,
                collection,
                triple.neighbor,
                Triple { neighbor: vertex, edge_id: triple.edge_id, direction: reverse_direction },
                transaction.as_deref_mut(),
                &mut arena,
            )?;
        }
        delete_vertex(substrate, manager, collection, vertex, transaction.as_deref_mut())?;
    }
    Ok(())
}

/// Outputs of `find_edges`: packed `(source, target, edge_id)` triples, one
/// run per queried vertex, Arrow-convention `offsets` into the flat arrays.
pub struct FindEdgesOutputs<'a> {
    pub offsets: &'a [u32],
    pub counts: &'a [u32],
    pub sources: &'a [i64],
    pub targets: &'a [i64],
    pub edge_ids: &'a [i64],
}

/// `find_edges`: per vertex, the edges touching it, filtered by `role`.
pub fn find_edges<'a>(
    substrate: &dyn Substrate,
    collection: CollectionId,
    vertices: &[Key],
    role: EdgeRole,
    snapshot: Option<u64>,
    arena: &'a mut Arena,
) -> Result<FindEdgesOutputs<'a>> {
    arena.reset();
    let mut counts = Vec::with_capacity(vertices.len());
    let mut sources = Vec::new();
    let mut targets = Vec::new();
    let mut edge_ids = Vec::new();

    for &vertex in vertices {
        let mut scratch = Arena::new();
        let triples = read_adjacency(substrate, collection, vertex, None, snapshot, &mut scratch)?;
        let mut count = 0u32;
        for triple in &triples {
            if !cascades(triple.direction, role) {
                continue;
            }
            let (source, target) = match triple.direction {
                Direction::Outgoing => (vertex, triple.neighbor),
                Direction::Incoming => (triple.neighbor, vertex),
            };
            sources.push(source);
            targets.push(target);
            edge_ids.push(triple.edge_id);
            count += 1;
        }
        counts.push(count);
    }

    let offsets = offsets_from_counts(&counts);
    Ok(FindEdgesOutputs {
        offsets: arena.alloc_u32s(offsets),
        counts: arena.alloc_u32s(counts),
        sources: arena.alloc_keys(sources),
        targets: arena.alloc_keys(targets),
        edge_ids: arena.alloc_keys(edge_ids),
    })
}

/// `degree`: neighbor count per vertex, filtered by `role`.
pub fn degree(
    substrate: &dyn Substrate,
    collection: CollectionId,
    vertices: &[Key],
    role: EdgeRole,
    snapshot: Option<u64>,
) -> Result<Vec<u64>> {
    let mut out = Vec::with_capacity(vertices.len());
    for &vertex in vertices {
        let mut arena = Arena::new();
        let triples = read_adjacency(substrate, collection, vertex, None, snapshot, &mut arena)?;
        let count = triples.iter().filter(|t| cascades(t.direction, role)).count();
        out.push(count as u64);
    }
    Ok(out)
}
