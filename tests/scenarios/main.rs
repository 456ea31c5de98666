//! End-to-end scenarios (S1-S6) exercised through the public facade crate.

use polykv::{
    blob, graph, Arena, CollectionId, Database, EdgeRole, Key, Options, ReadRequest, ScanRequest,
    Strided, TransactionState, WriteRequest, MAIN_COLLECTION,
};
use polykv_core::value::WriteValue;

fn put(db: &Database, collection: CollectionId, key: Key, value: &[u8]) {
    let presences = [true];
    let values = value.to_vec();
    let offsets = [0u32];
    let lengths = [value.len() as u32];
    blob::write(
        db.substrate(),
        db.transactions(),
        WriteRequest {
            tasks_count: 1,
            collections: Strided::broadcast(&collection, 1),
            keys: Strided::dense(&[key]),
            presences: Strided::dense(&presences),
            values: &values,
            offsets: Strided::dense(&offsets),
            lengths: Strided::dense(&lengths),
            options: Options::none(),
            transaction: None,
        },
    )
    .unwrap();
}

#[test]
fn s1_single_write_read() {
    let db = Database::in_memory();
    put(&db, MAIN_COLLECTION, 42, b"purpose of life");

    let mut arena = Arena::new();
    let out = blob::read(
        db.substrate(),
        ReadRequest {
            tasks_count: 1,
            collections: Strided::broadcast(&MAIN_COLLECTION, 1),
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
    let db = Database::in_memory();
    let mut arena = Arena::new();
    let out = blob::read(
        db.substrate(),
        ReadRequest {
            tasks_count: 1,
            collections: Strided::broadcast(&MAIN_COLLECTION, 1),
            keys: Strided::dense(&[99]),
            options: Options::none(),
            transaction: None,
            snapshot: None,
        },
        &mut arena,
    )
    .unwrap();

    assert_eq!(out.presences, &[false]);
    assert_eq!(out.lengths, &[polykv_core::types::MISSING_LENGTH]);
    assert_eq!(out.offsets, &[0, 0]);
}

#[test]
fn s3_conflicting_transaction_commit_fails() {
    let db = Database::in_memory();
    let mut txn = db.begin(None);

    // T reads (1) -> absent, recording a watch on the absent generation.
    let mut arena = Arena::new();
    blob::read(
        db.substrate(),
        ReadRequest {
            tasks_count: 1,
            collections: Strided::broadcast(&MAIN_COLLECTION, 1),
            keys: Strided::dense(&[1]),
            options: Options::none(),
            transaction: Some(&mut txn),
            snapshot: None,
        },
        &mut arena,
    )
    .unwrap();

    // A concurrent non-transactional write commits first.
    put(&db, MAIN_COLLECTION, 1, b"A");

    txn.record_write(MAIN_COLLECTION, 1, WriteValue::Put(b"B".to_vec()));
    let result = db.transactions().commit(&mut txn, db.substrate(), false);
    assert!(result.is_err());
    assert_eq!(txn.state(), TransactionState::Aborted);
}

#[test]
fn s4_snapshot_read_sees_pre_write_state() {
    let db = Database::in_memory();
    put(&db, MAIN_COLLECTION, 1, b"v1");
    let snapshot = db.substrate().create_snapshot().unwrap();
    put(&db, MAIN_COLLECTION, 1, b"v2");

    let mut arena = Arena::new();
    let live = blob::read(
        db.substrate(),
        ReadRequest {
            tasks_count: 1,
            collections: Strided::broadcast(&MAIN_COLLECTION, 1),
            keys: Strided::dense(&[1]),
            options: Options::none(),
            transaction: None,
            snapshot: None,
        },
        &mut arena,
    )
    .unwrap();
    assert_eq!(live.values, b"v2");

    let mut arena = Arena::new();
    let pinned = blob::read(
        db.substrate(),
        ReadRequest {
            tasks_count: 1,
            collections: Strided::broadcast(&MAIN_COLLECTION, 1),
            keys: Strided::dense(&[1]),
            options: Options::none(),
            transaction: None,
            snapshot: Some(snapshot),
        },
        &mut arena,
    )
    .unwrap();
    assert_eq!(pinned.values, b"v1");

    db.substrate().release_snapshot(snapshot).unwrap();
}

#[test]
fn s5_range_scan_is_ordered() {
    let db = Database::in_memory();
    for key in [34, 35, 36] {
        put(&db, MAIN_COLLECTION, key, b"x");
    }

    let mut arena = Arena::new();
    let out = blob::scan(
        db.substrate(),
        ScanRequest {
            tasks_count: 1,
            collections: Strided::broadcast(&MAIN_COLLECTION, 1),
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
fn s6_graph_triangle() {
    let db = Database::in_memory();
    let collection: CollectionId = 1;
    graph::upsert_vertices(db.substrate(), db.transactions(), collection, &[1, 2, 3], None).unwrap();
    graph::upsert_edges(db.substrate(), db.transactions(), collection, &[1, 2, 3], &[2, 3, 1], &[9, 10, 11], None)
        .unwrap();

    assert_eq!(graph::degree(db.substrate(), collection, &[1], EdgeRole::Any, None).unwrap(), vec![2]);
    assert_eq!(graph::degree(db.substrate(), collection, &[1], EdgeRole::Source, None).unwrap(), vec![1]);

    let mut arena = Arena::new();
    let found = graph::find_edges(db.substrate(), collection, &[3], EdgeRole::Target, None, &mut arena).unwrap();
    assert_eq!(found.sources, &[2]);
    assert_eq!(found.targets, &[3]);
    assert_eq!(found.edge_ids, &[10]);

    graph::remove_vertices(db.substrate(), db.transactions(), collection, &[2], EdgeRole::Any, None).unwrap();

    let mut arena = Arena::new();
    let vertex_presence = blob::read(
        db.substrate(),
        ReadRequest {
            tasks_count: 1,
            collections: Strided::broadcast(&collection, 1),
            keys: Strided::dense(&[2]),
            options: Options::none(),
            transaction: None,
            snapshot: None,
        },
        &mut arena,
    )
    .unwrap();
    assert_eq!(vertex_presence.presences, &[false]);

    let mut arena = Arena::new();
    let from_one = graph::find_edges(db.substrate(), collection, &[1], EdgeRole::Source, None, &mut arena).unwrap();
    assert_eq!(from_one.counts, &[0]);

    assert_eq!(graph::degree(db.substrate(), collection, &[1], EdgeRole::Any, None).unwrap(), vec![1]);
}
