//! Hierarchical document storage over the blob layer (spec §4.7).
//!
//! Documents are kept on disk in one canonical binary form (MessagePack,
//! matching the durability and storage crates' own on-disk/wire choice of
//! `rmp-serde`) and converted to/from the caller's declared wire format on
//! each read or write. Field-path projection and patch application build on
//! [`pointer`]'s RFC 6901 traversal.

pub mod pointer;

use crate::arena::Arena;
use crate::blob::{self, ReadRequest, WriteRequest};
use crate::strided::Strided;
use pointer::Pointer;
use polykv_concurrency::{TransactionContext, TransactionManager};
use polykv_core::error::{Error, Result};
use polykv_core::limits::{LimitError, MAX_DOCUMENT_SIZE, MAX_NESTING_DEPTH};
use polykv_core::options::Options;
use polykv_core::traits::Substrate;
use polykv_core::types::{CollectionId, Key};
use serde_json::Value;

/// Depth of the deepest object/array nesting in `value` (a scalar has depth 0).
fn nesting_depth(value: &Value) -> usize {
    match value {
        Value::Object(map) => 1 + map.values().map(nesting_depth).max().unwrap_or(0),
        Value::Array(arr) => 1 + arr.iter().map(nesting_depth).max().unwrap_or(0),
        _ => 0,
    }
}

fn check_document_limits(bytes: &[u8], value: &Value) -> Result<()> {
    if bytes.len() > MAX_DOCUMENT_SIZE {
        return Err(Error::invalid_argument(
            LimitError::DocumentTooLarge { size: bytes.len(), max: MAX_DOCUMENT_SIZE }.to_string(),
        ));
    }
    let depth = nesting_depth(value);
    if depth > MAX_NESTING_DEPTH {
        return Err(Error::invalid_argument(
            LimitError::NestingTooDeep { depth, max: MAX_NESTING_DEPTH }.to_string(),
        ));
    }
    Ok(())
}

/// Wire format tag a document payload is declared in, or requested as (spec
/// §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    MsgPack,
    Cbor,
    Bson,
    Ubjson,
    JsonPatch,
    JsonMergePatch,
}

/// Decode `bytes` in `format` into the working JSON representation.
pub fn decode(bytes: &[u8], format: Format) -> Result<Value> {
    let value = match format {
        Format::Json => serde_json::from_slice::<Value>(bytes).map_err(|e| Error::invalid_argument(format!("malformed JSON: {e}")))?,
        Format::MsgPack => {
            rmp_serde::from_slice(bytes).map_err(|e| Error::invalid_argument(format!("malformed MsgPack: {e}")))?
        }
        Format::Cbor => {
            ciborium::from_reader(bytes).map_err(|e| Error::invalid_argument(format!("malformed CBOR: {e}")))?
        }
        Format::Bson => bson::from_slice(bytes).map_err(|e| Error::invalid_argument(format!("malformed BSON: {e}")))?,
        Format::Ubjson => {
            ubjson::from_slice(bytes).map_err(|e| Error::invalid_argument(format!("malformed UBJSON: {e}")))?
        }
        Format::JsonPatch | Format::JsonMergePatch => {
            return Err(Error::invalid_argument("patch formats are not a document encoding, apply them instead"))
        }
    };
    check_document_limits(bytes, &value)?;
    Ok(value)
}

/// Encode the working JSON representation as `format`.
pub fn encode(value: &Value, format: Format) -> Result<Vec<u8>> {
    let bytes = match format {
        Format::Json => serde_json::to_vec(value).map_err(|e| Error::substrate(format!("encoding JSON: {e}")))?,
        Format::MsgPack => rmp_serde::to_vec(value).map_err(|e| Error::substrate(format!("encoding MsgPack: {e}")))?,
        Format::Cbor => {
            let mut out = Vec::new();
            ciborium::into_writer(value, &mut out).map_err(|e| Error::substrate(format!("encoding CBOR: {e}")))?;
            out
        }
        Format::Bson => bson::to_vec(value).map_err(|e| Error::substrate(format!("encoding BSON: {e}")))?,
        Format::Ubjson => ubjson::to_vec(value).map_err(|e| Error::substrate(format!("encoding UBJSON: {e}")))?,
        Format::JsonPatch | Format::JsonMergePatch => {
            return Err(Error::invalid_argument("patch formats are not a document encoding, apply them instead"))
        }
    };
    check_document_limits(&bytes, value)?;
    Ok(bytes)
}

/// Decode the canonical on-disk MessagePack form.
pub fn decode_canonical(bytes: &[u8]) -> Result<Value> {
    decode(bytes, Format::MsgPack)
}

/// Encode to the canonical on-disk MessagePack form.
pub fn encode_canonical(value: &Value) -> Result<Vec<u8>> {
    encode(value, Format::MsgPack)
}

/// A single RFC 6902 JSON-Patch operation.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

/// Parse a JSON-Patch document (an array of operation objects) into
/// [`PatchOp`]s.
pub fn parse_json_patch(bytes: &[u8]) -> Result<Vec<PatchOp>> {
    let ops: Vec<Value> =
        serde_json::from_slice(bytes).map_err(|e| Error::invalid_argument(format!("malformed JSON-Patch: {e}")))?;
    ops.into_iter().map(parse_patch_op).collect()
}

fn parse_patch_op(op: Value) -> Result<PatchOp> {
    let obj = op.as_object().ok_or_else(|| Error::invalid_argument("patch operation must be an object"))?;
    let kind = obj
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_argument("patch operation missing 'op'"))?;
    let path = |obj: &serde_json::Map<String, Value>| -> Result<String> {
        obj.get("path")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| Error::invalid_argument("patch operation missing 'path'"))
    };
    let from = |obj: &serde_json::Map<String, Value>| -> Result<String> {
        obj.get("from")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| Error::invalid_argument("patch operation missing 'from'"))
    };
    let value = |obj: &serde_json::Map<String, Value>| -> Result<Value> {
        obj.get("value").cloned().ok_or_else(|| Error::invalid_argument("patch operation missing 'value'"))
    };

    Ok(match kind {
        "add" => PatchOp::Add { path: path(obj)?, value: value(obj)? },
        "remove" => PatchOp::Remove { path: path(obj)? },
        "replace" => PatchOp::Replace { path: path(obj)?, value: value(obj)? },
        "move" => PatchOp::Move { from: from(obj)?, path: path(obj)? },
        "copy" => PatchOp::Copy { from: from(obj)?, path: path(obj)? },
        "test" => PatchOp::Test { path: path(obj)?, value: value(obj)? },
        other => return Err(Error::invalid_argument(format!("unknown JSON-Patch op '{other}'"))),
    })
}

/// Apply a sequence of RFC 6902 operations to `doc` in place. Patches are
/// not atomic: if one fails partway through, earlier operations have
/// already taken effect.
pub fn apply_json_patch(doc: &mut Value, ops: &[PatchOp]) -> Result<()> {
    for op in ops {
        match op {
            PatchOp::Add { path, value } => {
                let pointer = Pointer::parse(path)?;
                pointer::set(doc, &pointer, value.clone())?;
            }
            PatchOp::Remove { path } => {
                let pointer = Pointer::parse(path)?;
                pointer::delete(doc, &pointer)?.ok_or_else(|| Error::invalid_argument(format!("no value at '{path}'")))?;
            }
            PatchOp::Replace { path, value } => {
                let pointer = Pointer::parse(path)?;
                if pointer::get(doc, &pointer)?.is_none() {
                    return Err(Error::invalid_argument(format!("no value at '{path}' to replace")));
                }
                pointer::set(doc, &pointer, value.clone())?;
            }
            PatchOp::Move { from, path } => {
                let from_pointer = Pointer::parse(from)?;
                let value = pointer::delete(doc, &from_pointer)?
                    .ok_or_else(|| Error::invalid_argument(format!("no value at '{from}'")))?;
                let to_pointer = Pointer::parse(path)?;
                pointer::set(doc, &to_pointer, value)?;
            }
            PatchOp::Copy { from, path } => {
                let from_pointer = Pointer::parse(from)?;
                let value = pointer::get(doc, &from_pointer)?
                    .cloned()
                    .ok_or_else(|| Error::invalid_argument(format!("no value at '{from}'")))?;
                let to_pointer = Pointer::parse(path)?;
                pointer::set(doc, &to_pointer, value)?;
            }
            PatchOp::Test { path, value } => {
                let pointer = Pointer::parse(path)?;
                let actual = pointer::get(doc, &pointer)?;
                if actual != Some(value) {
                    return Err(Error::invalid_argument(format!("test failed at '{path}'")));
                }
            }
        }
    }
    Ok(())
}

/// Apply an RFC 7396 JSON Merge Patch to `target` in place.
pub fn apply_merge_patch(target: &mut Value, patch: &Value) {
    if let Value::Object(patch_obj) = patch {
        if !target.is_object() {
            *target = Value::Object(serde_json::Map::new());
        }
        let target_obj = target.as_object_mut().expect("just coerced to object");
        for (key, value) in patch_obj {
            if value.is_null() {
                target_obj.remove(key);
            } else if let Some(existing) = target_obj.get_mut(key) {
                apply_merge_patch(existing, value);
            } else {
                target_obj.insert(key.clone(), value.clone());
            }
        }
    } else {
        *target = patch.clone();
    }
}

/// Project `doc` down to the subdocument made of `paths` (spec §4.7: "read
/// returns a subdocument composed only of those paths"). Missing paths are
/// silently skipped, matching `gather`'s per-cell validity bit approach.
pub fn project(doc: &Value, paths: &[String]) -> Result<Value> {
    let mut out = Value::Object(serde_json::Map::new());
    for path in paths {
        let pointer = Pointer::parse(path)?;
        if let Some(value) = pointer::get(doc, &pointer)? {
            pointer::set(&mut out, &pointer, value.clone())?;
        }
    }
    Ok(out)
}

/// Merge `paths`-addressed `values` into `doc` (spec §4.7: "write merges
/// new values into the document at those paths").
pub fn merge_fields(doc: &mut Value, paths: &[String], values: &[Value]) -> Result<()> {
    if paths.len() != values.len() {
        return Err(Error::invalid_argument("paths and values must have equal length"));
    }
    for (path, value) in paths.iter().zip(values) {
        let pointer = Pointer::parse(path)?;
        pointer::set(doc, &pointer, value.clone())?;
    }
    Ok(())
}

/// Recursively collect every leaf path's JSON-Pointer, in first-seen order.
fn collect_paths(value: &Value, prefix: &mut Vec<String>, out: &mut Vec<String>, seen: &mut std::collections::HashSet<String>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, v) in map {
                prefix.push(key.clone());
                collect_paths(v, prefix, out, seen);
                prefix.pop();
            }
        }
        Value::Array(arr) if !arr.is_empty() => {
            for (idx, v) in arr.iter().enumerate() {
                prefix.push(idx.to_string());
                collect_paths(v, prefix, out, seen);
                prefix.pop();
            }
        }
        _ => {
            let path = pointer::escape_path(prefix.as_slice());
            if seen.insert(path.clone()) {
                out.push(path);
            }
        }
    }
}

/// `gist`: the deduplicated, first-seen-ordered union of leaf field paths
/// across `docs` (spec §4.7).
pub fn gist(docs: &[Value]) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for doc in docs {
        let mut prefix = Vec::new();
        collect_paths(doc, &mut prefix, &mut out, &mut seen);
    }
    out
}

/// The scalar type a `gather` cell was requested as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    Bool,
    Int,
    Float,
    Str,
}

/// One projected column of a `gather`/table request.
pub struct GatherColumn {
    /// `true` where the document had a value at this path (after conversion).
    pub validity: Vec<bool>,
    /// `true` where the stored type did not match the requested type and a
    /// coercion (numeric widen, string<->number) was applied.
    pub converted: Vec<bool>,
    pub values: Vec<Value>,
}

fn coerce(value: &Value, target: CellType) -> (Value, bool) {
    match (target, value) {
        (CellType::Bool, Value::Bool(_))
        | (CellType::Int, Value::Number(_))
        | (CellType::Float, Value::Number(_))
        | (CellType::Str, Value::String(_)) => (value.clone(), false),
        (CellType::Int, Value::String(s)) => match s.parse::<i64>() {
            Ok(n) => (Value::from(n), true),
            Err(_) => (Value::Null, false),
        },
        (CellType::Float, Value::String(s)) => match s.parse::<f64>() {
            Ok(n) => (Value::from(n), true),
            Err(_) => (Value::Null, false),
        },
        (CellType::Str, Value::Number(n)) => (Value::String(n.to_string()), true),
        (CellType::Str, Value::Bool(b)) => (Value::String(b.to_string()), true),
        _ => (Value::Null, false),
    }
}

/// `gather`/`table`: project `(path, type)` requests across `docs`,
/// producing one column per path with per-cell validity and conversion bits
/// (spec §4.7).
pub fn gather(docs: &[Value], requests: &[(String, CellType)]) -> Result<Vec<GatherColumn>> {
    let mut columns = Vec::with_capacity(requests.len());
    for (path, cell_type) in requests {
        let pointer = Pointer::parse(path)?;
        let mut validity = Vec::with_capacity(docs.len());
        let mut converted = Vec::with_capacity(docs.len());
        let mut values = Vec::with_capacity(docs.len());
        for doc in docs {
            match pointer::get(doc, &pointer)? {
                Some(value) if !value.is_null() => {
                    let (coerced, was_converted) = coerce(value, *cell_type);
                    let present = !coerced.is_null();
                    validity.push(present);
                    converted.push(was_converted && present);
                    values.push(coerced);
                }
                _ => {
                    validity.push(false);
                    converted.push(false);
                    values.push(Value::Null);
                }
            }
        }
        columns.push(GatherColumn { validity, converted, values });
    }
    Ok(columns)
}

/// Derive a key from `doc`'s `id_field` (a JSON-Pointer path into the
/// payload), so callers can avoid passing keys separately (spec §4.7).
/// The addressed value must be an integer.
pub fn key_from_id_field(doc: &Value, id_field: &str) -> Result<Key> {
    let pointer = Pointer::parse(id_field)?;
    let value = pointer::get(doc, &pointer)?
        .ok_or_else(|| Error::invalid_argument(format!("id_field '{id_field}' is absent from the document")))?;
    value
        .as_i64()
        .ok_or_else(|| Error::invalid_argument(format!("id_field '{id_field}' is not an integer")))
}

/// Read one document at `key` in `format`, optionally projected to `paths`.
pub fn read_document(
    substrate: &dyn Substrate,
    collection: CollectionId,
    key: Key,
    format: Format,
    paths: Option<&[String]>,
    transaction: Option<&mut TransactionContext>,
    arena: &mut Arena,
) -> Result<Option<Vec<u8>>> {
    let out = blob::read(
        substrate,
        ReadRequest {
            tasks_count: 1,
            collections: Strided::broadcast(&collection, 1),
            keys: Strided::dense(std::slice::from_ref(&key)),
            options: Options::none(),
            transaction,
            snapshot: None,
        },
        arena,
    )?;
    if !out.presences[0] {
        return Ok(None);
    }
    let doc = decode_canonical(out.values)?;
    let projected = match paths {
        Some(paths) => project(&doc, paths)?,
        None => doc,
    };
    encode(&projected, format).map(Some)
}

/// Write one document at `key`. A full-document write (`paths` is `None`)
/// replaces the stored document after decoding `payload` as `format`; a
/// field-path write merges `payload`'s decoded value at each of `paths`
/// into the existing document (spec §4.7, "write merges new values").
#[allow(clippy::too_many_arguments)]
pub fn write_document(
    substrate: &dyn Substrate,
    manager: &TransactionManager,
    collection: CollectionId,
    key: Key,
    format: Format,
    payload: &[u8],
    paths: Option<&[String]>,
    transaction: Option<&mut TransactionContext>,
) -> Result<()> {
    let incoming = decode(payload, format)?;
    let mut arena = Arena::new();

    let mut txn_ref = transaction;
    let doc = match paths {
        None => incoming,
        Some(paths) => {
            let existing = blob::read(
                substrate,
                ReadRequest {
                    tasks_count: 1,
                    collections: Strided::broadcast(&collection, 1),
                    keys: Strided::dense(std::slice::from_ref(&key)),
                    options: Options::none(),
                    transaction: txn_ref.as_deref_mut(),
                    snapshot: None,
                },
                &mut arena,
            )?;
            let mut doc = if existing.presences[0] {
                decode_canonical(existing.values)?
            } else {
                Value::Object(serde_json::Map::new())
            };
            let values: Vec<Value> = paths.iter().map(|_| incoming.clone()).collect();
            merge_fields(&mut doc, paths, &values)?;
            doc
        }
    };

    let bytes = encode_canonical(&doc)?;
    let lengths = [bytes.len() as u32];
    blob::write(
        substrate,
        manager,
        WriteRequest {
            tasks_count: 1,
            collections: Strided::broadcast(&collection, 1),
            keys: Strided::dense(std::slice::from_ref(&key)),
            presences: Strided::empty(),
            values: &bytes,
            offsets: Strided::empty(),
            lengths: Strided::dense(&lengths),
            options: Options::none(),
            transaction: txn_ref,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_patch_add_and_test() {
        let mut doc = json!({"a": 1});
        let ops = vec![
            PatchOp::Test { path: "/a".to_string(), value: json!(1) },
            PatchOp::Add { path: "/b".to_string(), value: json!(2) },
        ];
        apply_json_patch(&mut doc, &ops).unwrap();
        assert_eq!(doc, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn json_patch_move() {
        let mut doc = json!({"a": 1});
        let ops = vec![PatchOp::Move { from: "/a".to_string(), path: "/b".to_string() }];
        apply_json_patch(&mut doc, &ops).unwrap();
        assert_eq!(doc, json!({"b": 1}));
    }

    #[test]
    fn json_patch_test_failure_aborts() {
        let mut doc = json!({"a": 1});
        let ops = vec![PatchOp::Test { path: "/a".to_string(), value: json!(2) }];
        assert!(apply_json_patch(&mut doc, &ops).is_err());
    }

    #[test]
    fn merge_patch_removes_null_keys() {
        let mut target = json!({"a": 1, "b": 2});
        apply_merge_patch(&mut target, &json!({"b": null, "c": 3}));
        assert_eq!(target, json!({"a": 1, "c": 3}));
    }

    #[test]
    fn merge_patch_non_object_replaces() {
        let mut target = json!({"a": 1});
        apply_merge_patch(&mut target, &json!([1, 2]));
        assert_eq!(target, json!([1, 2]));
    }

    #[test]
    fn gist_deduplicates_across_documents() {
        let docs = vec![json!({"a": 1, "b": {"c": 2}}), json!({"a": 3, "d": 4})];
        let paths = gist(&docs);
        assert_eq!(paths, vec!["/a", "/b/c", "/d"]);
    }

    #[test]
    fn gather_sets_converted_bit_on_string_to_int_coercion() {
        let docs = vec![json!({"n": "42"}), json!({"n": 7}), json!({})];
        let columns = gather(&docs, &[("/n".to_string(), CellType::Int)]).unwrap();
        let col = &columns[0];
        assert_eq!(col.validity, vec![true, true, false]);
        assert_eq!(col.converted, vec![true, false, false]);
        assert_eq!(col.values[0], json!(42));
    }

    #[test]
    fn canonical_round_trip_through_msgpack() {
        let doc = json!({"name": "Alice", "age": 30, "tags": ["a", "b"]});
        let bytes = encode_canonical(&doc).unwrap();
        let decoded = decode_canonical(&bytes).unwrap();
        assert_eq!(doc, decoded);
    }

    #[test]
    fn cbor_round_trip() {
        let doc = json!({"x": 1});
        let bytes = encode(&doc, Format::Cbor).unwrap();
        assert_eq!(decode(&bytes, Format::Cbor).unwrap(), doc);
    }

    #[test]
    fn bson_round_trip() {
        let doc = json!({"name": "Alice", "age": 30, "tags": ["a", "b"]});
        let bytes = encode(&doc, Format::Bson).unwrap();
        assert_eq!(decode(&bytes, Format::Bson).unwrap(), doc);
    }

    #[test]
    fn bson_rejects_non_object_top_level() {
        assert!(encode(&json!([1, 2, 3]), Format::Bson).is_err());
    }

    #[test]
    fn ubjson_round_trip() {
        let doc = json!({"name": "Alice", "age": 30, "tags": ["a", "b"]});
        let bytes = encode(&doc, Format::Ubjson).unwrap();
        assert_eq!(decode(&bytes, Format::Ubjson).unwrap(), doc);
    }

    #[test]
    fn key_from_id_field_reads_nested_integer() {
        let doc = json!({"meta": {"id": 42}, "name": "Alice"});
        assert_eq!(key_from_id_field(&doc, "/meta/id").unwrap(), 42);
    }

    #[test]
    fn key_from_id_field_rejects_non_integer() {
        let doc = json!({"id": "not a number"});
        assert!(key_from_id_field(&doc, "/id").is_err());
    }

    #[test]
    fn decode_rejects_excessive_nesting() {
        let mut value = json!(0);
        for _ in 0..=MAX_NESTING_DEPTH {
            value = json!([value]);
        }
        let bytes = serde_json::to_vec(&value).unwrap();
        assert!(matches!(decode(&bytes, Format::Json), Err(Error::InvalidArgument(_))));
    }
}
