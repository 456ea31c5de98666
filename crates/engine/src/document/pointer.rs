//! RFC 6901 JSON-Pointer traversal over `serde_json::Value` (spec §4.7).
//!
//! A parsed pointer plus `get`/`set`/`delete` walk functions, operating
//! directly on `serde_json::Value` rather than a `#[repr(transparent)]`
//! newtype — nothing here needs pointer transmutes, just token traversal.

use polykv_core::error::{Error, Result};
use polykv_core::limits::{LimitError, MAX_POINTER_SEGMENTS};
use serde_json::Value;

/// A parsed JSON-Pointer: a sequence of unescaped reference tokens. The
/// empty pointer (`""`) addresses the whole document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointer(Vec<String>);

impl Pointer {
    /// The root pointer, addressing the whole document.
    pub fn root() -> Self {
        Pointer(Vec::new())
    }

    /// Parse an RFC 6901 string: `""` is root, otherwise each `/token` is
    /// unescaped (`~1` -> `/`, `~0` -> `~`).
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Ok(Pointer::root());
        }
        if !raw.starts_with('/') {
            return Err(Error::invalid_argument(format!("JSON-Pointer '{raw}' must start with '/'")));
        }
        let tokens: Vec<String> = raw[1..].split('/').map(unescape_token).collect();
        if tokens.len() > MAX_POINTER_SEGMENTS {
            return Err(Error::invalid_argument(
                LimitError::PathTooLong { length: tokens.len(), max: MAX_POINTER_SEGMENTS }.to_string(),
            ));
        }
        Ok(Pointer(tokens))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    /// The parent pointer and the final token, or `None` at the root.
    pub fn split_last(&self) -> Option<(Pointer, &str)> {
        let (last, rest) = self.0.split_last()?;
        Some((Pointer(rest.to_vec()), last.as_str()))
    }
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Array index token: either a valid `usize` or the RFC 6901 `-` "append"
/// marker (only meaningful to `set`/`add`, not to `get`/`remove`).
enum ArrayIndex {
    At(usize),
    Append,
}

fn parse_array_index(token: &str, len: usize) -> Result<ArrayIndex> {
    if token == "-" {
        return Ok(ArrayIndex::Append);
    }
    let idx: usize = token
        .parse()
        .map_err(|_| Error::invalid_argument(format!("'{token}' is not a valid array index")))?;
    if idx > len {
        return Err(Error::invalid_argument(format!("index {idx} out of bounds for array of length {len}")));
    }
    Ok(ArrayIndex::At(idx))
}

/// Read the value at `pointer`, or `None` if any segment is absent.
/// A type mismatch along the way (e.g. indexing a string) is an error.
pub fn get<'a>(doc: &'a Value, pointer: &Pointer) -> Result<Option<&'a Value>> {
    let mut current = doc;
    for token in pointer.tokens() {
        current = match current {
            Value::Object(map) => match map.get(token) {
                Some(v) => v,
                None => return Ok(None),
            },
            Value::Array(arr) => match token.parse::<usize>() {
                Ok(idx) => match arr.get(idx) {
                    Some(v) => v,
                    None => return Ok(None),
                },
                Err(_) => return Ok(None),
            },
            Value::Null => return Ok(None),
            other => {
                return Err(Error::invalid_argument(format!(
                    "cannot traverse into {} with token '{token}'",
                    type_name(other)
                )))
            }
        };
    }
    Ok(Some(current))
}

/// Set the value at `pointer`, creating intermediate objects as needed.
/// The container kind at each missing intermediate step is an object
/// (RFC 6901 has no notation to request an intermediate array).
pub fn set(doc: &mut Value, pointer: &Pointer, value: Value) -> Result<()> {
    if pointer.is_root() {
        *doc = value;
        return Ok(());
    }
    let mut current = doc;
    let tokens = pointer.tokens();
    for token in &tokens[..tokens.len() - 1] {
        if current.is_null() {
            *current = Value::Object(serde_json::Map::new());
        }
        current = match current {
            Value::Object(map) => map.entry(token.clone()).or_insert(Value::Object(serde_json::Map::new())),
            Value::Array(arr) => match parse_array_index(token, arr.len())? {
                ArrayIndex::At(idx) if idx < arr.len() => &mut arr[idx],
                ArrayIndex::At(idx) => {
                    arr.push(Value::Object(serde_json::Map::new()));
                    debug_assert_eq!(idx, arr.len() - 1);
                    arr.last_mut().unwrap()
                }
                ArrayIndex::Append => {
                    arr.push(Value::Object(serde_json::Map::new()));
                    arr.last_mut().unwrap()
                }
            },
            other => {
                return Err(Error::invalid_argument(format!(
                    "cannot traverse into {} with token '{token}'",
                    type_name(other)
                )))
            }
        };
    }

    let last = tokens.last().unwrap();
    match current {
        Value::Object(map) => {
            map.insert(last.clone(), value);
        }
        Value::Array(arr) => match parse_array_index(last, arr.len())? {
            ArrayIndex::At(idx) if idx < arr.len() => arr[idx] = value,
            ArrayIndex::At(idx) => {
                debug_assert_eq!(idx, arr.len());
                arr.push(value);
            }
            ArrayIndex::Append => arr.push(value),
        },
        other => {
            return Err(Error::invalid_argument(format!(
                "cannot set '{last}' on a {}",
                type_name(other)
            )))
        }
    }
    Ok(())
}

/// Remove and return the value at `pointer`. `None` if it did not exist.
pub fn delete(doc: &mut Value, pointer: &Pointer) -> Result<Option<Value>> {
    if pointer.is_root() {
        return Ok(Some(std::mem::replace(doc, Value::Null)));
    }
    let (parent_pointer, last) = pointer.split_last().expect("non-root pointer has a last segment");
    let parent = match get_mut(doc, &parent_pointer)? {
        Some(p) => p,
        None => return Ok(None),
    };
    match parent {
        Value::Object(map) => Ok(map.remove(last)),
        Value::Array(arr) => match last.parse::<usize>() {
            Ok(idx) if idx < arr.len() => Ok(Some(arr.remove(idx))),
            _ => Ok(None),
        },
        other => Err(Error::invalid_argument(format!(
            "cannot remove '{last}' from a {}",
            type_name(other)
        ))),
    }
}

fn get_mut<'a>(doc: &'a mut Value, pointer: &Pointer) -> Result<Option<&'a mut Value>> {
    let mut current = doc;
    for token in pointer.tokens() {
        current = match current {
            Value::Object(map) => match map.get_mut(token) {
                Some(v) => v,
                None => return Ok(None),
            },
            Value::Array(arr) => match token.parse::<usize>() {
                Ok(idx) => match arr.get_mut(idx) {
                    Some(v) => v,
                    None => return Ok(None),
                },
                Err(_) => return Ok(None),
            },
            Value::Null => return Ok(None),
            other => {
                return Err(Error::invalid_argument(format!(
                    "cannot traverse into {} with token '{token}'",
                    type_name(other)
                )))
            }
        };
    }
    Ok(Some(current))
}

/// Serialize `pointer` back to RFC 6901 string form (used by `gist`).
pub fn to_string(pointer: &Pointer) -> String {
    escape_path(pointer.tokens())
}

/// Build an RFC 6901 pointer string directly from raw (unescaped) segments.
pub fn escape_path(segments: &[String]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(&escape_token(segment));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_nested_value() {
        let doc = json!({"user": {"name": "Alice", "scores": [100, 95]}});
        let ptr = Pointer::parse("/user/scores/1").unwrap();
        assert_eq!(get(&doc, &ptr).unwrap(), Some(&json!(95)));
    }

    #[test]
    fn get_missing_is_none() {
        let doc = json!({"a": 1});
        let ptr = Pointer::parse("/b/c").unwrap();
        assert_eq!(get(&doc, &ptr).unwrap(), None);
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut doc = json!({});
        let ptr = Pointer::parse("/user/profile/name").unwrap();
        set(&mut doc, &ptr, json!("Alice")).unwrap();
        assert_eq!(get(&doc, &ptr).unwrap(), Some(&json!("Alice")));
    }

    #[test]
    fn set_root_replaces_whole_document() {
        let mut doc = json!({"a": 1});
        set(&mut doc, &Pointer::root(), json!(42)).unwrap();
        assert_eq!(doc, json!(42));
    }

    #[test]
    fn delete_removes_object_key() {
        let mut doc = json!({"a": 1, "b": 2});
        let removed = delete(&mut doc, &Pointer::parse("/a").unwrap()).unwrap();
        assert_eq!(removed, Some(json!(1)));
        assert_eq!(doc, json!({"b": 2}));
    }

    #[test]
    fn escapes_round_trip() {
        let mut doc = json!({});
        let ptr = Pointer::parse("/a~1b/c~0d").unwrap();
        set(&mut doc, &ptr, json!(1)).unwrap();
        assert_eq!(to_string(&ptr), "/a~1b/c~0d");
        assert_eq!(get(&doc, &ptr).unwrap(), Some(&json!(1)));
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let doc = json!({"a": "not an object"});
        let ptr = Pointer::parse("/a/b").unwrap();
        assert!(get(&doc, &ptr).is_err());
    }

    #[test]
    fn parse_rejects_paths_over_the_segment_limit() {
        let raw = "/a".repeat(MAX_POINTER_SEGMENTS + 1);
        assert!(Pointer::parse(&raw).is_err());
    }
}
