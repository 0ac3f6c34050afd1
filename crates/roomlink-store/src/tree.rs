//! Path-addressed operations on a JSON document tree.
//!
//! The store keeps the whole database as one `serde_json::Value` rooted at
//! an object. Like the hosted stores this models, it never holds `null`s
//! or empty containers: writing either removes the node, and a parent
//! left empty by a removal disappears too. Documents therefore have to
//! decode absent lists and maps as empty, which is what the room types do.

use roomlink_protocol::Path;
use serde_json::{Map, Value};

/// Returns the node at `path`, `None` if any segment is missing.
pub(crate) fn get_at<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.segments() {
        node = match node {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(node)
}

/// Like [`get_at`] but owned, and treating an empty container as absent.
pub(crate) fn read_at(root: &Value, path: &Path) -> Option<Value> {
    get_at(root, path)
        .filter(|v| !v.is_null() && !is_empty_container(v))
        .cloned()
}

/// Writes `value` at `path`, creating intermediate objects. A value that
/// normalizes to nothing removes the node instead.
pub(crate) fn set_at(root: &mut Value, path: &Path, value: Value) {
    let Some(value) = normalize(value) else {
        remove_at(root, path);
        return;
    };

    set_rec(root, path.segments(), value);
}

fn set_rec(node: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(head.clone()).or_insert(Value::Null);
        set_rec(child, rest, value);
    }
}

/// Removes the node at `path` and prunes parents left empty.
pub(crate) fn remove_at(root: &mut Value, path: &Path) {
    let segments = path.segments();
    if segments.is_empty() {
        *root = Value::Object(Map::new());
        return;
    }
    remove_rec(root, segments);
}

fn remove_rec(node: &mut Value, segments: &[String]) {
    let Value::Object(map) = node else {
        return;
    };
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        map.remove(head);
        return;
    }
    if let Some(child) = map.get_mut(head) {
        remove_rec(child, rest);
        if is_empty_container(child) {
            map.remove(head);
        }
    }
}

/// Shallow-merges every field of `patch` under `path`. Keys may contain
/// `/` to address deeper children.
pub(crate) fn merge_at(root: &mut Value, path: &Path, patch: Map<String, Value>) {
    for (key, value) in patch {
        let target = if key.contains('/') {
            path.join(&key)
        } else {
            path.child(&key)
        };
        set_at(root, &target, value);
    }
}

/// Drops `null`s and empty containers, recursively. `None` means the
/// value is equivalent to absent.
pub(crate) fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| normalize(v).map(|v| (k, v)))
                .collect();
            (!map.is_empty()).then_some(Value::Object(map))
        }
        Value::Array(items) => {
            let items: Vec<Value> = items
                .into_iter()
                .map(|v| normalize(v).unwrap_or(Value::Null))
                .collect();
            (!items.is_empty()).then_some(Value::Array(items))
        }
        other => Some(other),
    }
}

pub(crate) fn is_empty_container(node: &Value) -> bool {
    match node {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
