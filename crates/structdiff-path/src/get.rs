use serde_json::Value;

use crate::types::PathSegment;

/// Attribute holding an array item's stable identity.
pub const KEY_ATTRIBUTE: &str = "_key";

/// Position of the item whose `_key` equals `key`.
pub fn index_of_key(arr: &[Value], key: &str) -> Option<usize> {
    arr.iter()
        .position(|item| item.get(KEY_ATTRIBUTE).and_then(Value::as_str) == Some(key))
}

/// Resolve one segment against `val`, returning the array index or field
/// name it designates in that container.
pub fn resolve_index(val: &Value, segment: &PathSegment) -> Option<usize> {
    match (val, segment) {
        (Value::Array(arr), PathSegment::Index(i)) if *i < arr.len() => Some(*i),
        (Value::Array(arr), PathSegment::Keyed { key }) => index_of_key(arr, key),
        _ => None,
    }
}

fn step<'a>(current: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    match (current, segment) {
        (Value::Object(map), PathSegment::Key(k)) => map.get(k),
        (Value::Array(arr), PathSegment::Index(i)) => arr.get(*i),
        (Value::Array(arr), PathSegment::Keyed { key }) => {
            index_of_key(arr, key).and_then(|i| arr.get(i))
        }
        _ => None,
    }
}

/// Get a value from a document by path. Keyed segments are looked up by
/// `_key` regardless of the item's position.
pub fn get<'a>(val: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
    let mut current = val;
    for segment in path {
        current = step(current, segment)?;
    }
    Some(current)
}

/// Get a mutable reference to a value in a document by path.
pub fn get_mut<'a>(val: &'a mut Value, path: &[PathSegment]) -> Option<&'a mut Value> {
    let mut current = val;
    for segment in path {
        current = match (current, segment) {
            (Value::Object(map), PathSegment::Key(k)) => map.get_mut(k)?,
            (Value::Array(arr), PathSegment::Index(i)) => arr.get_mut(*i)?,
            (Value::Array(arr), PathSegment::Keyed { key }) => {
                let idx = index_of_key(arr, key)?;
                arr.get_mut(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_by_key_and_index() {
        let doc = json!({"a": [10, {"b": true}]});
        let path = [PathSegment::key("a"), PathSegment::Index(1), PathSegment::key("b")];
        assert_eq!(get(&doc, &path), Some(&json!(true)));
        assert_eq!(get(&doc, &[PathSegment::key("zz")]), None);
    }

    #[test]
    fn get_by_item_key_ignores_position() {
        let doc = json!({"list": [{"_key": "x", "v": 1}, {"_key": "y", "v": 2}]});
        let path = [PathSegment::key("list"), PathSegment::keyed("y"), PathSegment::key("v")];
        assert_eq!(get(&doc, &path), Some(&json!(2)));
    }

    #[test]
    fn get_mut_by_item_key() {
        let mut doc = json!({"list": [{"_key": "x", "v": 1}]});
        let path = [PathSegment::key("list"), PathSegment::keyed("x"), PathSegment::key("v")];
        *get_mut(&mut doc, &path).unwrap() = json!(5);
        assert_eq!(doc["list"][0]["v"], json!(5));
    }

    #[test]
    fn resolve_index_bounds() {
        let arr = json!([{"_key": "a"}, {"_key": "b"}]);
        assert_eq!(resolve_index(&arr, &PathSegment::Index(1)), Some(1));
        assert_eq!(resolve_index(&arr, &PathSegment::Index(2)), None);
        assert_eq!(resolve_index(&arr, &PathSegment::keyed("b")), Some(1));
        assert_eq!(resolve_index(&arr, &PathSegment::keyed("c")), None);
    }
}
