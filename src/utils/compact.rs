use serde_json::{Map, Value};

/// Recursively drops mapping entries and sequence elements whose value is
/// empty: null, "", [], or {}. Children are compacted first, so a mapping
/// that empties out once its own children are removed is dropped as well.
/// `0`, `false`, and non-empty containers are always kept.
pub fn compact_empty(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, val) in map {
                let compacted = compact_empty(val);
                if !is_empty_value(&compacted) {
                    out.insert(key.clone(), compacted);
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                let compacted = compact_empty(item);
                if !is_empty_value(&compacted) {
                    out.push(compacted);
                }
            }
            Value::Array(out)
        }
        scalar => scalar.clone(),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
