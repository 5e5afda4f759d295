use serde_json::{Map, Value};

/// Any mapping with a `data` key bound to a sequence is treated as an
/// envelope: the projection applies to every record inside `data` and
/// sibling keys (`meta`, pagination, summaries) pass through untouched.
/// Every other mapping is a direct record.
pub fn is_envelope(value: &Value) -> bool {
    value
        .get("data")
        .map(|data| data.is_array())
        .unwrap_or(false)
}

/// Keep only the addressed fields. Single-segment paths copy the top-level
/// key verbatim; dotted paths copy the addressed leaf, merging siblings
/// selected under the same parent into one nested mapping. Missing paths
/// and non-mapping parents are inert.
pub fn pick_fields(value: &Value, paths: &[String]) -> Value {
    let parsed = parse_paths(paths);
    let refs: Vec<&[String]> = parsed.iter().map(|p| p.as_slice()).collect();
    transform_records(value, &|record| Value::Object(pick_paths(record, &refs)))
}

/// Remove the addressed fields, keeping everything else unchanged. A
/// single-segment path removes the whole subtree under that key. Missing
/// paths and non-mapping parents are inert.
pub fn omit_fields(value: &Value, paths: &[String]) -> Value {
    let parsed = parse_paths(paths);
    let refs: Vec<&[String]> = parsed.iter().map(|p| p.as_slice()).collect();
    transform_records(value, &|record| Value::Object(drop_paths(record, &refs)))
}

fn parse_paths(paths: &[String]) -> Vec<Vec<String>> {
    paths
        .iter()
        .filter_map(|path| {
            let segments: Vec<String> = path.split('.').map(|s| s.trim().to_string()).collect();
            if segments.iter().any(|s| s.is_empty()) {
                return None;
            }
            Some(segments)
        })
        .collect()
}

fn transform_records(value: &Value, transform: &dyn Fn(&Map<String, Value>) -> Value) -> Value {
    let Value::Object(map) = value else {
        return value.clone();
    };
    if !is_envelope(value) {
        return transform(map);
    }
    let mut out = Map::new();
    for (key, val) in map {
        if key == "data" {
            let records = val
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .map(|item| match item {
                            Value::Object(record) => transform(record),
                            other => other.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default();
            out.insert(key.clone(), Value::Array(records));
        } else {
            out.insert(key.clone(), val.clone());
        }
    }
    Value::Object(out)
}

fn pick_paths(map: &Map<String, Value>, paths: &[&[String]]) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, val) in map {
        let matching: Vec<&[String]> = paths
            .iter()
            .copied()
            .filter(|path| path[0] == *key)
            .collect();
        if matching.is_empty() {
            continue;
        }
        if matching.iter().any(|path| path.len() == 1) {
            out.insert(key.clone(), val.clone());
            continue;
        }
        if let Value::Object(inner) = val {
            let tails: Vec<&[String]> = matching.iter().map(|path| &path[1..]).collect();
            let picked = pick_paths(inner, &tails);
            if !picked.is_empty() {
                out.insert(key.clone(), Value::Object(picked));
            }
        }
    }
    out
}

fn drop_paths(map: &Map<String, Value>, paths: &[&[String]]) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, val) in map {
        let matching: Vec<&[String]> = paths
            .iter()
            .copied()
            .filter(|path| path[0] == *key)
            .collect();
        if matching.iter().any(|path| path.len() == 1) {
            continue;
        }
        if !matching.is_empty() {
            if let Value::Object(inner) = val {
                let tails: Vec<&[String]> = matching.iter().map(|path| &path[1..]).collect();
                out.insert(key.clone(), Value::Object(drop_paths(inner, &tails)));
                continue;
            }
        }
        out.insert(key.clone(), val.clone());
    }
    out
}
