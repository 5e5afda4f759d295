use serde_json::Value;

/// Recursively caps every string at `max_chars` characters, appending
/// `suffix` to anything cut. Strings at or under the limit come back
/// unchanged; non-string scalars and container shapes are preserved.
pub fn truncate_strings(value: &Value, max_chars: usize, suffix: &str) -> Value {
    match value {
        Value::String(text) => match text.char_indices().nth(max_chars) {
            Some((cut, _)) => Value::String(format!("{}{}", &text[..cut], suffix)),
            None => value.clone(),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| truncate_strings(item, max_chars, suffix))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, val)| (key.clone(), truncate_strings(val, max_chars, suffix)))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::truncate_strings;
    use serde_json::json;

    #[test]
    fn caps_long_strings_with_suffix() {
        let out = truncate_strings(&json!("abcdefgh"), 5, "...");
        assert_eq!(out, json!("abcde..."));
    }

    #[test]
    fn leaves_short_strings_unchanged() {
        let input = json!({"a": "short"});
        assert_eq!(truncate_strings(&input, 5, "..."), input);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let out = truncate_strings(&json!("aééééz"), 3, "~");
        assert_eq!(out, json!("aéé~"));
    }

    #[test]
    fn reaches_strings_at_any_depth() {
        let input = json!({"a": ["xxxxx", {"b": "yyyyy"}], "n": 42, "f": false});
        assert_eq!(
            truncate_strings(&input, 3, ".."),
            json!({"a": ["xxx..", {"b": "yyy.."}], "n": 42, "f": false})
        );
    }

    #[test]
    fn never_grows_beyond_limit_plus_suffix() {
        let suffix = "...";
        for text in ["", "ab", "abcde", "abcdefghij"] {
            let out = truncate_strings(&json!(text), 5, suffix);
            let len = out.as_str().unwrap().chars().count();
            assert!(len <= text.chars().count().max(5 + suffix.len()));
        }
    }
}
