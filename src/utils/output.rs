use crate::constants::shaping::{MAX_TEXT_LENGTH, TRUNCATION_SUFFIX};
use crate::utils::compact::compact_empty;
use crate::utils::fields::{omit_fields, pick_fields};
use crate::utils::text::truncate_strings;
use serde_json::Value;

/// Caller-supplied shaping switches, parsed from a tool call's `output`
/// argument. Each stage is optional; when several are requested they run
/// in a fixed, caller-independent order: projection, then compaction,
/// then truncation.
#[derive(Debug, Clone, Default)]
pub struct ShapeOptions {
    pub pick: Option<Vec<String>>,
    pub omit: Option<Vec<String>>,
    pub compact: bool,
    pub truncate: Option<Truncation>,
}

#[derive(Debug, Clone)]
pub struct Truncation {
    pub max_chars: usize,
    pub suffix: String,
}

impl Default for Truncation {
    fn default() -> Self {
        Self {
            max_chars: MAX_TEXT_LENGTH,
            suffix: TRUNCATION_SUFFIX.to_string(),
        }
    }
}

impl ShapeOptions {
    pub fn from_value(output: Option<&Value>) -> Self {
        let Some(obj) = output.and_then(|v| v.as_object()) else {
            return Self::default();
        };
        let pick = obj.get("pick").and_then(string_list);
        let omit = if pick.is_some() {
            None
        } else {
            obj.get("omit").and_then(string_list)
        };
        let compact = obj
            .get("compact")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let truncate = match obj.get("truncate") {
            Some(Value::Bool(true)) => Some(Truncation::default()),
            Some(Value::Object(spec)) => {
                let defaults = Truncation::default();
                Some(Truncation {
                    max_chars: spec
                        .get("max_chars")
                        .and_then(|v| v.as_u64())
                        .map(|n| n as usize)
                        .unwrap_or(defaults.max_chars),
                    suffix: spec
                        .get("suffix")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string())
                        .unwrap_or(defaults.suffix),
                })
            }
            _ => None,
        };
        Self {
            pick,
            omit,
            compact,
            truncate,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.pick.is_none() && self.omit.is_none() && !self.compact && self.truncate.is_none()
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
    )
}

pub fn apply_shape(value: &Value, options: &ShapeOptions) -> Value {
    if options.is_noop() {
        return value.clone();
    }
    let mut current = value.clone();
    if let Some(paths) = &options.pick {
        current = pick_fields(&current, paths);
    } else if let Some(paths) = &options.omit {
        current = omit_fields(&current, paths);
    }
    if options.compact {
        current = compact_empty(&current);
    }
    if let Some(truncation) = &options.truncate {
        current = truncate_strings(&current, truncation.max_chars, &truncation.suffix);
    }
    current
}

pub fn apply_output_transform(value: &Value, output: Option<&Value>) -> Value {
    apply_shape(value, &ShapeOptions::from_value(output))
}
