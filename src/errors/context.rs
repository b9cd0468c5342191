//! Context sanitization.
//!
//! Capture context arrives as arbitrary JSON from callers. It is reduced to
//! a depth-limited map of primitives at capture time: branches past the
//! depth limit become a placeholder string rather than causing capture to
//! fail. Since `serde_json::Value` is acyclic by construction, the depth
//! limit is the only guard needed against runaway structures.

use serde_json::{Map, Value};

/// Maximum nesting retained in sanitized context
pub const MAX_CONTEXT_DEPTH: usize = 4;

/// Placeholder inserted where a branch exceeded the depth limit
pub const TRUNCATED: &str = "[truncated]";

/// Reduce arbitrary capture context to a depth-limited map.
///
/// Non-object roots are wrapped under a `detail` key so the entry always
/// carries a map. Never fails.
pub fn sanitize_context(value: Value) -> Map<String, Value> {
    match sanitize(value, MAX_CONTEXT_DEPTH) {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("detail".to_string(), other);
            map
        }
    }
}

fn sanitize(value: Value, depth_left: usize) -> Value {
    match value {
        Value::Object(map) => {
            if depth_left == 0 {
                return Value::String(TRUNCATED.to_string());
            }
            let sanitized: Map<String, Value> = map
                .into_iter()
                .map(|(key, val)| (key, sanitize(val, depth_left - 1)))
                .collect();
            Value::Object(sanitized)
        }
        Value::Array(items) => {
            if depth_left == 0 {
                return Value::String(TRUNCATED.to_string());
            }
            Value::Array(
                items
                    .into_iter()
                    .map(|item| sanitize(item, depth_left - 1))
                    .collect(),
            )
        }
        primitive => primitive,
    }
}
