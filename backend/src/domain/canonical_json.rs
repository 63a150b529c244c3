//! Deterministic JSON rendering.

use serde_json::{Map, Value};

/// Recursively sort object keys; arrays keep their element order.
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by_key(|(key, _)| key.as_str());
            let canonical: Map<String, Value> = sorted
                .into_iter()
                .map(|(key, value)| (key.clone(), canonicalize(value)))
                .collect();
            Value::Object(canonical)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Compact JSON text of the canonical form of `value`.
#[must_use]
pub fn to_canonical_string(value: &Value) -> String {
    // Serialising a `Value` cannot fail: every key is already a string.
    serde_json::to_string(&canonicalize(value)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn nested_keys_are_sorted_and_lists_keep_order() {
        let value = json!({"b": [{"z": 1, "a": 2}, 3], "a": null});
        assert_eq!(
            to_canonical_string(&value),
            r#"{"a":null,"b":[{"a":2,"z":1},3]}"#
        );
    }
}
