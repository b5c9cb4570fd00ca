//! Recursive merge of settings values.

use serde_json::Value;

/// Merge `incoming` into `target`.
///
/// Objects merge key by key, recursively. Any other incoming value (arrays
/// included) replaces the existing one.
pub fn deep_merge(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (target, incoming) => *target = incoming,
    }
}
