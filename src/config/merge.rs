//! Layer merging
//!
//! - Objects merge key by key, recursively
//! - Arrays and scalars are replaced by the later layer
//! - An explicit `null` replaces too

use serde_json::{Map, Value};

/// Merge `overlay` on top of `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Merge layers in order; the last layer has the highest precedence.
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

/// Build a single-value overlay from a dot path, e.g. `rpc.max_request_id`.
pub fn overlay_at(path: &str, value: Value) -> Value {
    path.rsplit('.').fold(value, |inner, key| {
        let mut map = Map::new();
        map.insert(key.to_string(), inner);
        Value::Object(map)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_keys_survive() {
        let base = json!({"rpc": {"max_request_time": 1000, "max_request_id": 10}});
        let overlay = json!({"rpc": {"max_request_time": "infinite"}});
        let result = deep_merge(base, overlay);

        assert_eq!(result["rpc"]["max_request_time"], "infinite");
        assert_eq!(result["rpc"]["max_request_id"], 10);
    }

    #[test]
    fn test_arrays_replace() {
        let base = json!({"peer": {"args": ["--verbose", "--color"]}});
        let overlay = json!({"peer": {"args": ["--quiet"]}});
        let result = deep_merge(base, overlay);

        assert_eq!(result["peer"]["args"], json!(["--quiet"]));
    }

    #[test]
    fn test_null_replaces() {
        let result = deep_merge(json!({"log": {"filter": "info"}}), json!({"log": {"filter": null}}));
        assert!(result["log"]["filter"].is_null());
    }

    #[test]
    fn test_last_layer_wins() {
        let result = merge_layers(vec![
            json!({"rpc": {"max_request_time": 1000}, "peer": {"program": "bridge-peer"}}),
            json!({"rpc": {"max_request_time": 250}}),
            json!({"peer": {"program": "./target/debug/bridge-peer"}}),
            json!({"rpc": {"max_request_time": 50}}),
        ]);

        assert_eq!(result["rpc"]["max_request_time"], 50);
        assert_eq!(result["peer"]["program"], "./target/debug/bridge-peer");
    }

    #[test]
    fn test_overlay_at_builds_nested_object() {
        assert_eq!(
            overlay_at("rpc.max_request_id", json!(3)),
            json!({"rpc": {"max_request_id": 3}})
        );
        assert_eq!(overlay_at("flat", json!(true)), json!({"flat": true}));
    }
}
