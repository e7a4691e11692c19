//! Built-in defaults (layer 1)

use bridge_protocol::{DEFAULT_MAX_REQUEST_ID, DEFAULT_MAX_REQUEST_TIME_MS};
use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Request timeout in milliseconds (default: 1000)
    pub max_request_time_ms: u64,

    /// Request id ceiling (default: 10^10)
    pub max_request_id: u64,

    /// Peer program spawned by `bridge call`/`bridge emit` (default: "bridge-peer")
    pub peer_program: String,

    /// Log filter used when `RUST_LOG` is unset (default: "info")
    pub log_filter: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            max_request_time_ms: DEFAULT_MAX_REQUEST_TIME_MS,
            max_request_id: DEFAULT_MAX_REQUEST_ID,
            peer_program: "bridge-peer".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "rpc": {
                "max_request_time": self.max_request_time_ms,
                "max_request_id": self.max_request_id
            },
            "peer": {
                "program": self.peer_program,
                "args": []
            },
            "log": {
                "filter": self.log_filter
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_value() {
        let value = BuiltinDefaults::default().to_value();

        assert_eq!(value["rpc"]["max_request_time"], 1000);
        assert_eq!(value["rpc"]["max_request_id"], 10_000_000_000u64);
        assert_eq!(value["peer"]["program"], "bridge-peer");
        assert_eq!(value["log"]["filter"], "info");
    }
}
