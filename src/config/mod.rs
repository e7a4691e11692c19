//! Configuration layering
//!
//! Settings are merged from three layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. A TOML config file (`--config`, or `bridge.toml` when present)
//! 3. CLI flags
//!
//! The merged document is kept as JSON with provenance; typed views such
//! as [`RpcConfig`] are extracted from it and validated.

mod defaults;
mod effective;
mod merge;

use serde::{Deserialize, Serialize};

use crate::timeout::MaxRequestTime;

pub use defaults::BuiltinDefaults;
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig};
pub use merge::{deep_merge, merge_layers, overlay_at};

/// Per-instance engine settings (`[rpc]` table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Milliseconds, or `"infinite"`.
    pub max_request_time: MaxRequestTime,
    /// Largest request id before the counter wraps to zero.
    pub max_request_id: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            max_request_time: MaxRequestTime::default(),
            max_request_id: bridge_protocol::DEFAULT_MAX_REQUEST_ID,
        }
    }
}

impl RpcConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.max_request_time
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        if self.max_request_id == 0 {
            return Err(ConfigError::ValidationError(
                "max_request_id must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Peer process launched by the CLI (`[peer]` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            program: "bridge-peer".to_string(),
            args: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_config_defaults() {
        let config = RpcConfig::default();
        assert_eq!(config.max_request_time, MaxRequestTime::from_millis(1000));
        assert_eq!(config.max_request_id, 10_000_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_max_request_id_rejected() {
        let config = RpcConfig {
            max_request_id: 0,
            ..RpcConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_request_id"));
    }

    #[test]
    fn test_partial_table_uses_defaults() {
        let config: RpcConfig =
            serde_json::from_value(serde_json::json!({"max_request_time": "infinite"})).unwrap();
        assert!(config.max_request_time.is_infinite());
        assert_eq!(config.max_request_id, 10_000_000_000);
    }
}
