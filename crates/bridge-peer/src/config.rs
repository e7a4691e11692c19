//! Peer configuration.

use std::time::Duration;

use bridge_rpc::RpcConfig;

/// Peer configuration settings.
#[derive(Debug, Clone)]
pub struct PeerServiceConfig {
    /// Engine settings for the peer's own instance.
    pub rpc: RpcConfig,
    /// Upper bound on a single `sleep` request.
    pub max_sleep: Duration,
}

impl Default for PeerServiceConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            max_sleep: Duration::from_secs(60),
        }
    }
}
