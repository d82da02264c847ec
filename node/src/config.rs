use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TRANSFER_FEE: u64 = 10_000;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    pub db_path: PathBuf,
    /// Socket the HTTP API binds to.
    pub api_addr: SocketAddr,
    /// This node's own `host:port` as peers see it. Never registered as a peer.
    pub public_addr: String,
    /// Shared network secret from which the access key is derived.
    pub secret_key: String,
    /// Peer registered at start-up, before the first-boot seed check.
    pub init_peer: Option<String>,
    /// Recipient of transfer fees. A random id is generated when unset.
    pub node_id: Option<String>,
    pub transfer_fee: u64,
    pub peer_timeout_ms: u64,
    pub drain_interval_ms: u64,
    pub drain_pop_timeout_ms: u64,
    /// Front-end endpoint notified after the drainer commits a transfer.
    pub alerts_url: Option<String>,
    /// Treat an empty peer registry as a sync failure.
    pub forge_requires_peers: bool,
}

impl NodeConfig {
    pub fn with_db_path(path: impl AsRef<Path>) -> Self {
        Self {
            db_path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Configured fee recipient, or a fresh random 16-byte hex id.
    pub fn resolved_node_id(&self) -> String {
        match &self.node_id {
            Some(id) => id.clone(),
            None => hex::encode(rand::random::<[u8; 16]>()),
        }
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }

    pub fn drain_pop_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_pop_timeout_ms)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("titlechain.db"),
            api_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            public_addr: "127.0.0.1:5000".to_string(),
            secret_key: "devnet-secret".to_string(),
            init_peer: None,
            node_id: None,
            transfer_fee: DEFAULT_TRANSFER_FEE,
            peer_timeout_ms: 5_000,
            drain_interval_ms: 5_000,
            drain_pop_timeout_ms: 2_000,
            alerts_url: None,
            forge_requires_peers: false,
        }
    }
}
