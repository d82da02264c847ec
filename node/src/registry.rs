use consensus::PeerNode;
use tracing::debug;

use crate::error::{NodeError, NodeResult};
use crate::storage::Storage;

/// Known peer addresses. The node's own address is fixed at construction and
/// never stored.
#[derive(Clone, Debug)]
pub struct NodeRegistry {
    storage: Storage,
    self_address: String,
}

impl NodeRegistry {
    pub fn new(storage: Storage, self_address: impl Into<String>) -> Self {
        Self {
            storage,
            self_address: self_address.into(),
        }
    }

    pub fn self_address(&self) -> &str {
        &self.self_address
    }

    /// Returns whether a new peer was stored.
    pub fn register(&self, address: &str) -> NodeResult<bool> {
        let address = normalize_address(address)?;
        if address == self.self_address || self.storage.has_node(&address)? {
            return Ok(false);
        }
        self.storage.insert_node(&PeerNode {
            address: address.clone(),
        })?;
        debug!(peer = %address, "registered peer");
        Ok(true)
    }

    pub fn list(&self) -> NodeResult<Vec<String>> {
        Ok(self
            .storage
            .load_nodes()?
            .into_iter()
            .map(|node| node.address)
            .collect())
    }

    pub fn is_empty(&self) -> NodeResult<bool> {
        Ok(self.storage.load_nodes()?.is_empty())
    }

    pub fn wipe(&self) -> NodeResult<()> {
        self.storage.clear_nodes()
    }
}

/// Reduces `http://host:port/path` to `host:port`; bare `host:port` passes
/// through trimmed.
pub fn normalize_address(raw: &str) -> NodeResult<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(NodeError::InvalidInput("empty peer address".into()));
    }
    if !trimmed.contains("://") {
        return Ok(trimmed.to_string());
    }
    let url = url::Url::parse(trimmed)
        .map_err(|err| NodeError::InvalidInput(format!("invalid peer url {trimmed}: {err}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| NodeError::InvalidInput(format!("peer url {trimmed} has no host")))?;
    Ok(match url.port_or_known_default() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
