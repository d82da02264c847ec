use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use consensus::{Block, is_adoptable};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const API_KEY_HEADER: &str = "api-key";
pub const URL_HEADER: &str = "url";
pub const API_PREFIX: &str = "/backend/v1";

/// What a sync sweep asks peers for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    Nodes,
    Ledger,
}

impl Resource {
    pub fn path(self) -> &'static str {
        match self {
            Resource::Nodes => "nodes",
            Resource::Ledger => "blocks",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerPayload {
    Nodes(Vec<String>),
    Ledger(Vec<Block>),
}

impl PeerPayload {
    pub fn len(&self) -> usize {
        match self {
            PeerPayload::Nodes(nodes) => nodes.len(),
            PeerPayload::Ledger(chain) => chain.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn resource(&self) -> Resource {
        match self {
            PeerPayload::Nodes(_) => Resource::Nodes,
            PeerPayload::Ledger(_) => Resource::Ledger,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PeerFailure {
    pub peer: String,
    pub reason: String,
}

impl PeerFailure {
    pub fn new(peer: &str, reason: impl Into<String>) -> Self {
        Self {
            peer: peer.to_string(),
            reason: reason.into(),
        }
    }

    pub fn unreachable(peer: &str) -> Self {
        Self::new(peer, format!("Failed to connect to: {peer}"))
    }
}

impl fmt::Display for PeerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.peer, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no peers registered")]
    NoPeers,
    #[error("{} peer(s) failed: {}", .0.len(), join_failures(.0))]
    Unreachable(Vec<PeerFailure>),
    #[error("no peer holds a ledger")]
    EmptyLedger,
}

fn join_failures(failures: &[PeerFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Outbound peer I/O.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn fetch(&self, peer: &str, resource: Resource) -> Result<PeerPayload, PeerFailure>;

    async fn push_ledger(&self, peer: &str, chain: &[Block]) -> Result<(), PeerFailure>;
}

/// Response body shared by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub message: String,
    pub payload: T,
}

pub struct HttpTransport {
    client: reqwest::Client,
    access_key: String,
    self_address: String,
}

impl HttpTransport {
    pub fn new(
        access_key: impl Into<String>,
        self_address: impl Into<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            access_key: access_key.into(),
            self_address: self_address.into(),
        })
    }

    fn endpoint(peer: &str, resource: Resource) -> String {
        format!("http://{peer}{API_PREFIX}/{}", resource.path())
    }

    async fn failure_from(peer: &str, response: reqwest::Response) -> PeerFailure {
        let status = response.status();
        let message = response
            .json::<Envelope<serde_json::Value>>()
            .await
            .map(|body| body.message)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
        PeerFailure::new(peer, format!("{} | {message}", status.as_u16()))
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn fetch(&self, peer: &str, resource: Resource) -> Result<PeerPayload, PeerFailure> {
        let response = self
            .client
            .get(Self::endpoint(peer, resource))
            .header(API_KEY_HEADER, &self.access_key)
            .header(URL_HEADER, &self.self_address)
            .send()
            .await
            .map_err(|_| PeerFailure::unreachable(peer))?;
        if !response.status().is_success() {
            return Err(Self::failure_from(peer, response).await);
        }
        let malformed = |err: reqwest::Error| PeerFailure::new(peer, format!("malformed response: {err}"));
        match resource {
            Resource::Nodes => {
                let body: Envelope<Vec<String>> = response.json().await.map_err(malformed)?;
                Ok(PeerPayload::Nodes(body.payload))
            }
            Resource::Ledger => {
                let body: Envelope<Vec<Block>> = response.json().await.map_err(malformed)?;
                Ok(PeerPayload::Ledger(body.payload))
            }
        }
    }

    async fn push_ledger(&self, peer: &str, chain: &[Block]) -> Result<(), PeerFailure> {
        let response = self
            .client
            .post(Self::endpoint(peer, Resource::Ledger))
            .header(API_KEY_HEADER, &self.access_key)
            .header(URL_HEADER, &self.self_address)
            .json(chain)
            .send()
            .await
            .map_err(|_| PeerFailure::unreachable(peer))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::failure_from(peer, response).await)
        }
    }
}

/// Outcome of one sweep: the longest acceptable payload seen, if it beat the
/// caller's current length, plus every peer that failed.
#[derive(Debug, Default)]
pub struct SyncSweep {
    pub payload: Option<PeerPayload>,
    pub failures: Vec<PeerFailure>,
}

pub struct SyncClient {
    transport: Box<dyn PeerTransport>,
}

impl SyncClient {
    pub fn new(transport: Box<dyn PeerTransport>) -> Self {
        Self { transport }
    }

    /// Queries peers one at a time. A candidate replaces the running best
    /// only when strictly longer, so the first peer to reach a length wins
    /// ties. Ledger candidates must also validate from the seed index.
    pub async fn fetch_peer_data(
        &self,
        peers: &[String],
        resource: Resource,
        current_len: usize,
    ) -> SyncSweep {
        let mut sweep = SyncSweep::default();
        let mut max_len = current_len;
        for peer in peers {
            let payload = match self.transport.fetch(peer, resource).await {
                Ok(payload) => payload,
                Err(failure) => {
                    warn!(peer = %peer, reason = %failure.reason, ?resource, "peer fetch failed");
                    sweep.failures.push(failure);
                    continue;
                }
            };
            if payload.resource() != resource {
                sweep
                    .failures
                    .push(PeerFailure::new(peer, "peer answered with the wrong resource"));
                continue;
            }
            if payload.len() <= max_len {
                continue;
            }
            if let PeerPayload::Ledger(chain) = &payload {
                if !is_adoptable(chain) {
                    warn!(peer = %peer, height = chain.len(), "ignoring invalid peer ledger");
                    continue;
                }
            }
            debug!(peer = %peer, len = payload.len(), ?resource, "new sync candidate");
            max_len = payload.len();
            sweep.payload = Some(payload);
        }
        sweep
    }

    /// Pushes `chain` to every peer in turn and returns the failures.
    pub async fn broadcast_ledger(&self, peers: &[String], chain: &[Block]) -> Vec<PeerFailure> {
        let mut failures = Vec::new();
        for peer in peers {
            if let Err(failure) = self.transport.push_ledger(peer, chain).await {
                warn!(peer = %peer, reason = %failure.reason, "ledger broadcast failed");
                failures.push(failure);
            }
        }
        failures
    }
}
