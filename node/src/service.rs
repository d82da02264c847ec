use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use consensus::{
    AccessPolicy, Block, BlockPayload, BusinessKey, Transaction, hash_block, is_adoptable,
    proof_of_work,
};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

use crate::cache::RecordCache;
use crate::config::NodeConfig;
use crate::drainer::{AlertSink, DrainerHandle, HttpAlertSink, TransactionDrainer};
use crate::error::{NodeError, NodeResult};
use crate::ledger::Ledger;
use crate::queue::{QueuedTransaction, RetryQueue};
use crate::registry::NodeRegistry;
use crate::storage::{Storage, StorageStats};
use crate::sync::{
    HttpTransport, PeerFailure, PeerPayload, PeerTransport, Resource, SyncClient, SyncError,
};
use crate::telemetry::{Telemetry, TelemetrySnapshot};
use crate::transaction::TransferRequest;

pub struct NodeHandle {
    pub service: Arc<NodeService>,
    drainer: DrainerHandle,
}

impl NodeHandle {
    pub async fn shutdown(self) -> NodeResult<()> {
        if let Err(err) = self.drainer.stop().await {
            warn!(?err, "transaction drainer did not shut down cleanly");
        }
        match self.service.storage.flush() {
            Ok(()) => {
                info!("node storage flushed");
                Ok(())
            }
            Err(err) => {
                warn!(?err, "failed to flush node storage");
                Err(err)
            }
        }
    }
}

/// Result of one forge attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ForgeOutcome {
    Committed { block: Block },
    /// Sync failed; the transaction waits in the retry queue.
    Deferred { key: BusinessKey },
    /// The business key is already on the ledger.
    Rejected { key: BusinessKey },
}

#[derive(Clone, Debug, Serialize)]
pub struct SyncReport {
    pub replaced: bool,
    pub height: usize,
    pub peers: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NodeStatus {
    pub address: String,
    pub node_id: String,
    pub pending: bool,
    pub storage: StorageStats,
    pub telemetry: TelemetrySnapshot,
}

struct ForgeState {
    pending: bool,
}

/// Serialises every forge attempt on this node: sync, duplicate check,
/// sealing, persisting and scheduling the broadcast happen under one lock.
pub struct NodeService {
    config: NodeConfig,
    storage: Storage,
    ledger: Ledger,
    registry: NodeRegistry,
    queue: RetryQueue,
    cache: RecordCache,
    sync: Arc<SyncClient>,
    access: AccessPolicy,
    node_id: String,
    telemetry: Arc<Telemetry>,
    forge: Mutex<ForgeState>,
    // Mirror of ForgeState::pending for readers that must not wait on the
    // forge lock. Only written while that lock is held.
    pending_tx: watch::Sender<bool>,
}

impl NodeService {
    pub fn new(config: NodeConfig, storage: Storage, transport: Box<dyn PeerTransport>) -> Self {
        let ledger = Ledger::new(storage.clone());
        let registry = NodeRegistry::new(storage.clone(), config.public_addr.clone());
        let queue = RetryQueue::new(storage.clone());
        let cache = RecordCache::new(storage.clone());
        let access = AccessPolicy::new(&config.secret_key, config.public_addr.clone());
        let node_id = config.resolved_node_id();
        let telemetry = Telemetry::new();
        telemetry.set_height(ledger.len());
        // A queue that survived a restart still holds deferred work.
        let pending = !queue.is_empty();
        let (pending_tx, _) = watch::channel(pending);
        Self {
            config,
            storage,
            ledger,
            registry,
            queue,
            cache,
            sync: Arc::new(SyncClient::new(transport)),
            access,
            node_id,
            telemetry: Arc::new(telemetry),
            forge: Mutex::new(ForgeState { pending }),
            pending_tx,
        }
    }

    /// Opens storage, talks to peers over HTTP, and starts the drainer.
    pub async fn start(config: NodeConfig) -> NodeResult<NodeHandle> {
        let access = AccessPolicy::new(&config.secret_key, config.public_addr.clone());
        let transport = HttpTransport::new(
            access.access_key(),
            config.public_addr.clone(),
            config.peer_timeout(),
        )?;
        let alerts = match &config.alerts_url {
            Some(url) => Some(Arc::new(HttpAlertSink::new(url.clone(), config.peer_timeout())?)
                as Arc<dyn AlertSink>),
            None => None,
        };
        Self::start_with(config, Box::new(transport), alerts).await
    }

    pub async fn start_with(
        config: NodeConfig,
        transport: Box<dyn PeerTransport>,
        alerts: Option<Arc<dyn AlertSink>>,
    ) -> NodeResult<NodeHandle> {
        let storage = Storage::open(&config.db_path)?;
        let service = Arc::new(Self::new(config, storage, transport));
        if let Some(peer) = service.config.init_peer.clone() {
            service.register_peer(&peer)?;
        }
        service.bootstrap().await?;
        let drainer = TransactionDrainer::new(service.clone(), alerts).spawn();
        info!(
            address = %service.config.public_addr,
            node_id = %service.node_id,
            height = service.ledger.len(),
            "node service started"
        );
        Ok(NodeHandle { service, drainer })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn self_address(&self) -> &str {
        self.registry.self_address()
    }

    pub fn retry_queue(&self) -> &RetryQueue {
        &self.queue
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    pub fn is_pending(&self) -> bool {
        *self.pending_tx.borrow()
    }

    pub fn telemetry_snapshot(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            address: self.config.public_addr.clone(),
            node_id: self.node_id.clone(),
            pending: self.is_pending(),
            storage: self.storage.stats(),
            telemetry: self.telemetry.snapshot(),
        }
    }

    /// Checks inbound peer credentials and returns the requester address.
    pub fn authorize(&self, key: Option<&str>, address: Option<&str>) -> NodeResult<String> {
        Ok(self.access.authorize(key, address)?.to_string())
    }

    pub fn register_peer(&self, address: &str) -> NodeResult<bool> {
        self.registry.register(address)
    }

    pub fn peers(&self) -> NodeResult<Vec<String>> {
        self.registry.list()
    }

    /// Authorized node-list read: the requester joins the registry.
    pub fn node_list(&self, key: Option<&str>, address: Option<&str>) -> NodeResult<Vec<String>> {
        let requester = self.authorize(key, address)?;
        self.registry.register(&requester)?;
        self.registry.list()
    }

    pub fn transaction_exists(&self, key: &BusinessKey) -> NodeResult<bool> {
        self.ledger.contains(key)
    }

    /// The persisted chain, or `None` while deferred work is outstanding.
    pub fn extract_chain(&self) -> NodeResult<Option<Vec<Block>>> {
        if self.is_pending() {
            return Ok(None);
        }
        self.ledger.chain().map(Some)
    }

    /// Seals the seed block on a node that has neither peers nor blocks.
    pub async fn bootstrap(&self) -> NodeResult<Option<Block>> {
        let _forge = self.forge.lock().await;
        if !self.registry.is_empty()? || !self.ledger.is_empty() {
            return Ok(None);
        }
        let seed = Block::seed(current_time_ms());
        self.ledger.append(&seed)?;
        self.telemetry.set_height(self.ledger.len());
        info!(index = seed.index, "seed block sealed");
        Ok(Some(seed))
    }

    /// Adopts a chain pushed by a peer when it is longer than ours and
    /// valid from the seed index.
    pub async fn replace_chain(&self, chain: Vec<Block>) -> NodeResult<bool> {
        let _forge = self.forge.lock().await;
        if chain.len() <= self.ledger.len() || !is_adoptable(&chain) {
            info!(
                offered = chain.len(),
                local = self.ledger.len(),
                "pushed chain not adopted"
            );
            return Ok(false);
        }
        self.adopt(&chain)?;
        Ok(true)
    }

    /// Reconciles peers and ledger outside of a forge.
    pub async fn synchronize(&self) -> NodeResult<SyncReport> {
        let mut forge = self.forge.lock().await;
        let replaced = self.reconcile().await?;
        self.settle_pending(&mut forge);
        Ok(SyncReport {
            replaced,
            height: self.ledger.len(),
            peers: self.registry.list()?,
        })
    }

    pub async fn submit_request(&self, request: TransferRequest) -> NodeResult<ForgeOutcome> {
        let transaction = request.into_transaction(&self.node_id, self.config.transfer_fee)?;
        self.submit_transaction(transaction).await
    }

    /// Runs one forge attempt for `transaction`.
    pub async fn submit_transaction(&self, transaction: Transaction) -> NodeResult<ForgeOutcome> {
        self.forge_transaction(transaction, None).await
    }

    /// Forge attempt for the head of the retry queue. The entry is
    /// acknowledged once the outcome is persisted; on error it stays queued.
    pub async fn resubmit_queued(&self, entry: QueuedTransaction) -> NodeResult<ForgeOutcome> {
        self.forge_transaction(entry.transaction, Some(entry.id)).await
    }

    async fn forge_transaction(
        &self,
        transaction: Transaction,
        queued: Option<u64>,
    ) -> NodeResult<ForgeOutcome> {
        let key = transaction.business_key();
        let mut forge = self.forge.lock().await;

        match self.reconcile().await {
            Ok(_) => {}
            Err(NodeError::Sync(err)) => {
                warn!(%key, %err, "sync failed; deferring transaction");
                self.queue.push(&transaction)?;
                if let Some(id) = queued {
                    self.queue.ack(id)?;
                }
                self.set_pending(&mut forge, true);
                self.telemetry.record_deferred();
                return Ok(ForgeOutcome::Deferred { key });
            }
            Err(err) => return Err(err),
        }

        if self.ledger.contains(&key)? {
            info!(%key, "duplicate transfer rejected");
            if let Some(id) = queued {
                self.queue.ack(id)?;
            }
            self.settle_pending(&mut forge);
            self.telemetry.record_rejected();
            return Ok(ForgeOutcome::Rejected { key });
        }

        let last = self
            .ledger
            .last_block()?
            .ok_or(NodeError::Invalid("ledger has no tip after sync"))?;
        let previous_hash = hash_block(&last)?;
        let last_proof = last.proof;
        let proof = tokio::task::spawn_blocking(move || proof_of_work(last_proof)).await?;
        let block = Block {
            index: last.index + 1,
            timestamp: current_time_ms(),
            transaction: BlockPayload::Transfer(transaction),
            proof,
            previous_hash,
        };
        self.ledger.append(&block)?;
        self.cache.record_block(&block)?;
        self.telemetry.record_commit(self.ledger.len());
        info!(%key, index = block.index, proof, "block committed");

        if let Some(id) = queued {
            self.queue.ack(id)?;
        }
        self.settle_pending(&mut forge);
        self.spawn_broadcast()?;
        Ok(ForgeOutcome::Committed { block })
    }

    fn set_pending(&self, forge: &mut ForgeState, pending: bool) {
        if forge.pending != pending {
            info!(pending, "pending flag changed");
        }
        forge.pending = pending;
        self.pending_tx.send_replace(pending);
    }

    /// Clears the pending flag once nothing is left in the retry queue.
    fn settle_pending(&self, forge: &mut ForgeState) {
        if self.queue.is_empty() {
            self.set_pending(forge, false);
        }
    }

    fn spawn_broadcast(&self) -> NodeResult<()> {
        let peers = self.registry.list()?;
        if peers.is_empty() {
            return Ok(());
        }
        let chain = self.ledger.chain()?;
        let sync = self.sync.clone();
        let telemetry = self.telemetry.clone();
        tokio::spawn(async move {
            let failures = sync.broadcast_ledger(&peers, &chain).await;
            if !failures.is_empty() {
                telemetry.record_broadcast_failures(failures.len());
            }
        });
        Ok(())
    }

    /// Node list first, then the ledger. Any peer failure aborts the whole
    /// attempt. Returns whether the local chain was replaced.
    async fn reconcile(&self) -> NodeResult<bool> {
        let mut peers = self.registry.list()?;
        let mut replaced = false;
        if peers.is_empty() {
            if self.config.forge_requires_peers {
                self.telemetry.record_sync_failures(&[]);
                return Err(SyncError::NoPeers.into());
            }
        } else {
            let sweep = self
                .sync
                .fetch_peer_data(&peers, Resource::Nodes, peers.len())
                .await;
            self.check_sweep(sweep.failures)?;
            if let Some(PeerPayload::Nodes(nodes)) = sweep.payload {
                for node in &nodes {
                    match self.registry.register(node) {
                        Ok(_) => {}
                        Err(NodeError::InvalidInput(reason)) => {
                            warn!(peer = %node, %reason, "skipping peer-supplied address");
                        }
                        Err(err) => return Err(err),
                    }
                }
                peers = self.registry.list()?;
            }

            let sweep = self
                .sync
                .fetch_peer_data(&peers, Resource::Ledger, self.ledger.len())
                .await;
            self.check_sweep(sweep.failures)?;
            if let Some(PeerPayload::Ledger(chain)) = sweep.payload {
                self.adopt(&chain)?;
                replaced = true;
            }
        }
        if self.ledger.is_empty() {
            return Err(SyncError::EmptyLedger.into());
        }
        Ok(replaced)
    }

    fn check_sweep(&self, failures: Vec<PeerFailure>) -> NodeResult<()> {
        if failures.is_empty() {
            return Ok(());
        }
        self.telemetry.record_sync_failures(&failures);
        Err(SyncError::Unreachable(failures).into())
    }

    fn adopt(&self, chain: &[Block]) -> NodeResult<()> {
        self.ledger.replace(chain)?;
        self.cache.refresh_from(chain)?;
        self.telemetry.record_replacement(chain.len());
        Ok(())
    }
}

fn current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_millis().min(u128::from(u64::MAX)) as u64)
        .unwrap_or(0)
}
