use std::path::Path;

use consensus::{Block, BusinessKey, PeerNode, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;

use crate::error::{NodeError, NodeResult};

/// Document store backing the ledger, the peer registry, the retry queue and
/// the record cache. Every tree stores JSON documents.
#[derive(Clone, Debug)]
pub struct Storage {
    db: sled::Db,
    blocks: sled::Tree,
    business_keys: sled::Tree,
    nodes: sled::Tree,
    retry_queue: sled::Tree,
    records: sled::Tree,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct StorageStats {
    pub blocks: usize,
    pub nodes: usize,
    pub queued: usize,
    pub cached_records: usize,
}

impl Storage {
    pub fn open(path: impl AsRef<Path>) -> NodeResult<Self> {
        let db = sled::open(path)?;
        let blocks = db.open_tree("blocks")?;
        let business_keys = db.open_tree("business_keys")?;
        let nodes = db.open_tree("nodes")?;
        let retry_queue = db.open_tree("retry_queue")?;
        let records = db.open_tree("records_cache")?;
        Ok(Self {
            db,
            blocks,
            business_keys,
            nodes,
            retry_queue,
            records,
        })
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            blocks: self.blocks.len(),
            nodes: self.nodes.len(),
            queued: self.retry_queue.len(),
            cached_records: self.records.len(),
        }
    }

    pub fn flush(&self) -> NodeResult<()> {
        self.db.flush()?;
        Ok(())
    }

    pub fn insert_block(&self, block: &Block) -> NodeResult<()> {
        let key = index_key(block.index);
        let bytes = encode(block)?;
        let business_key = block.business_key().map(|k| k.to_storage_key());
        (&self.blocks, &self.business_keys)
            .transaction(|(blocks, keys)| {
                blocks.insert(key.as_slice(), bytes.as_slice())?;
                if let Some(business_key) = &business_key {
                    keys.insert(business_key.as_slice(), key.as_slice())?;
                }
                Ok::<(), ConflictableTransactionError<()>>(())
            })
            .map_err(|err| transaction_error(err, "block insert aborted"))
    }

    /// Swaps the stored chain for `chain` in a single transaction over the
    /// block and business-key trees.
    pub fn replace_blocks(&self, chain: &[Block]) -> NodeResult<()> {
        let stale_blocks = self.blocks.iter().keys().collect::<Result<Vec<_>, _>>()?;
        let stale_keys = self
            .business_keys
            .iter()
            .keys()
            .collect::<Result<Vec<_>, _>>()?;
        let mut fresh = Vec::with_capacity(chain.len());
        for block in chain {
            fresh.push((
                index_key(block.index),
                encode(block)?,
                block.business_key().map(|k| k.to_storage_key()),
            ));
        }
        (&self.blocks, &self.business_keys)
            .transaction(|(blocks, keys)| {
                for key in &stale_blocks {
                    blocks.remove(key.clone())?;
                }
                for key in &stale_keys {
                    keys.remove(key.clone())?;
                }
                for (index, bytes, business_key) in &fresh {
                    blocks.insert(index.as_slice(), bytes.as_slice())?;
                    if let Some(business_key) = business_key {
                        keys.insert(business_key.as_slice(), index.as_slice())?;
                    }
                }
                Ok::<(), ConflictableTransactionError<()>>(())
            })
            .map_err(|err| transaction_error(err, "chain replacement aborted"))
    }

    /// All blocks in index order.
    pub fn load_blocks(&self) -> NodeResult<Vec<Block>> {
        let mut blocks = Vec::with_capacity(self.blocks.len());
        for entry in self.blocks.iter() {
            let (_, bytes) = entry?;
            blocks.push(decode(&bytes)?);
        }
        Ok(blocks)
    }

    pub fn load_last_block(&self) -> NodeResult<Option<Block>> {
        self.blocks
            .last()?
            .map(|(_, bytes)| decode(&bytes))
            .transpose()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn has_business_key(&self, key: &BusinessKey) -> NodeResult<bool> {
        Ok(self.business_keys.contains_key(key.to_storage_key())?)
    }

    pub fn insert_node(&self, node: &PeerNode) -> NodeResult<()> {
        self.nodes.insert(node.address.as_bytes(), encode(node)?)?;
        Ok(())
    }

    pub fn has_node(&self, address: &str) -> NodeResult<bool> {
        Ok(self.nodes.contains_key(address.as_bytes())?)
    }

    pub fn load_nodes(&self) -> NodeResult<Vec<PeerNode>> {
        let mut nodes = Vec::new();
        for entry in self.nodes.iter() {
            let (_, bytes) = entry?;
            nodes.push(decode(&bytes)?);
        }
        Ok(nodes)
    }

    pub fn clear_nodes(&self) -> NodeResult<()> {
        self.nodes.clear()?;
        Ok(())
    }

    /// Appends to the back of the retry queue.
    pub fn enqueue_transaction(&self, transaction: &Transaction) -> NodeResult<()> {
        let id = self.db.generate_id()?;
        self.retry_queue
            .insert(id.to_be_bytes(), encode(transaction)?)?;
        Ok(())
    }

    /// Front of the retry queue with its entry id. The entry stays queued
    /// until [`Storage::remove_queued`] is called with that id.
    pub fn peek_transaction(&self) -> NodeResult<Option<(u64, Transaction)>> {
        match self.retry_queue.first()? {
            Some((key, bytes)) => {
                let id = <[u8; 8]>::try_from(key.as_ref())
                    .map(u64::from_be_bytes)
                    .map_err(|_| NodeError::Invalid("malformed retry queue key"))?;
                Ok(Some((id, decode(&bytes)?)))
            }
            None => Ok(None),
        }
    }

    pub fn remove_queued(&self, id: u64) -> NodeResult<bool> {
        Ok(self.retry_queue.remove(id.to_be_bytes())?.is_some())
    }

    pub fn queue_len(&self) -> usize {
        self.retry_queue.len()
    }

    pub fn upsert_record<T: Serialize>(&self, field: &str, record: &T) -> NodeResult<()> {
        self.records.insert(field.as_bytes(), encode(record)?)?;
        Ok(())
    }

    pub fn load_record<T: DeserializeOwned>(&self, field: &str) -> NodeResult<Option<T>> {
        self.records
            .get(field.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }
}

fn encode<T: Serialize>(value: &T) -> NodeResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> NodeResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

fn index_key(index: u64) -> [u8; 8] {
    index.to_be_bytes()
}

fn transaction_error(err: TransactionError<()>, aborted: &'static str) -> NodeError {
    match err {
        TransactionError::Storage(err) => NodeError::Storage(err),
        TransactionError::Abort(()) => NodeError::Invalid(aborted),
    }
}
