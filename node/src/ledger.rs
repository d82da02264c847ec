use consensus::{Block, BusinessKey, SEED_INDEX, hash_block, is_adoptable};
use tracing::info;

use crate::error::{NodeError, NodeResult};
use crate::storage::Storage;

/// Ledger view over the block trees. Holds no chain state of its own; every
/// read goes back to storage so consensus decisions see the persisted chain.
#[derive(Clone, Debug)]
pub struct Ledger {
    storage: Storage,
}

impl Ledger {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Persists `block` on top of the current tip.
    pub fn append(&self, block: &Block) -> NodeResult<()> {
        match self.storage.load_last_block()? {
            None => {
                if block.index != SEED_INDEX {
                    return Err(NodeError::Invalid("first block must carry the seed index"));
                }
            }
            Some(last) => {
                if block.index != last.index + 1 {
                    return Err(NodeError::Invalid("block index does not extend the tip"));
                }
                if block.previous_hash != hash_block(&last)? {
                    return Err(NodeError::Invalid("block does not link to the tip"));
                }
            }
        }
        if let Some(key) = block.business_key() {
            if self.storage.has_business_key(&key)? {
                return Err(NodeError::Invalid("business key already committed"));
            }
        }
        self.storage.insert_block(block)
    }

    pub fn chain(&self) -> NodeResult<Vec<Block>> {
        self.storage.load_blocks()
    }

    pub fn len(&self) -> usize {
        self.storage.block_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_block(&self) -> NodeResult<Option<Block>> {
        self.storage.load_last_block()
    }

    pub fn contains(&self, key: &BusinessKey) -> NodeResult<bool> {
        self.storage.has_business_key(key)
    }

    /// Swaps the whole chain for `chain`, which must validate and start at
    /// the seed index.
    pub fn replace(&self, chain: &[Block]) -> NodeResult<()> {
        if chain.is_empty() || !is_adoptable(chain) {
            return Err(NodeError::Invalid("replacement chain is not adoptable"));
        }
        self.storage.replace_blocks(chain)?;
        info!(height = chain.len(), "ledger replaced");
        Ok(())
    }
}
