use consensus::Block;
use serde::{Deserialize, Serialize};

use crate::error::NodeResult;
use crate::storage::Storage;

/// Current owner projection of a plot, keyed by plot number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub owner_id: u64,
    pub owner_name: Option<String>,
    pub owner_tel: Option<String>,
    pub county: String,
    pub location: String,
    pub size: String,
    /// Timestamp of the block that recorded the transfer.
    pub recorded_on: u64,
}

impl CacheRecord {
    pub fn from_block(block: &Block) -> Option<(String, Self)> {
        let tx = block.transfer()?;
        Some((
            tx.plot_number.clone(),
            Self {
                owner_id: tx.buyer_id,
                owner_name: tx.buyer_name.clone(),
                owner_tel: tx.buyer_tel.clone(),
                county: tx.county.clone(),
                location: tx.location.clone(),
                size: tx.size.clone(),
                recorded_on: block.timestamp,
            },
        ))
    }
}

#[derive(Clone, Debug)]
pub struct RecordCache {
    storage: Storage,
}

impl RecordCache {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn upsert(&self, field: &str, record: &CacheRecord) -> NodeResult<()> {
        self.storage.upsert_record(field, record)
    }

    /// Projects one block; the seed block is skipped.
    pub fn record_block(&self, block: &Block) -> NodeResult<()> {
        if let Some((field, record)) = CacheRecord::from_block(block) {
            self.upsert(&field, &record)?;
        }
        Ok(())
    }

    /// Replays every transfer in `chain` in order, so later owners win.
    pub fn refresh_from(&self, chain: &[Block]) -> NodeResult<usize> {
        let mut written = 0;
        for block in chain {
            if let Some((field, record)) = CacheRecord::from_block(block) {
                self.upsert(&field, &record)?;
                written += 1;
            }
        }
        Ok(written)
    }

    pub fn get(&self, field: &str) -> NodeResult<Option<CacheRecord>> {
        self.storage.load_record(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus::{BlockPayload, Transaction, TransferFee};
    use tempfile::tempdir;

    fn transfer_block(index: u64, buyer_id: u64) -> Block {
        Block {
            index,
            timestamp: index * 10,
            transaction: BlockPayload::Transfer(Transaction {
                plot_number: "plt500".to_string(),
                size: "3 acres".to_string(),
                location: "Limuru".to_string(),
                county: "Kiambu".to_string(),
                seller_id: buyer_id - 1,
                buyer_id,
                transfer_amount: 1,
                original_owner: false,
                buyer_name: Some(format!("owner-{buyer_id}")),
                buyer_tel: Some("0700000000".to_string()),
                transfer_fee: TransferFee {
                    sender: buyer_id,
                    recipient: "node".to_string(),
                    amount: 10_000,
                },
            }),
            proof: 0,
            previous_hash: String::new(),
        }
    }

    #[test]
    fn refresh_skips_seed_and_keeps_latest_owner() {
        let dir = tempdir().unwrap();
        let cache = RecordCache::new(Storage::open(dir.path().join("cache.db")).unwrap());
        let chain = vec![Block::seed(1), transfer_block(2, 100), transfer_block(3, 200)];

        assert_eq!(cache.refresh_from(&chain).unwrap(), 2);
        let record = cache.get("plt500").unwrap().unwrap();
        assert_eq!(record.owner_id, 200);
        assert_eq!(record.owner_name.as_deref(), Some("owner-200"));
        assert_eq!(record.recorded_on, 30);
        assert!(cache.get("blockchain_initialized").unwrap().is_none());
    }
}
