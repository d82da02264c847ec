use serde::{Deserialize, Serialize};

pub type BlockIndex = u64;
pub type Proof = u64;

/// Proof carried by the seed block of every ledger.
pub const SEED_PROOF: Proof = 100;
/// Placeholder parent hash carried by the seed block.
pub const SEED_PREVIOUS_HASH: &str = "10";
pub const SEED_INDEX: BlockIndex = 1;
pub const SEED_MARKER: &str = "blockchain_initialized";

/// One committed unit of the ledger.
///
/// Field names are part of the wire format and of the canonical hash input,
/// so they must stay stable across releases.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: BlockIndex,
    /// Milliseconds since the unix epoch at sealing time.
    pub timestamp: u64,
    pub transaction: BlockPayload,
    pub proof: Proof,
    pub previous_hash: String,
}

impl Block {
    pub fn seed(timestamp: u64) -> Self {
        Self {
            index: SEED_INDEX,
            timestamp,
            transaction: BlockPayload::Seed {
                seed_block: SEED_MARKER.to_string(),
            },
            proof: SEED_PROOF,
            previous_hash: SEED_PREVIOUS_HASH.to_string(),
        }
    }

    pub fn is_seed(&self) -> bool {
        matches!(self.transaction, BlockPayload::Seed { .. })
    }

    pub fn transfer(&self) -> Option<&Transaction> {
        match &self.transaction {
            BlockPayload::Transfer(tx) => Some(tx),
            BlockPayload::Seed { .. } => None,
        }
    }

    pub fn business_key(&self) -> Option<BusinessKey> {
        self.transfer().map(Transaction::business_key)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockPayload {
    Seed { seed_block: String },
    Transfer(Transaction),
}

/// A land transfer recorded in a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub plot_number: String,
    pub size: String,
    pub location: String,
    pub county: String,
    pub seller_id: u64,
    pub buyer_id: u64,
    pub transfer_amount: u64,
    pub original_owner: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_tel: Option<String>,
    pub transfer_fee: TransferFee,
}

impl Transaction {
    pub fn business_key(&self) -> BusinessKey {
        BusinessKey {
            plot_number: self.plot_number.clone(),
            seller_id: self.seller_id,
            buyer_id: self.buyer_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFee {
    pub sender: u64,
    pub recipient: String,
    pub amount: u64,
}

/// Identifies a transfer independently of its block position. At most one
/// committed block may carry a given key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BusinessKey {
    pub plot_number: String,
    pub seller_id: u64,
    pub buyer_id: u64,
}

impl BusinessKey {
    /// Stable byte encoding used as a storage key.
    pub fn to_storage_key(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.plot_number.len() + 1 + 16);
        out.extend_from_slice(self.plot_number.as_bytes());
        out.push(0);
        out.extend_from_slice(&self.seller_id.to_be_bytes());
        out.extend_from_slice(&self.buyer_id.to_be_bytes());
        out
    }
}

impl std::fmt::Display for BusinessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}->{}", self.plot_number, self.seller_id, self.buyer_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerNode {
    pub address: String,
}
