use consensus::{BusinessKey, Transaction, TransferFee};
use serde::{Deserialize, Serialize};

use crate::error::{NodeError, NodeResult};

/// Transfer as submitted by a client, before the node attaches its fee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub plot_number: String,
    pub size: String,
    pub location: String,
    pub county: String,
    pub seller_id: u64,
    pub buyer_id: u64,
    pub amount: u64,
    pub original_owner: bool,
    #[serde(default)]
    pub buyer_name: Option<String>,
    #[serde(default)]
    pub buyer_tel: Option<String>,
}

impl TransferRequest {
    pub fn business_key(&self) -> BusinessKey {
        BusinessKey {
            plot_number: self.plot_number.trim().to_string(),
            seller_id: self.seller_id,
            buyer_id: self.buyer_id,
        }
    }

    fn validate(&self) -> NodeResult<()> {
        let required = [
            ("plot_number", &self.plot_number),
            ("size", &self.size),
            ("location", &self.location),
            ("county", &self.county),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(NodeError::InvalidInput(format!("{name} must not be empty")));
        }
        if self.seller_id == self.buyer_id {
            return Err(NodeError::InvalidInput(
                "seller and buyer must be different people".into(),
            ));
        }
        Ok(())
    }

    /// Builds the ledger transaction, charging the buyer `fee` payable to
    /// `node_id`.
    pub fn into_transaction(self, node_id: &str, fee: u64) -> NodeResult<Transaction> {
        self.validate()?;
        Ok(Transaction {
            plot_number: self.plot_number.trim().to_string(),
            size: self.size,
            location: self.location,
            county: self.county,
            seller_id: self.seller_id,
            buyer_id: self.buyer_id,
            transfer_amount: self.amount,
            original_owner: self.original_owner,
            buyer_name: self.buyer_name,
            buyer_tel: self.buyer_tel,
            transfer_fee: TransferFee {
                sender: self.buyer_id,
                recipient: node_id.to_string(),
                amount: fee,
            },
        })
    }
}
