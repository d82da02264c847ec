#![allow(dead_code)]
use consensus::{Block, BlockPayload, Transaction, TransferFee, hash_block, proof_of_work};

pub fn transfer(plot: &str, seller_id: u64, buyer_id: u64) -> Transaction {
    Transaction {
        plot_number: plot.to_string(),
        size: "0.5 acres".to_string(),
        location: "Kikuyu".to_string(),
        county: "Kiambu".to_string(),
        seller_id,
        buyer_id,
        transfer_amount: 800_000,
        original_owner: false,
        buyer_name: None,
        buyer_tel: None,
        transfer_fee: TransferFee {
            sender: buyer_id,
            recipient: "test-node".to_string(),
            amount: 10_000,
        },
    }
}

/// Seals a block on top of `last` the same way a forging node does.
pub fn seal_next(last: &Block, transaction: Transaction) -> Block {
    Block {
        index: last.index + 1,
        timestamp: last.timestamp + 1_000,
        transaction: BlockPayload::Transfer(transaction),
        proof: proof_of_work(last.proof),
        previous_hash: hash_block(last).expect("hash block"),
    }
}

/// Seed plus `extra` transfer blocks with fixed timestamps.
pub fn build_chain(extra: usize) -> Vec<Block> {
    let mut chain = vec![Block::seed(1_700_000_000_000)];
    for i in 0..extra {
        let next = seal_next(
            chain.last().expect("non-empty"),
            transfer(&format!("plt{i:04}"), 1_000 + i as u64, 2_000 + i as u64),
        );
        chain.push(next);
    }
    chain
}
