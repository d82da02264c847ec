mod common;

use std::sync::OnceLock;

use common::build_chain;
use consensus::{Block, hash_block, is_adoptable, proof_of_work, valid_proof, validate_chain};
use proptest::prelude::*;

fn fixture_chain() -> &'static Vec<Block> {
    static CHAIN: OnceLock<Vec<Block>> = OnceLock::new();
    CHAIN.get_or_init(|| build_chain(3))
}

#[test]
fn fixture_chain_is_adoptable() {
    let chain = fixture_chain();
    assert_eq!(chain.len(), 4);
    assert!(validate_chain(chain));
    assert!(is_adoptable(chain));
}

#[test]
fn seed_then_first_transfer_links() {
    let chain = fixture_chain();
    assert_eq!(chain[1].previous_hash, hash_block(&chain[0]).unwrap());
    assert!(valid_proof(chain[0].proof, chain[1].proof));
}

#[test]
fn block_hash_ignores_field_order() {
    let ordered = r#"{
        "index": 2,
        "timestamp": 1700000001000,
        "transaction": {"kind": "seed", "seed_block": "x"},
        "proof": 35293,
        "previous_hash": "abc"
    }"#;
    let shuffled = r#"{
        "previous_hash": "abc",
        "proof": 35293,
        "transaction": {"seed_block": "x", "kind": "seed"},
        "timestamp": 1700000001000,
        "index": 2
    }"#;
    let a: Block = serde_json::from_str(ordered).unwrap();
    let b: Block = serde_json::from_str(shuffled).unwrap();
    assert_eq!(hash_block(&a).unwrap(), hash_block(&b).unwrap());
}

#[test]
fn swapped_blocks_fail_validation() {
    let mut chain = fixture_chain().clone();
    chain.swap(1, 2);
    assert!(!validate_chain(&chain));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn proof_of_work_is_smallest_valid(last_proof in 0u64..1_000_000) {
        let proof = proof_of_work(last_proof);
        prop_assert!(valid_proof(last_proof, proof));
        prop_assert!((0..proof).all(|candidate| !valid_proof(last_proof, candidate)));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn altered_previous_hash_breaks_chain(position in 0usize..4, salt in any::<u64>()) {
        let mut chain = fixture_chain().clone();
        let replacement = consensus::sha256_hex(&salt.to_be_bytes());
        prop_assume!(replacement != chain[position].previous_hash);
        chain[position].previous_hash = replacement;
        prop_assert!(!validate_chain(&chain));
    }

    #[test]
    fn altered_proof_breaks_chain(position in 0usize..4, delta in 1u64..1_000_000) {
        let mut chain = fixture_chain().clone();
        let altered = chain[position].proof.wrapping_add(delta);
        if position == chain.len() - 1 {
            // Only the proof link guards the tip; another valid proof is indistinguishable.
            prop_assume!(!valid_proof(chain[position - 1].proof, altered));
        }
        chain[position].proof = altered;
        prop_assert!(!validate_chain(&chain));
    }
}
