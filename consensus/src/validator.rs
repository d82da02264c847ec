use crate::hashing::hash_block;
use crate::pow::valid_proof;
use crate::types::{Block, SEED_INDEX};

/// Checks every consecutive pair for an intact hash link and proof link.
///
/// Chains of length zero or one are vacuously valid. The first broken link
/// fails the whole chain.
pub fn validate_chain(chain: &[Block]) -> bool {
    chain.windows(2).all(|pair| {
        let (previous, current) = (&pair[0], &pair[1]);
        let linked = match hash_block(previous) {
            Ok(hash) => current.previous_hash == hash,
            Err(_) => false,
        };
        linked && valid_proof(previous.proof, current.proof)
    })
}

/// Indices must run 1, 2, 3, ... without gaps.
pub fn is_sequential(chain: &[Block]) -> bool {
    chain
        .iter()
        .enumerate()
        .all(|(position, block)| block.index == SEED_INDEX + position as u64)
}

/// Acceptance rule for a chain offered by a peer.
pub fn is_adoptable(chain: &[Block]) -> bool {
    is_sequential(chain) && validate_chain(chain)
}
