use crate::hashing::sha256_hex;
use crate::types::Proof;

/// Leading hex digits of the work hash that must be zero.
pub const DIFFICULTY_PREFIX: &str = "0000";

/// Returns true when `sha256("{last_proof}{proof}")` starts with
/// [`DIFFICULTY_PREFIX`].
pub fn valid_proof(last_proof: Proof, proof: Proof) -> bool {
    let guess = format!("{last_proof}{proof}");
    sha256_hex(guess.as_bytes()).starts_with(DIFFICULTY_PREFIX)
}

/// Smallest proof satisfying [`valid_proof`] for `last_proof`, found by a
/// linear search from zero.
///
/// CPU bound: about 65k hashes on average. Async callers should run it on a
/// blocking thread.
pub fn proof_of_work(last_proof: Proof) -> Proof {
    let mut proof = 0;
    while !valid_proof(last_proof, proof) {
        proof += 1;
    }
    proof
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proof_for_seed_is_minimal() {
        let proof = proof_of_work(100);
        assert!(valid_proof(100, proof));
        assert!((0..proof).all(|candidate| !valid_proof(100, candidate)));
    }

    #[test]
    fn search_is_deterministic() {
        assert_eq!(proof_of_work(7), proof_of_work(7));
    }
}
