pub mod auth;
pub mod error;
pub mod hashing;
pub mod pow;
pub mod types;
pub mod validator;

pub use auth::{AccessPolicy, NETWORK_ID, derive_access_key};
pub use error::{AuthError, ConsensusError};
pub use hashing::{canonical_json, hash_block, hash_canonical, sha256_hex};
pub use pow::{DIFFICULTY_PREFIX, proof_of_work, valid_proof};
pub use types::{
    Block, BlockIndex, BlockPayload, BusinessKey, PeerNode, Proof, SEED_INDEX, SEED_MARKER,
    SEED_PREVIOUS_HASH, SEED_PROOF, Transaction, TransferFee,
};
pub use validator::{is_adoptable, is_sequential, validate_chain};
