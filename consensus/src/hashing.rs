//! Canonical block hashing.
//!
//! Blocks are hashed over a JSON rendering whose object keys are emitted in
//! lexicographic order at every depth, so two blocks that differ only in the
//! order their fields were written (or received) hash identically.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::ConsensusError;
use crate::types::Block;

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hex SHA-256 digest of the canonical form of `block`.
pub fn hash_block(block: &Block) -> Result<String, ConsensusError> {
    hash_canonical(block)
}

/// Hex SHA-256 digest of the canonical JSON form of any serializable value.
pub fn hash_canonical<T: Serialize>(value: &T) -> Result<String, ConsensusError> {
    let value = serde_json::to_value(value)?;
    let canonical = canonical_json(&value)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// Renders `value` as compact JSON with sorted object keys.
pub fn canonical_json(value: &Value) -> Result<String, ConsensusError> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> Result<(), ConsensusError> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(item, out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        leaf => out.push_str(&serde_json::to_string(leaf)?),
    }
    Ok(())
}
