//! Canonical serialization and digests
//!
//! Every node must derive byte-identical input from the same logical block,
//! otherwise chain linkage and proof-of-work checks disagree across peers.
//! Values are converted to a `serde_json::Value` first: its object map is
//! ordered by key, so the rendered JSON has every mapping key-sorted no
//! matter how the source struct declares its fields.

use crate::core::Block;
use crate::error::Result;
use crate::utils::sha256_hex;
use serde::Serialize;

/// Renders `value` as key-sorted JSON.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&value)?)
}

/// SHA-256 of `data` as lowercase hex.
pub fn hash_string_256(data: &[u8]) -> String {
    sha256_hex(data)
}

/// Digest of a block's canonical form. Transactions are embedded through
/// their own canonical form.
pub fn digest(block: &Block) -> Result<String> {
    let canonical = canonical_json(block)?;
    Ok(hash_string_256(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;

    fn sample_block(amount: f64) -> Block {
        let tx = Transaction::new("aa", "bb", "ff", amount).unwrap();
        Block::from_parts(1, "ab".repeat(32), 1_700_000_000_000, vec![tx], 42).unwrap()
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let tx = Transaction::new("s", "r", "ab", 1.5).unwrap();
        assert_eq!(
            canonical_json(&tx).unwrap(),
            r#"{"amount":1.5,"recipient":"r","sender":"s","signature":"ab"}"#
        );
    }

    #[test]
    fn test_digest_is_deterministic() {
        let block = sample_block(5.0);
        assert_eq!(digest(&block).unwrap(), digest(&block.clone()).unwrap());
        assert_eq!(digest(&block).unwrap().len(), 64);
    }

    #[test]
    fn test_digest_changes_with_every_transaction_field() {
        let base = digest(&sample_block(5.0)).unwrap();
        let prev = "ab".repeat(32);

        let variants = [
            Transaction::new("ab", "bb", "ff", 5.0).unwrap(),
            Transaction::new("aa", "bc", "ff", 5.0).unwrap(),
            Transaction::new("aa", "bb", "fe", 5.0).unwrap(),
            Transaction::new("aa", "bb", "ff", 5.5).unwrap(),
        ];
        for tx in variants {
            let block =
                Block::from_parts(1, prev.clone(), 1_700_000_000_000, vec![tx], 42).unwrap();
            assert_ne!(digest(&block).unwrap(), base);
        }
    }

    #[test]
    fn test_digest_changes_with_block_fields() {
        let base = digest(&sample_block(5.0)).unwrap();
        let tx = Transaction::new("aa", "bb", "ff", 5.0).unwrap();
        let other_proof =
            Block::from_parts(1, "ab".repeat(32), 1_700_000_000_000, vec![tx], 43).unwrap();
        assert_ne!(digest(&other_proof).unwrap(), base);
    }

    #[test]
    fn test_digest_survives_wire_round_trip() {
        let block = sample_block(0.1);
        let json = serde_json::to_string(&block).unwrap();
        let restored: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(digest(&restored).unwrap(), digest(&block).unwrap());
    }
}
