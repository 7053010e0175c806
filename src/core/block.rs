use crate::core::{hashing, Transaction};
use crate::error::{LedgerError, Result};
use crate::utils::current_timestamp;
use serde::{Deserialize, Serialize};

/// Proof stored in the genesis block
pub const GENESIS_PROOF: u64 = 100;
/// Timestamp stored in the genesis block
pub const GENESIS_TIMESTAMP: i64 = 0;

const DIGEST_HEX_LEN: usize = 64;

#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
#[serde(try_from = "BlockRecord")]
pub struct Block {
    index: u64,
    previous_hash: String,
    timestamp: i64,
    transactions: Vec<Transaction>, // the mining reward, when present, is last
    proof: u64,
}

#[derive(Deserialize)]
struct BlockRecord {
    index: u64,
    previous_hash: String,
    timestamp: i64,
    transactions: Vec<Transaction>,
    proof: u64,
}

impl TryFrom<BlockRecord> for Block {
    type Error = LedgerError;

    fn try_from(record: BlockRecord) -> Result<Self> {
        Block::from_parts(
            record.index,
            record.previous_hash,
            record.timestamp,
            record.transactions,
            record.proof,
        )
    }
}

impl Block {
    /// Builds the next block stamped with the current time.
    pub fn new(
        index: u64,
        previous_hash: String,
        transactions: Vec<Transaction>,
        proof: u64,
    ) -> Result<Block> {
        Self::from_parts(
            index,
            previous_hash,
            current_timestamp()?,
            transactions,
            proof,
        )
    }

    pub fn from_parts(
        index: u64,
        previous_hash: String,
        timestamp: i64,
        transactions: Vec<Transaction>,
        proof: u64,
    ) -> Result<Block> {
        let block = Block {
            index,
            previous_hash,
            timestamp,
            transactions,
            proof,
        };
        block.check_fields()?;
        Ok(block)
    }

    pub fn genesis() -> Block {
        Block {
            index: 0,
            previous_hash: String::new(),
            timestamp: GENESIS_TIMESTAMP,
            transactions: vec![],
            proof: GENESIS_PROOF,
        }
    }

    /// Structural checks only; linkage and proof belong to verification.
    pub fn check_fields(&self) -> Result<()> {
        if self.index == 0 {
            if !self.previous_hash.is_empty() {
                return Err(LedgerError::InvalidBlock(
                    "Genesis block must not reference a previous hash".to_string(),
                ));
            }
        } else if self.previous_hash.len() != DIGEST_HEX_LEN
            || !self
                .previous_hash
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(LedgerError::InvalidBlock(format!(
                "Block {} has a malformed previous hash",
                self.index
            )));
        }

        for tx in &self.transactions {
            tx.check_fields()?;
        }
        Ok(())
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    /// Transactions the proof was computed over: everything but the trailing reward.
    pub fn proof_transactions(&self) -> &[Transaction] {
        let end = self.transactions.len().saturating_sub(1);
        &self.transactions[..end]
    }

    pub fn get_proof(&self) -> u64 {
        self.proof
    }

    pub fn digest(&self) -> Result<String> {
        hashing::digest(self)
    }
}
