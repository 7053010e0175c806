// A transaction moves an amount from one account to another. Accounts are
// hex-encoded Ed25519 public keys, except for the reserved MINING sender
// which marks the reward the miner pays itself.

use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Sender value reserved for mining reward transactions
pub const MINING_SENDER: &str = "MINING";

// Field order is the canonical order used when hashing and signing
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
#[serde(try_from = "TransactionRecord")]
pub struct Transaction {
    sender: String,
    recipient: String,
    amount: f64,
    signature: String, // hex-encoded, empty for rewards
}

// What arrives over the wire before I have checked it
#[derive(Deserialize)]
struct TransactionRecord {
    sender: String,
    recipient: String,
    amount: f64,
    #[serde(default)]
    signature: String,
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = LedgerError;

    fn try_from(record: TransactionRecord) -> Result<Self> {
        Transaction::new(
            &record.sender,
            &record.recipient,
            &record.signature,
            record.amount,
        )
    }
}

impl Transaction {
    pub fn new(sender: &str, recipient: &str, signature: &str, amount: f64) -> Result<Transaction> {
        let tx = Transaction {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount,
            signature: signature.to_string(),
        };
        tx.check_fields()?;
        Ok(tx)
    }

    // The reward is appended after the proof is found, so it never needs a signature
    pub fn new_reward(recipient: &str, amount: f64) -> Result<Transaction> {
        Self::new(MINING_SENDER, recipient, "", amount)
    }

    /// Field-level validation applied at every boundary (constructor, wire, snapshot).
    pub fn check_fields(&self) -> Result<()> {
        if self.sender.is_empty() {
            return Err(LedgerError::Transaction("Sender is missing".to_string()));
        }
        if self.recipient.is_empty() {
            return Err(LedgerError::Transaction("Recipient is missing".to_string()));
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(LedgerError::Transaction(format!(
                "Amount must be a non-negative number, got {}",
                self.amount
            )));
        }
        if !self.signature.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(LedgerError::Transaction(
                "Signature must be hex-encoded".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get_sender(&self) -> &str {
        self.sender.as_str()
    }

    pub fn get_recipient(&self) -> &str {
        self.recipient.as_str()
    }

    pub fn get_amount(&self) -> f64 {
        self.amount
    }

    pub fn get_signature(&self) -> &str {
        self.signature.as_str()
    }

    pub fn is_reward(&self) -> bool {
        self.sender == MINING_SENDER
    }

    pub fn signing_payload(&self) -> Vec<u8> {
        signing_payload(&self.sender, &self.recipient, self.amount)
    }
}

/// The content a sender signs: the three fields' string forms concatenated.
pub fn signing_payload(sender: &str, recipient: &str, amount: f64) -> Vec<u8> {
    format!("{sender}{recipient}{amount}").into_bytes()
}
