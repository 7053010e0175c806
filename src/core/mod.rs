//! Core ledger functionality
//!
//! This module contains the fundamental ledger components including
//! blocks, transactions, canonical hashing, proof-of-work, verification
//! and the chain manager that ties them together.

pub mod block;
pub mod hashing;
pub mod ledger;
pub mod proof_of_work;
pub mod transaction;
pub mod verification;

pub use block::{Block, GENESIS_PROOF, GENESIS_TIMESTAMP};
pub use ledger::{BlockReceipt, Ledger, LedgerSettings, DEFAULT_MINING_REWARD};
pub use proof_of_work::{Difficulty, ProofOfWork, DEFAULT_DIFFICULTY};
pub use transaction::{Transaction, MINING_SENDER};
pub use verification::Verification;
