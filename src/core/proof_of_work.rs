use crate::core::hashing::{canonical_json, hash_string_256};
use crate::core::Transaction;
use crate::error::{LedgerError, Result};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};

/// Leading zero hex characters used when nothing else is configured
pub const DEFAULT_DIFFICULTY: usize = 2;

const MAX_DIFFICULTY: usize = 64; // a SHA-256 hex digest has 64 characters

/// How many leading `0` hex characters a proof hash must start with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Difficulty(usize);

impl Difficulty {
    pub fn new(leading_zeros: usize) -> Result<Difficulty> {
        if leading_zeros == 0 || leading_zeros > MAX_DIFFICULTY {
            return Err(LedgerError::Config(format!(
                "Difficulty must be between 1 and {MAX_DIFFICULTY}, got {leading_zeros}"
            )));
        }
        Ok(Difficulty(leading_zeros))
    }

    pub fn leading_zeros(&self) -> usize {
        self.0
    }

    pub fn is_met_by(&self, hex_digest: &str) -> bool {
        hex_digest.len() >= self.0 && hex_digest.bytes().take(self.0).all(|b| b == b'0')
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty(DEFAULT_DIFFICULTY)
    }
}

/// Proof-of-work over a transaction set and the hash it builds on.
///
/// The guess is `canonical(transactions) ++ previous_hash ++ proof`. The prefix
/// never changes during a search so it is rendered once up front.
pub struct ProofOfWork {
    prefix: String,
    difficulty: Difficulty,
}

impl ProofOfWork {
    pub fn new(
        transactions: &[Transaction],
        previous_hash: &str,
        difficulty: Difficulty,
    ) -> Result<ProofOfWork> {
        let mut prefix = canonical_json(transactions)?;
        prefix.push_str(previous_hash);
        Ok(ProofOfWork { prefix, difficulty })
    }

    fn guess_hash(&self, proof: u64) -> String {
        let guess = format!("{}{}", self.prefix, proof);
        hash_string_256(guess.as_bytes())
    }

    pub fn validate(&self, proof: u64) -> bool {
        self.difficulty.is_met_by(&self.guess_hash(proof))
    }

    /// Counts up from zero until a proof satisfies the difficulty. Returns
    /// `None` if `cancel` is raised first; nothing is written anywhere either way.
    pub fn run(&self, cancel: &AtomicBool) -> Option<u64> {
        info!(
            "Searching for proof with difficulty {}",
            self.difficulty.leading_zeros()
        );
        let mut proof: u64 = 0;
        loop {
            if cancel.load(Ordering::Relaxed) {
                info!("Proof search cancelled after {proof} attempts");
                return None;
            }
            if self.validate(proof) {
                debug!("Found proof {proof}: {}", self.guess_hash(proof));
                return Some(proof);
            }
            proof = proof.checked_add(1)?;
        }
    }
}
