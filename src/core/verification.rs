use crate::core::{Block, Difficulty, ProofOfWork, Transaction};
use crate::wallet::verify_transaction;
use log::warn;

/// Stateless validity checks shared by the miner, block acceptance and
/// fork resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct Verification {
    difficulty: Difficulty,
}

impl Verification {
    pub fn new(difficulty: Difficulty) -> Verification {
        Verification { difficulty }
    }

    pub fn get_difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Whether `proof` makes the hash of (transactions, previous hash, proof)
    /// meet the difficulty.
    pub fn valid_proof(
        &self,
        transactions: &[Transaction],
        previous_hash: &str,
        proof: u64,
    ) -> bool {
        match ProofOfWork::new(transactions, previous_hash, self.difficulty) {
            Ok(pow) => pow.validate(proof),
            Err(e) => {
                warn!("Could not build proof guess: {e}");
                false
            }
        }
    }

    /// Checks linkage and proof for every block after genesis, excluding each
    /// block's trailing reward from the proof check. Stops at the first violation.
    pub fn verify_chain(&self, chain: &[Block]) -> bool {
        if chain.is_empty() {
            return false;
        }

        for window in chain.windows(2) {
            let (previous, block) = (&window[0], &window[1]);
            let previous_digest = match previous.digest() {
                Ok(digest) => digest,
                Err(_) => return false,
            };
            if block.get_previous_hash() != previous_digest {
                warn!("Block {} does not link to its predecessor", block.get_index());
                return false;
            }
            if !self.valid_proof(
                block.proof_transactions(),
                block.get_previous_hash(),
                block.get_proof(),
            ) {
                warn!("Proof of work is invalid for block {}", block.get_index());
                return false;
            }
        }
        true
    }

    /// With `check_funds`, the sender must be able to cover the amount and the
    /// signature must hold; without it only the signature is checked. Reward
    /// transactions carry no signature and pass.
    pub fn verify_transaction<F>(&self, tx: &Transaction, get_balance: F, check_funds: bool) -> bool
    where
        F: Fn(&str) -> f64,
    {
        if tx.is_reward() {
            return true;
        }
        if check_funds {
            let sender_balance = get_balance(tx.get_sender());
            sender_balance >= tx.get_amount() && verify_transaction(tx)
        } else {
            verify_transaction(tx)
        }
    }

    /// Signature-only check over a whole pending set.
    pub fn verify_transactions<F>(&self, open_transactions: &[Transaction], get_balance: F) -> bool
    where
        F: Fn(&str) -> f64,
    {
        open_transactions
            .iter()
            .all(|tx| self.verify_transaction(tx, &get_balance, false))
    }
}
