//! Test utilities for ledger testing

use crate::core::{
    Block, BlockReceipt, Ledger, LedgerSettings, ProofOfWork, Transaction, Verification,
};
use crate::error::{LedgerError, Result};
use crate::network::PeerClient;
use crate::storage::MemorySnapshotStore;
use crate::wallet::Wallet;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Ledger with an in-memory snapshot store and default settings
pub fn memory_ledger(node_id: &str, client: Arc<dyn PeerClient>) -> Ledger {
    Ledger::new(
        node_id,
        LedgerSettings::default(),
        Box::new(MemorySnapshotStore::new()),
        client,
    )
}

/// Ledger whose mining identity is a fresh wallet
pub fn ledger_with_wallet(node_id: &str, client: Arc<dyn PeerClient>) -> (Ledger, Wallet) {
    let ledger = memory_ledger(node_id, client);
    let wallet = Wallet::new().unwrap();
    ledger.set_public_key(Some(wallet.get_public_key())).unwrap();
    (ledger, wallet)
}

/// Returns (sender, signature) for a transfer from `wallet`
pub fn sign(wallet: &Wallet, recipient: &str, amount: f64) -> (String, String) {
    let sender = wallet.get_public_key();
    let signature = wallet.sign_transaction(&sender, recipient, amount).unwrap();
    (sender, signature)
}

/// Valid chain of `len` blocks (genesis included), every block paying `miner`
pub fn build_chain(len: usize, miner: &str) -> Vec<Block> {
    let verification = Verification::default();
    let mut chain = vec![Block::genesis()];
    while chain.len() < len {
        let last = chain.last().unwrap();
        let previous_hash = last.digest().unwrap();
        let proof = ProofOfWork::new(&[], &previous_hash, verification.get_difficulty())
            .unwrap()
            .run(&AtomicBool::new(false))
            .unwrap();
        let reward = Transaction::new_reward(miner, 10.0).unwrap();
        let block = Block::new(last.get_index() + 1, previous_hash, vec![reward], proof).unwrap();
        chain.push(block);
    }
    chain
}

/// Copy of `chain` whose last block carries a proof that fails the difficulty
pub fn tamper_last_proof(chain: &[Block]) -> Vec<Block> {
    let verification = Verification::default();
    let mut tampered = chain.to_vec();
    let last = tampered.pop().unwrap();
    let bad_proof = (last.get_proof() + 1..)
        .find(|proof| {
            !verification.valid_proof(last.proof_transactions(), last.get_previous_hash(), *proof)
        })
        .unwrap();
    let forged = Block::from_parts(
        last.get_index(),
        last.get_previous_hash().to_string(),
        last.get_timestamp(),
        last.get_transactions().to_vec(),
        bad_proof,
    )
    .unwrap();
    tampered.push(forged);
    tampered
}

/// Polls `condition` until it holds or a few seconds pass
pub fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// Peers with canned answers. A peer is reachable once it has been made
/// reachable or given a chain; everything sent to it is recorded.
pub struct ScriptedPeers {
    reachable: RwLock<HashSet<String>>,
    chains: RwLock<HashMap<String, Vec<Block>>>,
    receipt: RwLock<BlockReceipt>,
    sent_blocks: Mutex<Vec<(String, Block)>>,
    sent_transactions: Mutex<Vec<(String, Transaction)>>,
}

impl ScriptedPeers {
    pub fn new() -> Arc<ScriptedPeers> {
        Arc::new(ScriptedPeers {
            reachable: RwLock::new(HashSet::new()),
            chains: RwLock::new(HashMap::new()),
            receipt: RwLock::new(BlockReceipt::Accepted),
            sent_blocks: Mutex::new(vec![]),
            sent_transactions: Mutex::new(vec![]),
        })
    }

    pub fn add_reachable(&self, peer: &str) {
        self.reachable.write().unwrap().insert(peer.to_string());
    }

    pub fn set_chain(&self, peer: &str, chain: Vec<Block>) {
        self.add_reachable(peer);
        self.chains.write().unwrap().insert(peer.to_string(), chain);
    }

    pub fn set_receipt(&self, receipt: BlockReceipt) {
        *self.receipt.write().unwrap() = receipt;
    }

    pub fn get_sent_blocks(&self) -> Vec<(String, Block)> {
        self.sent_blocks.lock().unwrap().clone()
    }

    pub fn get_sent_transactions(&self) -> Vec<(String, Transaction)> {
        self.sent_transactions.lock().unwrap().clone()
    }

    fn check_reachable(&self, peer: &str) -> Result<()> {
        if self.reachable.read().unwrap().contains(peer) {
            Ok(())
        } else {
            Err(LedgerError::Network(format!("Peer {peer} is unreachable")))
        }
    }
}

impl PeerClient for ScriptedPeers {
    fn send_transaction(&self, peer: &str, transaction: &Transaction) -> Result<()> {
        self.check_reachable(peer)?;
        self.sent_transactions
            .lock()
            .unwrap()
            .push((peer.to_string(), transaction.clone()));
        Ok(())
    }

    fn send_block(&self, peer: &str, block: &Block) -> Result<BlockReceipt> {
        self.check_reachable(peer)?;
        self.sent_blocks
            .lock()
            .unwrap()
            .push((peer.to_string(), block.clone()));
        Ok(*self.receipt.read().unwrap())
    }

    fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>> {
        self.check_reachable(peer)?;
        Ok(self
            .chains
            .read()
            .unwrap()
            .get(peer)
            .cloned()
            .unwrap_or_else(|| vec![Block::genesis()]))
    }
}

/// Several ledgers in one process, addressed by name. Holds weak references
/// so the ledgers can own the network without a reference cycle.
pub struct LocalNetwork {
    nodes: RwLock<HashMap<String, Weak<Ledger>>>,
}

impl LocalNetwork {
    pub fn new() -> Arc<LocalNetwork> {
        Arc::new(LocalNetwork {
            nodes: RwLock::new(HashMap::new()),
        })
    }

    pub fn register(&self, addr: &str, ledger: &Arc<Ledger>) {
        self.nodes
            .write()
            .unwrap()
            .insert(addr.to_string(), Arc::downgrade(ledger));
    }

    fn node(&self, peer: &str) -> Result<Arc<Ledger>> {
        self.nodes
            .read()
            .unwrap()
            .get(peer)
            .and_then(Weak::upgrade)
            .ok_or_else(|| LedgerError::Network(format!("Peer {peer} is unreachable")))
    }
}

impl PeerClient for LocalNetwork {
    fn send_transaction(&self, peer: &str, transaction: &Transaction) -> Result<()> {
        self.node(peer)?
            .add_transaction(
                transaction.get_sender(),
                transaction.get_recipient(),
                transaction.get_signature(),
                transaction.get_amount(),
                true,
            )
            .map(|_| ())
    }

    fn send_block(&self, peer: &str, block: &Block) -> Result<BlockReceipt> {
        self.node(peer)?.receive_broadcast_block(block.clone())
    }

    fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>> {
        self.node(peer)?.get_chain()
    }
}

/// Nodes named "node-0", "node-1", ... on one `LocalNetwork`, each peered
/// with all the others and mining for its own wallet.
pub fn local_network(size: usize) -> (Arc<LocalNetwork>, Vec<(Arc<Ledger>, Wallet)>) {
    let network = LocalNetwork::new();
    let names: Vec<String> = (0..size).map(|i| format!("node-{i}:{}", 5000 + i)).collect();

    let nodes: Vec<(Arc<Ledger>, Wallet)> = names
        .iter()
        .map(|name| {
            let client: Arc<dyn PeerClient> = network.clone();
            let (ledger, wallet) = ledger_with_wallet(name, client);
            let ledger = Arc::new(ledger);
            network.register(name, &ledger);
            (ledger, wallet)
        })
        .collect();

    for (ledger, _) in &nodes {
        for name in &names {
            if name != ledger.get_node_id() {
                ledger.add_peer(name).unwrap();
            }
        }
    }
    (network, nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_chain_is_valid_and_tamper_breaks_it() {
        let verification = Verification::default();
        let chain = build_chain(3, "miner");
        assert_eq!(chain.len(), 3);
        assert!(verification.verify_chain(&chain));
        assert!(!verification.verify_chain(&tamper_last_proof(&chain)));
    }

    #[test]
    fn test_local_network_propagates_mined_blocks() {
        let (_network, nodes) = local_network(3);
        let (miner, _) = &nodes[0];

        miner.mine().unwrap();
        for (ledger, _) in &nodes {
            assert_eq!(ledger.get_chain().unwrap(), miner.get_chain().unwrap());
        }
    }

    #[test]
    fn test_local_network_propagates_transactions() {
        let (_network, nodes) = local_network(2);
        let (node_a, wallet) = &nodes[0];
        let (node_b, _) = &nodes[1];
        node_a.mine().unwrap();

        let (sender, signature) = sign(wallet, "bob", 2.0);
        node_a
            .add_transaction(&sender, "bob", &signature, 2.0, false)
            .unwrap();

        assert!(wait_until(|| node_b.get_open_transactions().unwrap().len() == 1));
        // Node B never re-broadcasts, so A still holds exactly one copy
        assert_eq!(node_a.get_open_transactions().unwrap().len(), 1);
    }
}
