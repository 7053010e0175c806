// The ledger is the single writer over a node's chain and mempool.
//
// Mutations (add_transaction, mine, add_block, resolve) are serialized behind
// `write_gate`. Reads never take the gate: they copy out of `state` under its
// read lock, so balance and chain queries keep answering while a proof search
// runs. The proof search itself holds the gate but not the state lock, and it
// only touches shared state once a proof has been found.

use crate::core::{Block, Difficulty, ProofOfWork, Transaction, Verification};
use crate::error::{LedgerError, Result};
use crate::network::{fan_out, PeerClient, PeerDirectory};
use crate::storage::{MemoryPool, Snapshot, SnapshotStore};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;

/// Amount paid to the miner of each block when nothing else is configured
pub const DEFAULT_MINING_REWARD: f64 = 10.0;

/// How a node answered a block broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReceipt {
    /// The block extended the receiver's chain
    Accepted,
    /// The block was the next index but failed proof or linkage checks
    Rejected,
    /// The block is further ahead than the receiver; it will resolve
    Ahead,
    /// The receiver's chain is already at or past this index
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerSettings {
    pub difficulty: Difficulty,
    pub mining_reward: f64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            difficulty: Difficulty::default(),
            mining_reward: DEFAULT_MINING_REWARD,
        }
    }
}

struct ChainState {
    chain: Vec<Block>,
    mempool: MemoryPool,
}

impl ChainState {
    // Confirmed credits minus confirmed debits minus pending debits
    fn balance_of(&self, participant: &str) -> f64 {
        let mut received = 0.0;
        let mut sent = 0.0;
        for tx in self.chain.iter().flat_map(|block| block.get_transactions()) {
            if tx.get_recipient() == participant {
                received += tx.get_amount();
            }
            if tx.get_sender() == participant {
                sent += tx.get_amount();
            }
        }
        received - sent - self.mempool.pending_debits(participant)
    }

    fn last_block(&self) -> Result<&Block> {
        self.chain
            .last()
            .ok_or_else(|| LedgerError::InvalidBlock("Chain is empty".to_string()))
    }
}

pub struct Ledger {
    node_id: String,
    public_key: RwLock<Option<String>>,
    settings: LedgerSettings,
    verification: Verification,
    state: RwLock<ChainState>,
    write_gate: Mutex<()>,
    persist_lock: Mutex<()>,
    peers: PeerDirectory,
    resolve_conflicts: AtomicBool,
    cancel_mining: AtomicBool,
    store: Box<dyn SnapshotStore>,
    client: Arc<dyn PeerClient>,
}

impl Ledger {
    /// Builds the ledger from whatever `store` holds. A missing or unusable
    /// snapshot is not an error: the node starts from the genesis block.
    pub fn new(
        node_id: &str,
        settings: LedgerSettings,
        store: Box<dyn SnapshotStore>,
        client: Arc<dyn PeerClient>,
    ) -> Ledger {
        let verification = Verification::new(settings.difficulty);
        let restored = restore_snapshot(store.as_ref(), &verification);

        let peers = PeerDirectory::new();
        for peer in &restored.peers {
            if let Err(e) = peers.add(peer) {
                warn!("Skipping stored peer: {e}");
            }
        }

        info!(
            "Node {node_id} starts with {} block(s), {} pending transaction(s), {} peer(s)",
            restored.chain.len(),
            restored.mempool.len(),
            peers.len()
        );

        Ledger {
            node_id: node_id.to_string(),
            public_key: RwLock::new(None),
            settings,
            verification,
            state: RwLock::new(ChainState {
                chain: restored.chain,
                mempool: MemoryPool::from_transactions(restored.mempool),
            }),
            write_gate: Mutex::new(()),
            persist_lock: Mutex::new(()),
            peers,
            resolve_conflicts: AtomicBool::new(false),
            cancel_mining: AtomicBool::new(false),
            store,
            client,
        }
    }

    pub fn get_node_id(&self) -> &str {
        self.node_id.as_str()
    }

    pub fn get_settings(&self) -> LedgerSettings {
        self.settings
    }

    pub fn get_verification(&self) -> &Verification {
        &self.verification
    }

    /// Installs (or clears) the account this node mines for.
    pub fn set_public_key(&self, public_key: Option<String>) -> Result<()> {
        let mut key = self
            .public_key
            .write()
            .map_err(|e| LedgerError::Wallet(format!("Failed to acquire identity lock: {e}")))?;
        *key = public_key;
        Ok(())
    }

    pub fn get_public_key(&self) -> Option<String> {
        self.public_key.read().ok().and_then(|key| key.clone())
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, ChainState>> {
        self.state
            .read()
            .map_err(|e| LedgerError::Database(format!("Failed to acquire chain lock: {e}")))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, ChainState>> {
        self.state
            .write()
            .map_err(|e| LedgerError::Database(format!("Failed to acquire chain lock: {e}")))
    }

    fn lock_gate(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_gate
            .lock()
            .map_err(|e| LedgerError::Database(format!("Failed to acquire write gate: {e}")))
    }

    /// Copy of the full chain.
    pub fn get_chain(&self) -> Result<Vec<Block>> {
        Ok(self.read_state()?.chain.clone())
    }

    pub fn get_last_block(&self) -> Result<Block> {
        Ok(self.read_state()?.last_block()?.clone())
    }

    pub fn get_chain_len(&self) -> Result<usize> {
        Ok(self.read_state()?.chain.len())
    }

    /// Copy of the mempool in insertion order.
    pub fn get_open_transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.read_state()?.mempool.get_all())
    }

    /// Confirmed credits minus confirmed and pending debits. Pending credits
    /// only count once they are mined.
    pub fn get_balance(&self, participant: &str) -> Result<f64> {
        Ok(self.read_state()?.balance_of(participant))
    }

    pub fn is_conflicted(&self) -> bool {
        self.resolve_conflicts.load(Ordering::SeqCst)
    }

    /// Raises the sticky conflict flag. Mining is refused until `resolve` runs,
    /// and a proof search in flight is abandoned.
    pub fn flag_conflicts(&self) {
        if !self.resolve_conflicts.swap(true, Ordering::SeqCst) {
            warn!("Node {} flagged conflicts, resolve before mining", self.node_id);
        }
        self.cancel_mining();
    }

    /// Asks an in-flight proof search to give up. It returns no block and
    /// leaves chain and mempool untouched.
    pub fn cancel_mining(&self) {
        self.cancel_mining.store(true, Ordering::SeqCst);
    }

    /// Admits a signed transaction into the mempool once the sender can cover
    /// it (pending debits included) and the signature holds.
    ///
    /// `is_receiving` marks a transaction that arrived as a peer broadcast;
    /// only locally originated transactions are broadcast onwards.
    pub fn add_transaction(
        &self,
        sender: &str,
        recipient: &str,
        signature: &str,
        amount: f64,
        is_receiving: bool,
    ) -> Result<Transaction> {
        let tx = Transaction::new(sender, recipient, signature, amount)?;
        if tx.is_reward() {
            return Err(LedgerError::Transaction(
                "Reward transactions are created by the miner only".to_string(),
            ));
        }

        let _gate = self.lock_gate()?;
        {
            let mut state = self.write_state()?;
            let available = state.balance_of(sender);
            if !self
                .verification
                .verify_transaction(&tx, |_| available, true)
            {
                if available < amount {
                    return Err(LedgerError::InsufficientFunds {
                        required: amount,
                        available,
                    });
                }
                return Err(LedgerError::Transaction(
                    "Signature does not match the sender".to_string(),
                ));
            }
            state.mempool.add(tx.clone());
        }
        info!("Added transaction of {amount} from {sender} to {recipient}");
        self.persist();

        if !is_receiving {
            self.broadcast_transaction(&tx);
        }
        Ok(tx)
    }

    /// Mines the mempool into a new block paying the reward to this node's
    /// account, appends it and broadcasts it. Fails without touching state
    /// when no identity is configured, conflicts are pending, the search is
    /// cancelled or a pending signature no longer verifies.
    pub fn mine(&self) -> Result<Block> {
        let miner = self.get_public_key().ok_or_else(|| {
            LedgerError::Wallet("No wallet configured, cannot mine".to_string())
        })?;

        let block = {
            let _gate = self.lock_gate()?;
            // Reset before the check: a flag raised after it still cancels the search
            self.cancel_mining.store(false, Ordering::SeqCst);
            if self.is_conflicted() {
                return Err(LedgerError::ConflictsPending);
            }

            let (last_block, mut open_transactions) = {
                let state = self.read_state()?;
                (state.last_block()?.clone(), state.mempool.get_all())
            };
            let previous_hash = last_block.digest()?;

            let pow = ProofOfWork::new(
                &open_transactions,
                &previous_hash,
                self.verification.get_difficulty(),
            )?;
            let proof = pow
                .run(&self.cancel_mining)
                .ok_or_else(|| LedgerError::Mining("Proof search was cancelled".to_string()))?;

            // Checked against the copy so a failure leaves the live mempool as it was
            if !self
                .verification
                .verify_transactions(&open_transactions, |participant| {
                    self.get_balance(participant).unwrap_or(0.0)
                })
            {
                warn!("A pending transaction has an invalid signature, block not mined");
                return Err(LedgerError::Transaction(
                    "Pending transactions contain an invalid signature".to_string(),
                ));
            }

            open_transactions.push(Transaction::new_reward(
                &miner,
                self.settings.mining_reward,
            )?);
            let block = Block::new(
                last_block.get_index() + 1,
                previous_hash,
                open_transactions,
                proof,
            )?;

            self.commit_mined_block(&block)?;
            info!(
                "Node {} mined block {} with proof {}",
                self.node_id,
                block.get_index(),
                block.get_proof()
            );
            self.persist();
            block
        };

        self.broadcast_block(&block);
        Ok(block)
    }

    /// Appends a freshly mined block and empties the mempool, unless conflicts
    /// were flagged while the proof was being searched.
    fn commit_mined_block(&self, block: &Block) -> Result<()> {
        let mut state = self.write_state()?;
        if self.is_conflicted() {
            warn!(
                "Node {} discarded mined block {}, conflicts are pending",
                self.node_id,
                block.get_index()
            );
            return Err(LedgerError::ConflictsPending);
        }
        state.chain.push(block.clone());
        state.mempool.clear();
        Ok(())
    }

    /// Appends a block mined elsewhere. The proof must hold over its
    /// transactions minus the trailing reward, and it must link to the local
    /// tip. Mempool entries it confirms are dropped.
    pub fn add_block(&self, block: Block) -> Result<()> {
        let _gate = self.lock_gate()?;
        {
            let mut state = self.write_state()?;
            let last_block = state.last_block()?;

            if block.get_index() != last_block.get_index() + 1 {
                return Err(LedgerError::InvalidBlock(format!(
                    "Expected index {}, got {}",
                    last_block.get_index() + 1,
                    block.get_index()
                )));
            }
            if !self.verification.valid_proof(
                block.proof_transactions(),
                block.get_previous_hash(),
                block.get_proof(),
            ) {
                return Err(LedgerError::InvalidBlock(format!(
                    "Block {} has an invalid proof",
                    block.get_index()
                )));
            }
            if block.get_previous_hash() != last_block.digest()? {
                return Err(LedgerError::InvalidBlock(format!(
                    "Block {} does not extend the local chain",
                    block.get_index()
                )));
            }

            for tx in block.get_transactions() {
                state.mempool.remove_matching(tx);
            }
            info!("Node {} accepted block {}", self.node_id, block.get_index());
            state.chain.push(block);
        }
        self.persist();
        Ok(())
    }

    /// Entry point for blocks broadcast by peers. The next index goes through
    /// `add_block`; a block further ahead means this node is behind, so it
    /// flags conflicts instead of rejecting.
    pub fn receive_broadcast_block(&self, block: Block) -> Result<BlockReceipt> {
        let tip = self.get_last_block()?.get_index();
        let index = block.get_index();

        if index == tip + 1 {
            // A competing block for the height being mined makes the local search pointless
            self.cancel_mining();
            match self.add_block(block) {
                Ok(()) => Ok(BlockReceipt::Accepted),
                Err(e) => {
                    warn!("Rejected broadcast block {index}: {e}");
                    Ok(BlockReceipt::Rejected)
                }
            }
        } else if index > tip + 1 {
            info!("Received block {index} while at {tip}, local chain is behind");
            self.flag_conflicts();
            Ok(BlockReceipt::Ahead)
        } else {
            info!("Ignoring stale block {index}, local tip is {tip}");
            Ok(BlockReceipt::Stale)
        }
    }

    /// Polls every peer and adopts the longest chain that is strictly longer
    /// than the local one and fully valid. On replacement the mempool is
    /// discarded. The conflict flag is cleared either way.
    pub fn resolve(&self) -> Result<bool> {
        self.cancel_mining();
        let _gate = self.lock_gate()?;

        let peers = self.peers.list()?;
        let mut winner_len = self.get_chain_len()?;
        let client = &self.client;
        let fetched = fan_out(&peers, |peer| client.fetch_chain(peer));

        let mut winner: Option<(String, Vec<Block>)> = None;
        for (peer, outcome) in fetched {
            let chain = match outcome {
                Ok(chain) => chain,
                Err(e) => {
                    warn!("Could not fetch chain from {peer}: {e}");
                    continue;
                }
            };
            if chain.len() <= winner_len {
                continue;
            }
            if !self.is_valid_foreign_chain(&chain) {
                warn!(
                    "Peer {peer} offered {} blocks that fail verification",
                    chain.len()
                );
                continue;
            }
            winner_len = chain.len();
            winner = Some((peer, chain));
        }

        let replaced = match winner {
            Some((peer, chain)) => {
                let mut state = self.write_state()?;
                state.chain = chain;
                state.mempool.clear();
                info!(
                    "Node {} replaced its chain with {winner_len} blocks from {peer}",
                    self.node_id
                );
                true
            }
            None => {
                info!("Node {} kept its chain, no longer valid chain found", self.node_id);
                false
            }
        };

        self.resolve_conflicts.store(false, Ordering::SeqCst);
        self.persist();
        Ok(replaced)
    }

    fn is_valid_foreign_chain(&self, chain: &[Block]) -> bool {
        chain.first() == Some(&Block::genesis()) && self.verification.verify_chain(chain)
    }

    /// Returns `false` when the peer was already known.
    pub fn add_peer(&self, addr: &str) -> Result<bool> {
        let added = self.peers.add(addr)?;
        if added {
            self.persist();
        }
        Ok(added)
    }

    /// Returns `false` when the peer was not known.
    pub fn remove_peer(&self, addr: &str) -> Result<bool> {
        let removed = self.peers.remove(addr)?;
        if removed {
            self.persist();
        }
        Ok(removed)
    }

    pub fn get_peers(&self) -> Result<Vec<String>> {
        self.peers.list()
    }

    /// Consistent copy of chain, mempool and peer set.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let (chain, mempool) = {
            let state = self.read_state()?;
            (state.chain.clone(), state.mempool.get_all())
        };
        Ok(Snapshot {
            chain,
            mempool,
            peers: self.peers.list()?,
        })
    }

    // Failures are logged; the in-memory state stays authoritative
    fn persist(&self) -> bool {
        let result = self
            .persist_lock
            .lock()
            .map_err(|e| LedgerError::Database(format!("Failed to acquire persist lock: {e}")))
            .and_then(|_guard| {
                let snapshot = self.snapshot()?;
                self.store.save(&snapshot)
            });

        match result {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to persist snapshot for node {}: {e}", self.node_id);
                false
            }
        }
    }

    fn broadcast_transaction(&self, tx: &Transaction) {
        let peers = match self.peers.list() {
            Ok(peers) if !peers.is_empty() => peers,
            Ok(_) => return,
            Err(e) => {
                warn!("Skipping transaction broadcast: {e}");
                return;
            }
        };

        let client = Arc::clone(&self.client);
        let tx = tx.clone();
        thread::spawn(move || {
            for (peer, outcome) in fan_out(&peers, |peer| client.send_transaction(peer, &tx)) {
                if let Err(e) = outcome {
                    warn!("Failed to broadcast transaction to {peer}: {e}");
                }
            }
        });
    }

    fn broadcast_block(&self, block: &Block) {
        let peers = match self.peers.list() {
            Ok(peers) => peers,
            Err(e) => {
                warn!("Skipping block broadcast: {e}");
                return;
            }
        };

        let client = &self.client;
        for (peer, outcome) in fan_out(&peers, |peer| client.send_block(peer, block)) {
            match outcome {
                Ok(BlockReceipt::Accepted) | Ok(BlockReceipt::Ahead) => {}
                Ok(receipt) => {
                    warn!(
                        "Peer {peer} answered {receipt:?} to block {}",
                        block.get_index()
                    );
                    self.flag_conflicts();
                }
                Err(e) => warn!("Failed to broadcast block to {peer}: {e}"),
            }
        }
    }
}

fn genesis_snapshot(peers: Vec<String>) -> Snapshot {
    Snapshot {
        chain: vec![Block::genesis()],
        mempool: vec![],
        peers,
    }
}

fn restore_snapshot(store: &dyn SnapshotStore, verification: &Verification) -> Snapshot {
    let snapshot = match store.load() {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            info!("No snapshot found, starting from genesis");
            return genesis_snapshot(vec![]);
        }
        Err(e) => {
            error!("Failed to load snapshot, starting from genesis: {e}");
            return genesis_snapshot(vec![]);
        }
    };

    match check_snapshot(&snapshot, verification) {
        Ok(()) => snapshot,
        Err(e) => {
            error!("Stored snapshot is unusable, starting from genesis: {e}");
            genesis_snapshot(snapshot.peers)
        }
    }
}

// bincode decoding bypasses the serde boundary checks, so redo them here
fn check_snapshot(snapshot: &Snapshot, verification: &Verification) -> Result<()> {
    if snapshot.chain.first() != Some(&Block::genesis()) {
        return Err(LedgerError::InvalidBlock(
            "Stored chain does not start with the genesis block".to_string(),
        ));
    }
    for block in &snapshot.chain {
        block.check_fields()?;
    }
    if !verification.verify_chain(&snapshot.chain) {
        return Err(LedgerError::InvalidBlock(
            "Stored chain fails verification".to_string(),
        ));
    }
    for tx in &snapshot.mempool {
        tx.check_fields()?;
        if tx.is_reward() {
            return Err(LedgerError::Transaction(
                "Stored mempool holds a reward transaction".to_string(),
            ));
        }
    }
    Ok(())
}
