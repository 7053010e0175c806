// Durable copy of a node's state: the chain, the mempool and the peer set.
// The in-memory ledger stays authoritative; this is what a restart reads back.

use crate::core::{Block, Transaction};
use crate::error::{LedgerError, Result};
use crate::utils::{deserialize, serialize};
use log::info;
use sled::Db;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

const SNAPSHOT_TREE: &str = "snapshot";
const CHAIN_KEY: &str = "chain";
const MEMPOOL_KEY: &str = "mempool";
const PEERS_KEY: &str = "peers";

#[derive(Debug, Clone, PartialEq, Default, bincode::Encode, bincode::Decode)]
pub struct Snapshot {
    pub chain: Vec<Block>,
    pub mempool: Vec<Transaction>,
    pub peers: Vec<String>,
}

/// Backend for node snapshots.
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` means no snapshot was ever written.
    fn load(&self) -> Result<Option<Snapshot>>;
    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Sled-backed store, one database per node.
pub struct SledSnapshotStore {
    db: Db,
    db_path: PathBuf,
}

impl SledSnapshotStore {
    // ./data/node_5000/ keeps several nodes on one machine apart
    pub fn open_for_node(data_dir: &Path, node_id: &str) -> Result<SledSnapshotStore> {
        Self::open(&data_dir.join(format!("node_{node_id}")))
    }

    pub fn open(path: &Path) -> Result<SledSnapshotStore> {
        let db = sled::open(path)
            .map_err(|e| LedgerError::Database(format!("Failed to open database: {e}")))?;
        info!("Opened snapshot database at {}", path.display());
        Ok(SledSnapshotStore {
            db,
            db_path: path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        self.db_path.as_path()
    }
}

impl SnapshotStore for SledSnapshotStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        let tree = self
            .db
            .open_tree(SNAPSHOT_TREE)
            .map_err(|e| LedgerError::Database(format!("Failed to open snapshot tree: {e}")))?;

        let chain_bytes = match tree.get(CHAIN_KEY)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let mempool_bytes = tree
            .get(MEMPOOL_KEY)?
            .ok_or_else(|| LedgerError::Database("Snapshot is missing the mempool".to_string()))?;
        let peers_bytes = tree
            .get(PEERS_KEY)?
            .ok_or_else(|| LedgerError::Database("Snapshot is missing the peer set".to_string()))?;

        Ok(Some(Snapshot {
            chain: deserialize(chain_bytes.as_ref())?,
            mempool: deserialize(mempool_bytes.as_ref())?,
            peers: deserialize(peers_bytes.as_ref())?,
        }))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let tree = self
            .db
            .open_tree(SNAPSHOT_TREE)
            .map_err(|e| LedgerError::Database(format!("Failed to open snapshot tree: {e}")))?;

        let chain_bytes = serialize(&snapshot.chain)?;
        let mempool_bytes = serialize(&snapshot.mempool)?;
        let peers_bytes = serialize(&snapshot.peers)?;

        tree.transaction(|tx_db| {
            tx_db.insert(CHAIN_KEY, chain_bytes.as_slice())?;
            tx_db.insert(MEMPOOL_KEY, mempool_bytes.as_slice())?;
            tx_db.insert(PEERS_KEY, peers_bytes.as_slice())?;
            Ok(())
        })
        .map_err(|e: sled::transaction::TransactionError| {
            LedgerError::Database(format!("Failed to write snapshot: {e}"))
        })?;
        tree.flush()?;
        Ok(())
    }
}

/// Volatile store for tests and throwaway nodes.
#[derive(Default)]
pub struct MemorySnapshotStore {
    inner: RwLock<Option<Snapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> MemorySnapshotStore {
        MemorySnapshotStore::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> MemorySnapshotStore {
        MemorySnapshotStore {
            inner: RwLock::new(Some(snapshot)),
        }
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| LedgerError::Database("Snapshot lock poisoned".to_string()))?;
        Ok(inner.clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| LedgerError::Database("Snapshot lock poisoned".to_string()))?;
        *inner = Some(snapshot.clone());
        Ok(())
    }
}
