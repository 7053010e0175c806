//! # pow-ledger
//!
//! A replicated, append-only ledger of signed value transfers. Blocks are
//! linked by digest, admitted by proof-of-work, and nodes that disagree
//! converge on the longest chain that fully verifies.
//!
//! ## Layout
//! - `core/`: blocks, transactions, canonical hashing, proof-of-work,
//!   verification and the `Ledger` that owns a node's chain and mempool
//! - `wallet/`: Ed25519 key pairs, transaction signing, the key file
//! - `network/`: peer directory, peer client, fan-out and the TCP server
//! - `service/`: the operation set a transport exposes for one node
//! - `storage/`: the mempool and the durable snapshot (sled)
//! - `config/`: node settings from defaults, a TOML file and the environment
//! - `utils/`: hashing and signature primitives, timestamps, bincode helpers
//! - `cli/`: command-line definitions for the `pow-ledger` binary
//!
//! ## Where to start
//! 1. `core/ledger.rs` for mining, block acceptance and fork resolution
//! 2. `core/verification.rs` for what makes a chain or transaction valid
//! 3. `core/hashing.rs` for the canonical form every node must agree on
//! 4. `network/server.rs` for the wire protocol

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod service;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::Config;
pub use core::{
    Block, BlockReceipt, Difficulty, Ledger, LedgerSettings, ProofOfWork, Transaction,
    Verification, MINING_SENDER,
};
pub use error::{LedgerError, Result};
pub use network::{fan_out, Package, PeerClient, PeerDirectory, Reply, Server, TcpPeerClient};
pub use service::NodeService;
pub use storage::{MemoryPool, MemorySnapshotStore, SledSnapshotStore, Snapshot, SnapshotStore};
pub use utils::{current_timestamp, new_key_pair, sha256_digest, sha256_hex};
pub use wallet::{verify_transaction, KeyStore, Wallet};
