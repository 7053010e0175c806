//! Data storage and persistence
//!
//! This module holds the mempool of pending transactions and the durable
//! snapshot of chain, mempool and peer set.

pub mod memory_pool;
pub mod snapshot;

pub use memory_pool::MemoryPool;
pub use snapshot::{MemorySnapshotStore, SledSnapshotStore, Snapshot, SnapshotStore};
