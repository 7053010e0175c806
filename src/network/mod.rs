//! Peer-to-peer networking functionality
//!
//! This module handles communication between ledger nodes: the peer
//! directory, the client used for broadcasts and chain fetches, best-effort
//! fan-out across peers, and the TCP server answering requests.

pub mod broadcast;
pub mod client;
pub mod peers;
pub mod server;

pub use broadcast::fan_out;
pub use client::{PeerClient, TcpPeerClient, DEFAULT_PEER_TIMEOUT};
pub use peers::{normalize_peer_addr, PeerDirectory};
pub use server::{Package, Reply, Server};
