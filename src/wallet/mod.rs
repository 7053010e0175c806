//! Key management and signatures
//!
//! This module handles key-pair generation, transaction signing and
//! verification, and the on-disk key file for a node.

#[allow(clippy::module_inception)]
pub mod wallet;
pub mod wallets;

pub use wallet::{verify_transaction, Wallet};
pub use wallets::KeyStore;
