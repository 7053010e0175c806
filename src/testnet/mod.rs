//! Testnet framework for ledger testing
//!
//! This module provides in-process networks of ledgers, scripted peers with
//! fixed answers, and helpers for building valid or tampered chains.

pub mod test_utils;

pub use test_utils::*;
