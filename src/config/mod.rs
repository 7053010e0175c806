//! Configuration management
//!
//! This module handles the settings for a ledger node: its address and
//! identity, where it keeps its data, mining difficulty and reward, and how
//! long to wait on peers.

pub mod settings;

pub use settings::Config;
