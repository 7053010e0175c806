//! Command-line interface
//!
//! This module contains the CLI commands and argument parsing
//! for the ledger node and its client subcommands.

pub mod commands;

pub use commands::{parse_amount, Command, Opt};
