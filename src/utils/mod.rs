//! Utility functions and helpers
//!
//! This module contains cryptographic primitives, timestamps and the
//! bincode helpers used for durable storage.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    current_timestamp, ed25519_public_key, ed25519_sign, ed25519_verify, new_key_pair,
    sha256_digest, sha256_hex,
};

pub use serialization::{deserialize, serialize};
