use ring::digest::{Context, SHA256};
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};

use crate::error::{LedgerError, Result};
use data_encoding::HEXLOWER;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn current_timestamp() -> Result<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| LedgerError::Crypto(format!("System time error: {e}")))?
        .as_millis();

    // Ensure the timestamp fits in i64
    if duration > i64::MAX as u128 {
        return Err(LedgerError::Crypto("Timestamp overflow".to_string()));
    }

    Ok(duration as i64)
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    HEXLOWER.encode(&sha256_digest(data))
}

/// Generates a fresh Ed25519 key pair as a PKCS#8 v2 document.
pub fn new_key_pair() -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
        .map_err(|e| LedgerError::Crypto(format!("Failed to generate Ed25519 key pair: {e}")))?
        .as_ref()
        .to_vec();
    Ok(pkcs8)
}

pub fn ed25519_public_key(pkcs8: &[u8]) -> Result<Vec<u8>> {
    let key_pair = Ed25519KeyPair::from_pkcs8(pkcs8).map_err(|e| {
        LedgerError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
    })?;
    Ok(key_pair.public_key().as_ref().to_vec())
}

pub fn ed25519_sign(pkcs8: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let key_pair = Ed25519KeyPair::from_pkcs8(pkcs8).map_err(|e| {
        LedgerError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
    })?;
    Ok(key_pair.sign(message).as_ref().to_vec())
}

pub fn ed25519_verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    let peer_public_key = UnparsedPublicKey::new(&ED25519, public_key);
    peer_public_key.verify(message, signature).is_ok()
}
