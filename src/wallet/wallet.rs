use crate::core::transaction::signing_payload;
use crate::core::Transaction;
use crate::error::{LedgerError, Result};
use crate::utils::{ed25519_public_key, ed25519_sign, ed25519_verify, new_key_pair, sha256_digest};
use data_encoding::HEXLOWER;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// An Ed25519 key pair. The hex public key is the account identifier used in
/// the `sender`/`recipient` fields.
#[derive(Clone, Zeroize, ZeroizeOnDrop, bincode::Encode, bincode::Decode)]
pub struct Wallet {
    pkcs8: Vec<u8>,
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = new_key_pair()?;
        Self::from_pkcs8(pkcs8)
    }

    pub fn from_pkcs8(pkcs8: Vec<u8>) -> Result<Wallet> {
        let public_key = ed25519_public_key(&pkcs8)?;
        Ok(Wallet { pkcs8, public_key })
    }

    pub fn from_private_key_hex(private_key: &str) -> Result<Wallet> {
        let pkcs8 = HEXLOWER
            .decode(private_key.as_bytes())
            .map_err(|e| LedgerError::Wallet(format!("Private key is not valid hex: {e}")))?;
        Self::from_pkcs8(pkcs8)
    }

    pub fn get_public_key(&self) -> String {
        HEXLOWER.encode(&self.public_key)
    }

    pub fn get_private_key(&self) -> String {
        HEXLOWER.encode(&self.pkcs8)
    }

    /// Signs SHA-256(sender ++ recipient ++ amount) and returns the hex signature.
    pub fn sign_transaction(&self, sender: &str, recipient: &str, amount: f64) -> Result<String> {
        let digest = sha256_digest(&signing_payload(sender, recipient, amount));
        let signature = ed25519_sign(&self.pkcs8, &digest)?;
        Ok(HEXLOWER.encode(&signature))
    }
}

/// Checks a transaction's signature against the key in its `sender` field.
/// Malformed key material or signatures count as invalid, never as errors.
pub fn verify_transaction(transaction: &Transaction) -> bool {
    let public_key = match HEXLOWER.decode(transaction.get_sender().as_bytes()) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let signature = match HEXLOWER.decode(transaction.get_signature().as_bytes()) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    let digest = sha256_digest(&transaction.signing_payload());
    ed25519_verify(&public_key, &signature, &digest)
}
