use crate::error::{LedgerError, Result};
use log::info;
use std::sync::RwLock;

/// Registered peer addresses (`host:port`), each present at most once.
///
/// Kept in registration order so that fan-out and resolution visit peers
/// in a stable sequence.
pub struct PeerDirectory {
    inner: RwLock<Vec<String>>,
}

impl Default for PeerDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerDirectory {
    pub fn new() -> PeerDirectory {
        PeerDirectory {
            inner: RwLock::new(vec![]),
        }
    }

    /// Returns `false` when the address was already registered.
    pub fn add(&self, addr: &str) -> Result<bool> {
        let addr = normalize_peer_addr(addr)?;
        let mut inner = self
            .inner
            .write()
            .map_err(|e| LedgerError::Network(format!("Failed to acquire peer lock: {e}")))?;
        if inner.iter().any(|known| known == &addr) {
            return Ok(false);
        }
        info!("Registered peer {addr}");
        inner.push(addr);
        Ok(true)
    }

    /// Returns `false` when the address was not registered.
    pub fn remove(&self, addr: &str) -> Result<bool> {
        let addr = addr.trim();
        let mut inner = self
            .inner
            .write()
            .map_err(|e| LedgerError::Network(format!("Failed to acquire peer lock: {e}")))?;
        match inner.iter().position(|known| known == addr) {
            Some(idx) => {
                inner.remove(idx);
                info!("Removed peer {addr}");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn list(&self) -> Result<Vec<String>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| LedgerError::Network(format!("Failed to acquire peer lock: {e}")))?;
        Ok(inner.clone())
    }

    pub fn contains(&self, addr: &str) -> bool {
        self.inner
            .read()
            .map(|inner| inner.iter().any(|known| known == addr.trim()))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Accepts `host:port` with a non-empty host and a non-zero port.
pub fn normalize_peer_addr(addr: &str) -> Result<String> {
    let addr = addr.trim();
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| LedgerError::InvalidPeer(addr.to_string()))?;
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err(LedgerError::InvalidPeer(addr.to_string()));
    }
    match port.parse::<u16>() {
        Ok(port) if port > 0 => Ok(addr.to_string()),
        _ => Err(LedgerError::InvalidPeer(addr.to_string())),
    }
}
