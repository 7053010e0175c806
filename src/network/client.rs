use crate::core::{Block, BlockReceipt, Transaction};
use crate::error::{LedgerError, Result};
use crate::network::{Package, Reply};
use log::debug;
use serde_json::Deserializer;
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Default bound on every peer connection, read and write
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_millis(5000);

/// The calls a ledger makes to other nodes. Every call is independent and
/// may fail; callers treat a failure as "peer unreachable" and move on.
pub trait PeerClient: Send + Sync {
    fn send_transaction(&self, peer: &str, transaction: &Transaction) -> Result<()>;
    fn send_block(&self, peer: &str, block: &Block) -> Result<BlockReceipt>;
    fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>>;
}

/// JSON-over-TCP client: one connection per request, one reply per request.
pub struct TcpPeerClient {
    timeout: Duration,
}

impl Default for TcpPeerClient {
    fn default() -> Self {
        Self::new(DEFAULT_PEER_TIMEOUT)
    }
}

impl TcpPeerClient {
    pub fn new(timeout: Duration) -> TcpPeerClient {
        TcpPeerClient { timeout }
    }

    pub fn get_timeout(&self) -> Duration {
        self.timeout
    }

    fn resolve_addr(addr: &str) -> Result<SocketAddr> {
        addr.to_socket_addrs()
            .map_err(|e| LedgerError::Network(format!("Invalid address {addr}: {e}")))?
            .next()
            .ok_or_else(|| LedgerError::Network(format!("Address {addr} did not resolve")))
    }

    /// Sends `pkg` to `addr` and waits for the first reply.
    pub fn request(&self, addr: &str, pkg: &Package) -> Result<Reply> {
        let socket_addr = Self::resolve_addr(addr)?;
        debug!("Sending package to {addr}: {pkg:?}");

        let mut stream = TcpStream::connect_timeout(&socket_addr, self.timeout)
            .map_err(|e| LedgerError::Network(format!("Failed to connect to {addr}: {e}")))?;
        stream
            .set_write_timeout(Some(self.timeout))
            .map_err(|e| LedgerError::Network(format!("Failed to set write timeout: {e}")))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| LedgerError::Network(format!("Failed to set read timeout: {e}")))?;

        serde_json::to_writer(&stream, pkg)
            .map_err(|e| LedgerError::Network(format!("Failed to send data: {e}")))?;
        stream
            .flush()
            .map_err(|e| LedgerError::Network(format!("Failed to send data: {e}")))?;
        // One request per connection; lets the server's read loop finish
        let _ = stream.shutdown(Shutdown::Write);

        let reader = BufReader::new(&stream);
        match Deserializer::from_reader(reader).into_iter::<Reply>().next() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(LedgerError::Network(format!(
                "Failed to read reply from {addr}: {e}"
            ))),
            None => Err(LedgerError::Network(format!(
                "Peer {addr} closed the connection without replying"
            ))),
        }
    }
}

fn unexpected(peer: &str, reply: Reply) -> LedgerError {
    match reply {
        Reply::Error { message } => LedgerError::Network(format!("Peer {peer} refused: {message}")),
        other => LedgerError::Network(format!("Unexpected reply from {peer}: {other:?}")),
    }
}

impl PeerClient for TcpPeerClient {
    fn send_transaction(&self, peer: &str, transaction: &Transaction) -> Result<()> {
        let pkg = Package::BroadcastTransaction {
            transaction: transaction.clone(),
        };
        match self.request(peer, &pkg)? {
            Reply::Transaction { .. } => Ok(()),
            other => Err(unexpected(peer, other)),
        }
    }

    fn send_block(&self, peer: &str, block: &Block) -> Result<BlockReceipt> {
        let pkg = Package::BroadcastBlock {
            block: block.clone(),
        };
        match self.request(peer, &pkg)? {
            Reply::BlockReceipt { receipt } => Ok(receipt),
            other => Err(unexpected(peer, other)),
        }
    }

    fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>> {
        match self.request(peer, &Package::GetChain)? {
            Reply::Chain { chain } => Ok(chain),
            other => Err(unexpected(peer, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_unreachable_peer_is_an_error() {
        // Grab a free port and close it again so nothing is listening
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let client = TcpPeerClient::new(Duration::from_millis(200));
        assert!(matches!(
            client.fetch_chain(&addr),
            Err(LedgerError::Network(_))
        ));
    }

    #[test]
    fn test_malformed_address_is_an_error() {
        let client = TcpPeerClient::default();
        assert!(client.request("not an address", &Package::GetChain).is_err());
        assert_eq!(client.get_timeout(), DEFAULT_PEER_TIMEOUT);
    }

    #[test]
    fn test_silent_peer_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let client = TcpPeerClient::new(Duration::from_millis(200));

        // The listener accepts at the OS level but never answers
        let result = client.request(&addr, &Package::ListPeers);
        assert!(matches!(result, Err(LedgerError::Network(_))));
        drop(listener);
    }
}
