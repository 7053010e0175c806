use crate::core::{Block, BlockReceipt, Transaction};
use crate::error::{LedgerError, Result};
use crate::service::NodeService;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Deserializer;
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const CONNECTION_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Requests understood by a node, from peers and from local clients alike.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Package {
    /// Sign with the node's wallet and admit into its mempool
    SubmitTransaction { recipient: String, amount: f64 },
    /// A transaction another node admitted; never re-broadcast
    BroadcastTransaction { transaction: Transaction },
    MineBlock,
    BroadcastBlock { block: Block },
    GetChain,
    GetOpenTransactions,
    /// Balance of `participant`, or of the node's own account when absent
    GetBalance { participant: Option<String> },
    AddPeer { address: String },
    RemovePeer { address: String },
    ListPeers,
    ResolveConflicts,
    /// Generate a key pair, store it in the node's key file and mine for it
    CreateWallet,
    /// Reload the node's key pair from its key file
    LoadWallet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    Transaction { transaction: Transaction },
    Block { block: Block },
    BlockReceipt { receipt: BlockReceipt },
    Chain { chain: Vec<Block> },
    OpenTransactions { transactions: Vec<Transaction> },
    Balance { participant: String, balance: f64 },
    Peers { peers: Vec<String> },
    Resolved { replaced: bool, chain: Vec<Block> },
    Wallet { public_key: String, balance: f64 },
    Error { message: String },
}

impl Reply {
    fn from_result<T>(result: Result<T>, to_reply: impl FnOnce(T) -> Reply) -> Reply {
        match result {
            Ok(value) => to_reply(value),
            Err(e) => Reply::Error {
                message: e.to_string(),
            },
        }
    }
}

/// TCP front of a node: one thread per connection, JSON packages in, JSON
/// replies out.
pub struct Server {
    listener: TcpListener,
    service: Arc<NodeService>,
}

impl Server {
    pub fn bind(addr: &str, service: Arc<NodeService>) -> Result<Server> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| LedgerError::Network(format!("Failed to bind to {addr}: {e}")))?;
        Ok(Server { listener, service })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| LedgerError::Network(format!("Failed to read local address: {e}")))
    }

    /// Accepts connections until the listener fails.
    pub fn run(&self) -> Result<()> {
        info!(
            "Node {} listening on {}",
            self.service.get_ledger().get_node_id(),
            self.local_addr()?
        );

        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let peer_addr = match stream.peer_addr() {
                        Ok(addr) => addr,
                        Err(e) => {
                            error!("Failed to get peer address: {e}");
                            continue;
                        }
                    };

                    let service = Arc::clone(&self.service);
                    thread::spawn(move || {
                        if let Err(e) = Self::handle_connection(&service, stream, peer_addr) {
                            error!("Error handling connection from {peer_addr}: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {e}");
                }
            }
        }

        Ok(())
    }

    fn handle_connection(
        service: &NodeService,
        stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<()> {
        stream
            .set_read_timeout(Some(CONNECTION_READ_TIMEOUT))
            .map_err(|e| LedgerError::Network(format!("Failed to set read timeout: {e}")))?;

        let reader = BufReader::new(&stream);
        let pkg_reader = Deserializer::from_reader(reader).into_iter::<Package>();

        for pkg in pkg_reader {
            let reply = match pkg {
                Ok(pkg) => {
                    info!("Received request from {peer_addr}: {}", describe(&pkg));
                    Self::dispatch(service, pkg)
                }
                Err(e) => {
                    // Malformed or invalid input gets an answer, then the connection closes
                    warn!("Rejected package from {peer_addr}: {e}");
                    let reply = Reply::Error {
                        message: format!("Malformed request: {e}"),
                    };
                    Self::send_reply(&stream, &reply)?;
                    break;
                }
            };
            Self::send_reply(&stream, &reply)?;
        }

        let _ = stream.shutdown(Shutdown::Both);
        Ok(())
    }

    fn send_reply(mut stream: &TcpStream, reply: &Reply) -> Result<()> {
        serde_json::to_writer(stream, reply)
            .map_err(|e| LedgerError::Network(format!("Failed to send reply: {e}")))?;
        stream
            .flush()
            .map_err(|e| LedgerError::Network(format!("Failed to send reply: {e}")))
    }

    /// Maps one request onto the node's operation set.
    pub fn dispatch(service: &NodeService, pkg: Package) -> Reply {
        match pkg {
            Package::SubmitTransaction { recipient, amount } => {
                Reply::from_result(service.submit_transaction(&recipient, amount), |transaction| {
                    Reply::Transaction { transaction }
                })
            }
            Package::BroadcastTransaction { transaction } => Reply::from_result(
                service.receive_broadcast_transaction(&transaction),
                |transaction| Reply::Transaction { transaction },
            ),
            Package::MineBlock => {
                Reply::from_result(service.mine_block(), |block| Reply::Block { block })
            }
            Package::BroadcastBlock { block } => {
                Reply::from_result(service.receive_broadcast_block(block), |receipt| {
                    Reply::BlockReceipt { receipt }
                })
            }
            Package::GetChain => {
                Reply::from_result(service.get_chain_snapshot(), |chain| Reply::Chain { chain })
            }
            Package::GetOpenTransactions => {
                Reply::from_result(service.get_open_transactions(), |transactions| {
                    Reply::OpenTransactions { transactions }
                })
            }
            Package::GetBalance { participant } => Reply::from_result(
                service.get_balance(participant.as_deref()),
                |(participant, balance)| Reply::Balance {
                    participant,
                    balance,
                },
            ),
            Package::AddPeer { address } => {
                Reply::from_result(service.add_peer(&address), |peers| Reply::Peers { peers })
            }
            Package::RemovePeer { address } => {
                Reply::from_result(service.remove_peer(&address), |peers| Reply::Peers {
                    peers,
                })
            }
            Package::ListPeers => {
                Reply::from_result(service.list_peers(), |peers| Reply::Peers { peers })
            }
            Package::ResolveConflicts => Reply::from_result(
                service
                    .resolve_conflicts()
                    .and_then(|replaced| Ok((replaced, service.get_chain_snapshot()?))),
                |(replaced, chain)| Reply::Resolved { replaced, chain },
            ),
            Package::CreateWallet => {
                Reply::from_result(service.create_wallet(), |(public_key, balance)| {
                    Reply::Wallet {
                        public_key,
                        balance,
                    }
                })
            }
            Package::LoadWallet => {
                Reply::from_result(service.load_wallet(), |(public_key, balance)| {
                    Reply::Wallet {
                        public_key,
                        balance,
                    }
                })
            }
        }
    }
}

// Full blocks and chains are too noisy for the request log
fn describe(pkg: &Package) -> String {
    match pkg {
        Package::BroadcastTransaction { transaction } => format!(
            "BroadcastTransaction of {} to {}",
            transaction.get_amount(),
            transaction.get_recipient()
        ),
        Package::BroadcastBlock { block } => format!("BroadcastBlock {}", block.get_index()),
        other => format!("{other:?}"),
    }
}
