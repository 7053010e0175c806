use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Amounts must be finite and non-negative, same as on the wire
pub fn parse_amount(s: &str) -> Result<f64, String> {
    let amount: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid amount: {s}"))?;
    if !amount.is_finite() || amount < 0.0 {
        return Err(format!(
            "Invalid amount: {s}. Amounts must be non-negative numbers"
        ));
    }
    Ok(amount)
}

#[derive(Debug, Parser)]
#[command(name = "pow-ledger")]
pub struct Opt {
    #[arg(long = "config", global = true, help = "TOML configuration file")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "createwallet", about = "Create the key pair for this node")]
    Createwallet,
    #[command(name = "startnode", about = "Start a ledger node")]
    StartNode,
    #[command(name = "send", about = "Sign and submit a transaction on a node")]
    Send {
        #[arg(help = "Recipient public key")]
        recipient: String,
        #[arg(help = "Amount to send", value_parser = parse_amount)]
        amount: f64,
        #[arg(long = "node", help = "Address of the node to talk to")]
        node: Option<String>,
    },
    #[command(name = "mine", about = "Mine the pending transactions into a block")]
    Mine {
        #[arg(long = "node", help = "Address of the node to talk to")]
        node: Option<String>,
    },
    #[command(name = "balance", about = "Get the balance of a participant")]
    Balance {
        #[arg(help = "Public key to query, defaults to the node's own account")]
        participant: Option<String>,
        #[arg(long = "node", help = "Address of the node to talk to")]
        node: Option<String>,
    },
    #[command(name = "printchain", about = "Print all blocks in the chain")]
    Printchain {
        #[arg(long = "node", help = "Address of the node to talk to")]
        node: Option<String>,
    },
    #[command(name = "pending", about = "Print the open transactions")]
    Pending {
        #[arg(long = "node", help = "Address of the node to talk to")]
        node: Option<String>,
    },
    #[command(name = "addpeer", about = "Register a peer on a node")]
    AddPeer {
        #[arg(help = "Peer address (host:port)")]
        address: String,
        #[arg(long = "node", help = "Address of the node to talk to")]
        node: Option<String>,
    },
    #[command(name = "removepeer", about = "Remove a peer from a node")]
    RemovePeer {
        #[arg(help = "Peer address (host:port)")]
        address: String,
        #[arg(long = "node", help = "Address of the node to talk to")]
        node: Option<String>,
    },
    #[command(name = "peers", about = "List the peers of a node")]
    Peers {
        #[arg(long = "node", help = "Address of the node to talk to")]
        node: Option<String>,
    },
    #[command(name = "resolve", about = "Adopt the longest valid chain among peers")]
    Resolve {
        #[arg(long = "node", help = "Address of the node to talk to")]
        node: Option<String>,
    },
    #[command(name = "wallet", about = "Reload or create the key pair of a running node")]
    Wallet {
        #[arg(long = "create", help = "Generate a new key pair instead of reloading")]
        create: bool,
        #[arg(long = "node", help = "Address of the node to talk to")]
        node: Option<String>,
    },
}
