// Entry point for the pow-ledger binary: `startnode` runs a node, the other
// subcommands talk to a running node over the wire protocol.
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use pow_ledger::{
    Command, Config, KeyStore, Ledger, NodeService, Opt, Package, Reply, Server,
    SledSnapshotStore, TcpPeerClient, Wallet,
};
use std::process;
use std::sync::Arc;

fn main() {
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(opt.config.as_deref())?;

    match opt.command {
        Command::Createwallet => {
            let store = KeyStore::new(&config.data_dir, &config.get_node_id());
            if let Some(existing) = store.load()? {
                println!(
                    "Wallet already exists at {}",
                    store.get_path().display()
                );
                println!("Your public key: {}", existing.get_public_key());
                return Ok(());
            }
            let wallet = Wallet::new()?;
            store.save(&wallet)?;
            println!("Your public key: {}", wallet.get_public_key());
        }
        Command::StartNode => start_node(&config)?,
        Command::Send {
            recipient,
            amount,
            node,
        } => {
            let reply = request(&config, node, Package::SubmitTransaction { recipient, amount })?;
            print_reply(reply)?;
        }
        Command::Mine { node } => print_reply(request(&config, node, Package::MineBlock)?)?,
        Command::Balance { participant, node } => {
            print_reply(request(&config, node, Package::GetBalance { participant })?)?
        }
        Command::Printchain { node } => print_reply(request(&config, node, Package::GetChain)?)?,
        Command::Pending { node } => {
            print_reply(request(&config, node, Package::GetOpenTransactions)?)?
        }
        Command::AddPeer { address, node } => {
            print_reply(request(&config, node, Package::AddPeer { address })?)?
        }
        Command::RemovePeer { address, node } => {
            print_reply(request(&config, node, Package::RemovePeer { address })?)?
        }
        Command::Peers { node } => print_reply(request(&config, node, Package::ListPeers)?)?,
        Command::Resolve { node } => {
            print_reply(request(&config, node, Package::ResolveConflicts)?)?
        }
        Command::Wallet { create, node } => {
            let pkg = if create {
                Package::CreateWallet
            } else {
                Package::LoadWallet
            };
            print_reply(request(&config, node, pkg)?)?
        }
    }
    Ok(())
}

fn start_node(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let node_id = config.get_node_id();
    let store = SledSnapshotStore::open_for_node(&config.data_dir, &node_id)?;
    let client = Arc::new(TcpPeerClient::new(config.get_peer_timeout()));
    let ledger = Arc::new(Ledger::new(
        &node_id,
        config.get_ledger_settings()?,
        Box::new(store),
        client,
    ));
    for peer in &config.peers {
        ledger.add_peer(peer)?;
    }
    let settings = ledger.get_settings();
    info!(
        "Node {node_id} mines at difficulty {} for a reward of {}",
        settings.difficulty.leading_zeros(),
        settings.mining_reward
    );

    let key_store = KeyStore::new(&config.data_dir, &node_id);
    let wallet = key_store.load()?;
    match &wallet {
        Some(wallet) => info!("Mining rewards go to {}", wallet.get_public_key()),
        None => warn!("No wallet for node {node_id}, create one to enable mining and sending"),
    }

    let service = Arc::new(NodeService::new(ledger, wallet)?.with_key_store(key_store));
    let server = Server::bind(&config.node_addr, service)?;
    server.run()?;
    Ok(())
}

fn request(
    config: &Config,
    node: Option<String>,
    pkg: Package,
) -> Result<Reply, Box<dyn std::error::Error>> {
    let addr = node.unwrap_or_else(|| config.node_addr.clone());
    let client = TcpPeerClient::new(config.get_peer_timeout());
    Ok(client.request(&addr, &pkg)?)
}

fn print_reply(reply: Reply) -> Result<(), Box<dyn std::error::Error>> {
    match reply {
        Reply::Transaction { transaction } => {
            println!(
                "Submitted {} from {} to {}",
                transaction.get_amount(),
                transaction.get_sender(),
                transaction.get_recipient()
            );
        }
        Reply::Block { block } => {
            println!(
                "Mined block {} with proof {} and {} transaction(s)",
                block.get_index(),
                block.get_proof(),
                block.get_transactions().len()
            );
        }
        Reply::BlockReceipt { receipt } => println!("{receipt:?}"),
        Reply::Resolved { replaced, chain } => {
            if replaced {
                println!("Chain was replaced, now {} block(s)", chain.len());
            } else {
                println!("Local chain kept, {} block(s)", chain.len());
            }
        }
        Reply::Chain { chain } => {
            for block in &chain {
                println!("Block {}", block.get_index());
                println!("  Previous hash: {}", block.get_previous_hash());
                println!("  Timestamp: {}", block.get_timestamp());
                println!("  Proof: {}", block.get_proof());
                for tx in block.get_transactions() {
                    println!(
                        "  - {} -> {}: {}",
                        tx.get_sender(),
                        tx.get_recipient(),
                        tx.get_amount()
                    );
                }
            }
        }
        Reply::OpenTransactions { transactions } => {
            if transactions.is_empty() {
                println!("No open transactions");
            }
            for tx in &transactions {
                println!(
                    "{} -> {}: {}",
                    tx.get_sender(),
                    tx.get_recipient(),
                    tx.get_amount()
                );
            }
        }
        Reply::Balance {
            participant,
            balance,
        } => println!("Balance of {participant}: {balance}"),
        Reply::Wallet {
            public_key,
            balance,
        } => {
            println!("Your public key: {public_key}");
            println!("Balance: {balance}");
        }
        Reply::Peers { peers } => {
            for peer in &peers {
                println!("{peer}");
            }
        }
        Reply::Error { message } => return Err(format!("Node refused: {message}").into()),
    }
    Ok(())
}
