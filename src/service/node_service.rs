use crate::core::{Block, BlockReceipt, Ledger, Transaction};
use crate::error::{LedgerError, Result};
use crate::wallet::{KeyStore, Wallet};
use log::info;
use std::sync::{Arc, RwLock, RwLockReadGuard};

/// The operations a node offers to its transport. Each call returns an
/// explicit outcome; nothing here knows about sockets or status codes.
pub struct NodeService {
    ledger: Arc<Ledger>,
    wallet: RwLock<Option<Wallet>>,
    key_store: Option<KeyStore>,
}

impl NodeService {
    /// Installs the wallet's public key as the ledger's mining identity.
    pub fn new(ledger: Arc<Ledger>, wallet: Option<Wallet>) -> Result<NodeService> {
        ledger.set_public_key(wallet.as_ref().map(Wallet::get_public_key))?;
        Ok(NodeService {
            ledger,
            wallet: RwLock::new(wallet),
            key_store: None,
        })
    }

    /// Key file used by `create_wallet` and `load_wallet`.
    pub fn with_key_store(mut self, key_store: KeyStore) -> NodeService {
        self.key_store = Some(key_store);
        self
    }

    pub fn get_ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    fn read_wallet(&self) -> Result<RwLockReadGuard<'_, Option<Wallet>>> {
        self.wallet
            .read()
            .map_err(|e| LedgerError::Wallet(format!("Failed to acquire wallet lock: {e}")))
    }

    fn public_key(&self) -> Result<String> {
        self.read_wallet()?
            .as_ref()
            .map(Wallet::get_public_key)
            .ok_or_else(|| LedgerError::Wallet("No wallet configured for this node".to_string()))
    }

    fn key_store(&self) -> Result<&KeyStore> {
        self.key_store
            .as_ref()
            .ok_or_else(|| LedgerError::Wallet("No key file configured for this node".to_string()))
    }

    /// Swaps in `wallet` as the node's identity and mining account.
    fn install_wallet(&self, wallet: Wallet) -> Result<(String, f64)> {
        let public_key = wallet.get_public_key();
        let mut slot = self
            .wallet
            .write()
            .map_err(|e| LedgerError::Wallet(format!("Failed to acquire wallet lock: {e}")))?;
        self.ledger.set_public_key(Some(public_key.clone()))?;
        *slot = Some(wallet);
        drop(slot);

        info!("Node {} now uses wallet {public_key}", self.ledger.get_node_id());
        let balance = self.ledger.get_balance(&public_key)?;
        Ok((public_key, balance))
    }

    /// Generates a key pair, writes it to the key file and makes it this
    /// node's identity. Returns the new public key and its balance.
    pub fn create_wallet(&self) -> Result<(String, f64)> {
        let wallet = Wallet::new()?;
        self.key_store()?.save(&wallet)?;
        self.install_wallet(wallet)
    }

    /// Reloads the key pair from the key file and makes it this node's
    /// identity.
    pub fn load_wallet(&self) -> Result<(String, f64)> {
        let store = self.key_store()?;
        let wallet = store.load()?.ok_or_else(|| {
            LedgerError::Wallet(format!("No key file at {}", store.get_path().display()))
        })?;
        self.install_wallet(wallet)
    }

    /// Signs a transfer from this node's account and admits it.
    pub fn submit_transaction(&self, recipient: &str, amount: f64) -> Result<Transaction> {
        let (sender, signature) = {
            let guard = self.read_wallet()?;
            let wallet = guard.as_ref().ok_or_else(|| {
                LedgerError::Wallet("No wallet configured for this node".to_string())
            })?;
            let sender = wallet.get_public_key();
            let signature = wallet.sign_transaction(&sender, recipient, amount)?;
            (sender, signature)
        };
        self.ledger
            .add_transaction(&sender, recipient, &signature, amount, false)
    }

    pub fn receive_broadcast_transaction(&self, transaction: &Transaction) -> Result<Transaction> {
        self.ledger.add_transaction(
            transaction.get_sender(),
            transaction.get_recipient(),
            transaction.get_signature(),
            transaction.get_amount(),
            true,
        )
    }

    pub fn mine_block(&self) -> Result<Block> {
        self.ledger.mine()
    }

    pub fn receive_broadcast_block(&self, block: Block) -> Result<BlockReceipt> {
        self.ledger.receive_broadcast_block(block)
    }

    pub fn get_chain_snapshot(&self) -> Result<Vec<Block>> {
        self.ledger.get_chain()
    }

    pub fn get_open_transactions(&self) -> Result<Vec<Transaction>> {
        self.ledger.get_open_transactions()
    }

    /// Balance of `participant`, or of this node's account when `None`.
    /// Returns the participant the balance belongs to alongside it.
    pub fn get_balance(&self, participant: Option<&str>) -> Result<(String, f64)> {
        let participant = match participant {
            Some(participant) => participant.to_string(),
            None => self.public_key()?,
        };
        let balance = self.ledger.get_balance(&participant)?;
        Ok((participant, balance))
    }

    /// Returns the peer set after the addition.
    pub fn add_peer(&self, address: &str) -> Result<Vec<String>> {
        self.ledger.add_peer(address)?;
        self.ledger.get_peers()
    }

    /// Returns the peer set after the removal.
    pub fn remove_peer(&self, address: &str) -> Result<Vec<String>> {
        self.ledger.remove_peer(address)?;
        self.ledger.get_peers()
    }

    pub fn list_peers(&self) -> Result<Vec<String>> {
        self.ledger.get_peers()
    }

    /// Returns whether the local chain was replaced.
    pub fn resolve_conflicts(&self) -> Result<bool> {
        self.ledger.resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::{memory_ledger, ScriptedPeers};
    use tempfile::tempdir;

    #[test]
    fn test_service_without_wallet() {
        let ledger = Arc::new(memory_ledger("5000", ScriptedPeers::new()));
        let service = NodeService::new(ledger, None).unwrap();

        assert!(matches!(
            service.submit_transaction("bob", 1.0),
            Err(LedgerError::Wallet(_))
        ));
        assert!(matches!(service.mine_block(), Err(LedgerError::Wallet(_))));
        assert!(service.get_balance(None).is_err());
        assert_eq!(service.get_balance(Some("bob")).unwrap(), ("bob".to_string(), 0.0));
    }

    #[test]
    fn test_submit_after_mining() {
        let ledger = Arc::new(memory_ledger("5000", ScriptedPeers::new()));
        let wallet = Wallet::new().unwrap();
        let own_key = wallet.get_public_key();
        let service = NodeService::new(Arc::clone(&ledger), Some(wallet)).unwrap();
        assert_eq!(ledger.get_public_key(), Some(own_key.clone()));

        service.mine_block().unwrap();
        let tx = service.submit_transaction("bob", 2.5).unwrap();
        assert_eq!(tx.get_sender(), own_key);
        assert_eq!(service.get_open_transactions().unwrap(), vec![tx]);
        assert_eq!(service.get_balance(None).unwrap().1, 7.5);
    }

    #[test]
    fn test_create_and_load_wallet_on_a_running_node() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(memory_ledger("5000", ScriptedPeers::new()));
        let service = NodeService::new(Arc::clone(&ledger), None)
            .unwrap()
            .with_key_store(KeyStore::new(dir.path(), "5000"));
        assert!(matches!(service.load_wallet(), Err(LedgerError::Wallet(_))));

        let (created, balance) = service.create_wallet().unwrap();
        assert_eq!(balance, 0.0);
        assert_eq!(ledger.get_public_key(), Some(created.clone()));
        service.mine_block().unwrap();
        assert_eq!(service.get_balance(None).unwrap(), (created.clone(), 10.0));

        // A second service on the same key file picks up the same identity
        let other = NodeService::new(Arc::clone(&ledger), None)
            .unwrap()
            .with_key_store(KeyStore::new(dir.path(), "5000"));
        assert_eq!(other.load_wallet().unwrap(), (created, 10.0));
        assert!(other.submit_transaction("bob", 4.0).is_ok());
    }

    #[test]
    fn test_wallet_operations_need_a_key_file() {
        let ledger = Arc::new(memory_ledger("5000", ScriptedPeers::new()));
        let service = NodeService::new(Arc::clone(&ledger), None).unwrap();
        assert!(matches!(service.create_wallet(), Err(LedgerError::Wallet(_))));
        assert_eq!(ledger.get_public_key(), None);
    }

    #[test]
    fn test_receive_broadcast_transaction_checks_funds() {
        let ledger = Arc::new(memory_ledger("5000", ScriptedPeers::new()));
        let service = NodeService::new(ledger, None).unwrap();
        let sender = Wallet::new().unwrap();
        let public_key = sender.get_public_key();
        let signature = sender.sign_transaction(&public_key, "bob", 1.0).unwrap();
        let tx = Transaction::new(&public_key, "bob", &signature, 1.0).unwrap();

        assert!(matches!(
            service.receive_broadcast_transaction(&tx),
            Err(LedgerError::InsufficientFunds { .. })
        ));
    }
}
