use crate::error::Result;
use crate::utils::{deserialize, serialize};
use crate::wallet::Wallet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Key-pair file for one node: `<data_dir>/wallet-<node_id>.dat`
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(data_dir: &Path, node_id: &str) -> KeyStore {
        KeyStore {
            path: data_dir.join(format!("wallet-{node_id}.dat")),
        }
    }

    pub fn get_path(&self) -> &Path {
        self.path.as_path()
    }

    /// A missing file is not an error: the node simply has no identity yet.
    pub fn load(&self) -> Result<Option<Wallet>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&self.path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        let wallet: Wallet = deserialize(&buf)?;
        // Re-derive the public key so a corrupted file cannot claim someone else's identity
        let checked = Wallet::from_private_key_hex(&wallet.get_private_key())?;
        Ok(Some(checked))
    }

    pub fn save(&self, wallet: &Wallet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        let wallet_bytes = serialize(wallet)?;
        writer.write_all(wallet_bytes.as_slice())?;
        writer.flush()?;
        Ok(())
    }
}
