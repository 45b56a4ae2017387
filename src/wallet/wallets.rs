// Named wallets live in one file next to (never inside) the chain data.
use crate::error::{LedgerError, Result};
use crate::utils::{deserialize, serialize};
use crate::wallet::encryption::{self, SealedWallets};
use crate::wallet::Wallet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

pub const WALLET_FILE: &str = "wallets.dat";

#[derive(Serialize, Deserialize, bincode::Encode, bincode::Decode)]
enum WalletFile {
    Plain(BTreeMap<String, Wallet>),
    Sealed(SealedWallets),
}

pub struct Wallets {
    path: PathBuf,
    wallets: BTreeMap<String, Wallet>,
    password: Option<Zeroizing<String>>,
}

impl Wallets {
    /// Open an unencrypted wallet file, starting empty if it does not exist
    pub fn open(path: &Path) -> Result<Wallets> {
        let wallets = match Self::read_file(path)? {
            None => BTreeMap::new(),
            Some(WalletFile::Plain(wallets)) => wallets,
            Some(WalletFile::Sealed(_)) => {
                return Err(LedgerError::Wallet(format!(
                    "{} is passphrase protected",
                    path.display()
                )))
            }
        };
        log::info!("Loaded {} wallets from {}", wallets.len(), path.display());
        Ok(Wallets {
            path: path.to_path_buf(),
            wallets,
            password: None,
        })
    }

    /// Open (or start) a passphrase-protected wallet file
    pub fn open_encrypted(path: &Path, password: &str) -> Result<Wallets> {
        encryption::validate_password(password)?;
        let wallets = match Self::read_file(path)? {
            None => BTreeMap::new(),
            Some(WalletFile::Sealed(sealed)) => {
                let plaintext = encryption::open(password, &sealed)?;
                deserialize(&plaintext)?
            }
            // Upgrading a plain file: it is sealed on the next save.
            Some(WalletFile::Plain(wallets)) => wallets,
        };
        log::info!(
            "Loaded {} wallets from encrypted file {}",
            wallets.len(),
            path.display()
        );
        Ok(Wallets {
            path: path.to_path_buf(),
            wallets,
            password: Some(Zeroizing::new(password.to_string())),
        })
    }

    fn read_file(path: &Path) -> Result<Option<WalletFile>> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        let file = deserialize(&bytes)
            .map_err(|e| LedgerError::Wallet(format!("Failed to read wallet file: {e}")))?;
        Ok(Some(file))
    }

    pub fn create_wallet(&mut self, name: &str) -> Result<String> {
        if self.wallets.contains_key(name) {
            return Err(LedgerError::Wallet(format!("Wallet '{name}' already exists")));
        }
        let wallet = Wallet::new()?;
        let address = wallet.get_address();
        self.wallets.insert(name.to_string(), wallet);
        self.save()?;
        log::info!("Created wallet '{name}' with address {address}");
        Ok(address)
    }

    /// Look a wallet up by name first, then by address
    pub fn get_wallet(&self, name_or_address: &str) -> Option<&Wallet> {
        self.wallets.get(name_or_address).or_else(|| {
            self.wallets
                .values()
                .find(|wallet| wallet.get_address() == name_or_address)
        })
    }

    pub fn require_wallet(&self, name_or_address: &str) -> Result<&Wallet> {
        self.get_wallet(name_or_address)
            .ok_or_else(|| LedgerError::NotFound(format!("wallet '{name_or_address}'")))
    }

    /// (name, address) pairs in name order
    pub fn list(&self) -> Vec<(String, String)> {
        self.wallets
            .iter()
            .map(|(name, wallet)| (name.clone(), wallet.get_address()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn is_encrypted(&self) -> bool {
        self.password.is_some()
    }

    pub fn save(&self) -> Result<()> {
        let file = match &self.password {
            Some(password) => {
                WalletFile::Sealed(encryption::seal(password.as_str(), &serialize(&self.wallets)?)?)
            }
            None => WalletFile::Plain(self.wallets.clone()),
        };
        let bytes = serialize(&file)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let handle = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(handle);
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_and_reload_plain_wallets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(WALLET_FILE);

        let address = {
            let mut wallets = Wallets::open(&path).unwrap();
            wallets.create_wallet("alice").unwrap()
        };

        let wallets = Wallets::open(&path).unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets.get_wallet("alice").unwrap().get_address(), address);
        assert!(wallets.get_wallet(&address).is_some());
        assert_eq!(wallets.list(), vec![("alice".to_string(), address)]);
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let dir = tempdir().unwrap();
        let mut wallets = Wallets::open(&dir.path().join(WALLET_FILE)).unwrap();
        wallets.create_wallet("alice").unwrap();
        assert!(wallets.create_wallet("alice").is_err());
    }

    #[test]
    fn test_encrypted_wallets_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(WALLET_FILE);

        let address = {
            let mut wallets = Wallets::open_encrypted(&path, "TestPassword123").unwrap();
            assert!(wallets.is_encrypted());
            wallets.create_wallet("bob").unwrap()
        };

        assert!(Wallets::open(&path).is_err());
        assert!(Wallets::open_encrypted(&path, "WrongPassword").is_err());

        let wallets = Wallets::open_encrypted(&path, "TestPassword123").unwrap();
        assert_eq!(wallets.get_wallet("bob").unwrap().get_address(), address);
    }

    #[test]
    fn test_missing_wallet_lookup() {
        let dir = tempdir().unwrap();
        let wallets = Wallets::open(&dir.path().join(WALLET_FILE)).unwrap();
        assert!(matches!(
            wallets.require_wallet("nobody"),
            Err(LedgerError::NotFound(_))
        ));
    }
}
