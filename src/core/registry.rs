use crate::core::ledger::{ChainConfig, Ledger};
use crate::error::Result;
use log::info;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Independent ledgers keyed by chain name. Ledgers share nothing with each
/// other; the registry only hands out handles.
pub struct ChainRegistry {
    /// `None` keeps every chain in a temporary database
    data_dir: Option<PathBuf>,
    chains: RwLock<HashMap<String, Arc<Ledger>>>,
}

impl ChainRegistry {
    /// Chains live under `<data_dir>/<chain name>`
    pub fn new(data_dir: &Path) -> ChainRegistry {
        ChainRegistry {
            data_dir: Some(data_dir.to_path_buf()),
            chains: RwLock::new(HashMap::new()),
        }
    }

    pub fn in_memory() -> ChainRegistry {
        ChainRegistry {
            data_dir: None,
            chains: RwLock::new(HashMap::new()),
        }
    }

    pub fn chain_path(&self, name: &str) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(name))
    }

    /// Handle to the chain named in `config`, opening it on first use
    pub fn open(&self, config: ChainConfig) -> Result<Arc<Ledger>> {
        let mut chains = self.chains.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(ledger) = chains.get(&config.name) {
            return Ok(Arc::clone(ledger));
        }

        let name = config.name.clone();
        let ledger = match self.chain_path(&name) {
            Some(path) => Ledger::open(config, &path)?,
            None => Ledger::in_memory(config)?,
        };
        info!("Registered chain '{name}'");
        let ledger = Arc::new(ledger);
        chains.insert(name, Arc::clone(&ledger));
        Ok(ledger)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Ledger>> {
        self.chains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Forget a chain; its data stays on disk
    pub fn close(&self, name: &str) -> Option<Arc<Ledger>> {
        self.chains
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .chains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_chains_are_isolated() {
        let registry = ChainRegistry::in_memory();
        let premine = BTreeMap::from([("alice".to_string(), 100)]);
        let main = registry
            .open(ChainConfig::new("main").with_difficulty(2).with_premine(premine))
            .unwrap();
        let side = registry
            .open(ChainConfig::new("side").with_difficulty(2))
            .unwrap();

        main.mine().unwrap();
        assert_eq!(main.height(), 1);
        assert_eq!(side.height(), 0);
        assert_eq!(main.balance_of("alice"), 100);
        assert_eq!(side.balance_of("alice"), 0);
        assert_eq!(registry.names(), vec!["main".to_string(), "side".to_string()]);
    }

    #[test]
    fn test_open_twice_returns_same_ledger() {
        let registry = ChainRegistry::in_memory();
        let first = registry.open(ChainConfig::new("main").with_difficulty(2)).unwrap();
        let second = registry.open(ChainConfig::new("main").with_difficulty(9)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.get("main").is_some());
        assert!(registry.close("main").is_some());
        assert!(registry.get("main").is_none());
    }

    #[test]
    fn test_on_disk_chains_use_separate_directories() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ChainRegistry::new(dir.path());
        registry.open(ChainConfig::new("a").with_difficulty(1)).unwrap();
        registry.open(ChainConfig::new("b").with_difficulty(1)).unwrap();
        assert!(dir.path().join("a").exists());
        assert!(dir.path().join("b").exists());
    }
}
