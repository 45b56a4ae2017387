use crate::core::{
    Amount, ChainConfig, DEFAULT_DIFFICULTY, DEFAULT_GENESIS_MESSAGE,
    DEFAULT_MAX_BLOCK_TRANSACTIONS, DEFAULT_MINER_ADDRESS, DEFAULT_MINING_REWARD,
};
use crate::error::{LedgerError, Result};
use crate::wallet::WALLET_FILE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

static DEFAULT_DATA_DIR: &str = "./data";
static DEFAULT_CHAIN_NAME: &str = "main";

const DATA_DIR_KEY: &str = "DATUM_DATA_DIR";
const CHAIN_NAME_KEY: &str = "DATUM_CHAIN";
const MINER_ADDRESS_KEY: &str = "DATUM_MINER_ADDRESS";
const DIFFICULTY_KEY: &str = "DATUM_DIFFICULTY";
const MINING_REWARD_KEY: &str = "DATUM_MINING_REWARD";
const GENESIS_MESSAGE_KEY: &str = "DATUM_GENESIS_MESSAGE";
const PREMINE_KEY: &str = "DATUM_PREMINE";
const MAX_BLOCK_TRANSACTIONS_KEY: &str = "DATUM_MAX_BLOCK_TRANSACTIONS";
const WALLET_FILE_KEY: &str = "DATUM_WALLET_FILE";

/// Process settings: defaults, then an optional TOML file, then `DATUM_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub chain_name: String,
    pub miner_address: String,
    /// Leading zero bits required of a block hash
    pub difficulty: u32,
    pub mining_reward: Amount,
    pub genesis_message: String,
    pub premine: BTreeMap<String, Amount>,
    pub max_block_transactions: usize,
    /// Relative to `data_dir`
    pub wallet_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            chain_name: DEFAULT_CHAIN_NAME.to_string(),
            miner_address: DEFAULT_MINER_ADDRESS.to_string(),
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
            genesis_message: DEFAULT_GENESIS_MESSAGE.to_string(),
            premine: BTreeMap::new(),
            max_block_transactions: DEFAULT_MAX_BLOCK_TRANSACTIONS,
            wallet_file: WALLET_FILE.to_string(),
        }
    }
}

impl Settings {
    /// Layer the optional config file and the process environment over the defaults
    pub fn load(config_file: Option<&Path>) -> Result<Settings> {
        let mut settings = match config_file {
            Some(path) => Self::from_toml_file(path)?,
            None => Settings::default(),
        };
        settings.apply_env(|key| env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_toml_file(path: &Path) -> Result<Settings> {
        let contents = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Settings> {
        Ok(toml::from_str(contents)?)
    }

    /// Override fields from `lookup` (the environment, or a map in tests)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup(CHAIN_NAME_KEY) {
            self.chain_name = name;
        }
        if let Some(address) = lookup(MINER_ADDRESS_KEY) {
            self.miner_address = address;
        }
        if let Some(value) = lookup(DIFFICULTY_KEY) {
            self.difficulty = parse_var(DIFFICULTY_KEY, &value)?;
        }
        if let Some(value) = lookup(MINING_REWARD_KEY) {
            self.mining_reward = parse_var(MINING_REWARD_KEY, &value)?;
        }
        if let Some(message) = lookup(GENESIS_MESSAGE_KEY) {
            self.genesis_message = message;
        }
        if let Some(value) = lookup(PREMINE_KEY) {
            // e.g. DATUM_PREMINE='{"alice": 100}'
            self.premine = serde_json::from_str(&value).map_err(|e| {
                LedgerError::Config(format!("{PREMINE_KEY} must be a JSON object of amounts: {e}"))
            })?;
        }
        if let Some(value) = lookup(MAX_BLOCK_TRANSACTIONS_KEY) {
            self.max_block_transactions = parse_var(MAX_BLOCK_TRANSACTIONS_KEY, &value)?;
        }
        if let Some(file) = lookup(WALLET_FILE_KEY) {
            self.wallet_file = file;
        }
        Ok(())
    }

    pub fn chain_config(&self) -> ChainConfig {
        self.chain_config_for(&self.chain_name)
    }

    /// Chain parameters for `name`; an existing chain keeps what it stored
    pub fn chain_config_for(&self, name: &str) -> ChainConfig {
        ChainConfig {
            name: name.to_string(),
            difficulty: self.difficulty,
            mining_reward: self.mining_reward,
            miner_address: self.miner_address.clone(),
            genesis_message: self.genesis_message.clone(),
            premine: self.premine.clone(),
            max_block_transactions: self.max_block_transactions,
        }
    }

    pub fn chain_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    pub fn wallet_path(&self) -> PathBuf {
        self.data_dir.join(&self.wallet_file)
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| LedgerError::Config(format!("{key}={value}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.chain_name, "main");
        assert_eq!(settings.difficulty, 16);
        assert_eq!(settings.mining_reward, 0);
        assert_eq!(settings.max_block_transactions, 1000);
        assert_eq!(settings.wallet_path(), PathBuf::from("./data/wallets.dat"));
    }

    #[test]
    fn test_toml_overrides_defaults_partially() {
        let settings = Settings::from_toml_str(
            r#"
            chain_name = "audit"
            difficulty = 8

            [premine]
            alice = 100
            "#,
        )
        .unwrap();

        assert_eq!(settings.chain_name, "audit");
        assert_eq!(settings.difficulty, 8);
        assert_eq!(settings.premine.get("alice"), Some(&100));
        assert_eq!(settings.miner_address, "default_miner");
    }

    #[test]
    fn test_env_overrides_toml() {
        let mut settings = Settings::from_toml_str("difficulty = 8").unwrap();
        settings
            .apply_env(lookup(&[
                ("DATUM_DIFFICULTY", "12"),
                ("DATUM_PREMINE", r#"{"bob": 5, "carol": 7}"#),
                ("DATUM_CHAIN", "side"),
            ]))
            .unwrap();

        assert_eq!(settings.difficulty, 12);
        assert_eq!(settings.premine.len(), 2);
        let config = settings.chain_config();
        assert_eq!(config.name, "side");
        assert_eq!(config.premine.get("carol"), Some(&7));
    }

    #[test]
    fn test_bad_values_are_config_errors() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.apply_env(lookup(&[("DATUM_DIFFICULTY", "lots")])),
            Err(LedgerError::Config(_))
        ));
        assert!(matches!(
            settings.apply_env(lookup(&[("DATUM_PREMINE", "[1,2]")])),
            Err(LedgerError::Config(_))
        ));
        assert!(matches!(
            Settings::from_toml_str("difficulty = \"high\""),
            Err(LedgerError::Config(_))
        ));
    }
}
