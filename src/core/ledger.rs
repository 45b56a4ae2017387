// One Ledger per chain identity. Blocks and mempool sit behind a single
// RwLock so queries see a consistent snapshot; storage is written before the
// in-memory state changes, so a failed write leaves both untouched.

use crate::core::block::{Block, BlockSummary, GENESIS_PREVIOUS_HASH};
use crate::core::miner::Miner;
use crate::core::proof_of_work::ProofOfWork;
use crate::core::transaction::{Amount, Payload, Transaction, TransactionId, UnsignedTransaction};
use crate::error::{IntegrityViolation, LedgerError, Result};
use crate::storage::{ChainMetadata, ChainStore, MemoryPool};
use crate::utils::current_timestamp;
use crate::wallet::Wallet;
use log::{info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const DEFAULT_DIFFICULTY: u32 = 16;
pub const DEFAULT_MINING_REWARD: Amount = 0;
pub const DEFAULT_MINER_ADDRESS: &str = "default_miner";
pub const DEFAULT_GENESIS_MESSAGE: &str = "Datum: the truth ledger begins";
pub const DEFAULT_MAX_BLOCK_TRANSACTIONS: usize = 1000;
/// 256 bits would need a zero hash
pub const MAX_DIFFICULTY: u32 = 255;

/// Parameters of one chain. Everything except the miner address is fixed
/// once the chain exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub name: String,
    pub difficulty: u32,
    pub mining_reward: Amount,
    pub miner_address: String,
    pub genesis_message: String,
    pub premine: BTreeMap<String, Amount>,
    pub max_block_transactions: usize,
}

impl ChainConfig {
    pub fn new(name: &str) -> ChainConfig {
        ChainConfig {
            name: name.to_string(),
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
            miner_address: DEFAULT_MINER_ADDRESS.to_string(),
            genesis_message: DEFAULT_GENESIS_MESSAGE.to_string(),
            premine: BTreeMap::new(),
            max_block_transactions: DEFAULT_MAX_BLOCK_TRANSACTIONS,
        }
    }

    pub fn with_difficulty(mut self, difficulty: u32) -> ChainConfig {
        self.difficulty = difficulty;
        self
    }

    pub fn with_premine(mut self, premine: BTreeMap<String, Amount>) -> ChainConfig {
        self.premine = premine;
        self
    }

    pub fn with_mining_reward(mut self, miner_address: &str, reward: Amount) -> ChainConfig {
        self.miner_address = miner_address.to_string();
        self.mining_reward = reward;
        self
    }

    pub fn with_max_block_transactions(mut self, limit: usize) -> ChainConfig {
        self.max_block_transactions = limit;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let name_ok = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !name_ok {
            return Err(LedgerError::Config(format!(
                "Chain name '{}' must be non-empty ASCII letters, digits, '-' or '_'",
                self.name
            )));
        }
        if self.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::Config(format!(
                "Difficulty {} exceeds {MAX_DIFFICULTY} bits",
                self.difficulty
            )));
        }
        if self.max_block_transactions == 0 {
            return Err(LedgerError::Config(
                "max_block_transactions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn metadata(&self) -> ChainMetadata {
        ChainMetadata {
            name: self.name.clone(),
            difficulty: self.difficulty,
            mining_reward: self.mining_reward,
            genesis_message: self.genesis_message.clone(),
            premine: self.premine.clone(),
            max_block_transactions: self.max_block_transactions as u64,
        }
    }

    /// Stored parameters win over the ones requested
    fn apply_metadata(self, stored: ChainMetadata) -> ChainConfig {
        let config = ChainConfig {
            name: stored.name,
            difficulty: stored.difficulty,
            mining_reward: stored.mining_reward,
            miner_address: self.miner_address.clone(),
            genesis_message: stored.genesis_message,
            premine: stored.premine,
            max_block_transactions: usize::try_from(stored.max_block_transactions)
                .unwrap_or(usize::MAX),
        };
        if config != self {
            warn!(
                "Chain '{}' already exists; using its stored parameters",
                config.name
            );
        }
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainPhase {
    /// Nothing pending
    Created,
    /// Mempool has entries
    Extending,
    /// A block build is in progress
    Mining,
}

impl fmt::Display for ChainPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainPhase::Created => write!(f, "created"),
            ChainPhase::Extending => write!(f, "extending"),
            ChainPhase::Mining => write!(f, "mining"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStatus {
    pub name: String,
    pub phase: ChainPhase,
    pub height: u64,
    pub tip_hash: String,
    pub pending: usize,
    pub difficulty: u32,
}

/// A transaction and where it currently lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub transaction: Transaction,
    /// `None` while still pending
    pub block_index: Option<u64>,
}

struct ChainState {
    blocks: Vec<Block>,
    mempool: MemoryPool,
    /// Ids of mined user transactions
    mined_ids: HashSet<TransactionId>,
}

impl ChainState {
    fn tip(&self) -> &Block {
        // Never empty: genesis is in place before the state is built.
        &self.blocks[self.blocks.len() - 1]
    }

    fn balance_of(&self, address: &str) -> Amount {
        fold_balance(
            self.blocks.iter().flat_map(|block| block.get_transactions()),
            address,
        )
    }

    /// Mempool admission: a verified user transaction, not yet pending or
    /// mined, and for transfers covered by the mined balance minus what
    /// the sender already has pending
    fn admit(&self, transaction: &Transaction) -> Result<TransactionId> {
        if transaction.is_system() {
            return Err(LedgerError::InvalidTransaction(format!(
                "{} transactions cannot be submitted",
                transaction.kind()
            )));
        }
        transaction.verify()?;

        let id = transaction.id();
        if self.mempool.contains(&id) || self.mined_ids.contains(&id) {
            return Err(LedgerError::DuplicateTransaction(id));
        }

        if let Payload::Transfer { amount, .. } = transaction.get_payload() {
            let sender = transaction.get_sender();
            let available = self
                .balance_of(sender)
                .saturating_sub(self.mempool.pending_debits(sender));
            if *amount > available {
                return Err(LedgerError::InsufficientFunds {
                    address: sender.to_string(),
                    required: *amount,
                    available,
                });
            }
        }
        Ok(id)
    }
}

/// Credits minus debits for `address`
pub fn fold_balance<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
    address: &str,
) -> Amount {
    transactions.into_iter().fold(0, |balance: Amount, tx| {
        balance
            .saturating_add(tx.credit_for(address))
            .saturating_sub(tx.debit_for(address))
    })
}

pub(crate) struct MiningSession<'a> {
    _lock: MutexGuard<'a, ()>,
    flag: &'a AtomicBool,
}

impl Drop for MiningSession<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

pub struct Ledger {
    config: ChainConfig,
    store: ChainStore,
    state: RwLock<ChainState>,
    mining_lock: Mutex<()>,
    mining: AtomicBool,
}

impl Ledger {
    /// Open the chain stored at `path`, creating genesis if it is empty
    pub fn open(config: ChainConfig, path: &Path) -> Result<Ledger> {
        config.validate()?;
        let store = ChainStore::open(path)?;
        Self::from_store(config, store)
    }

    /// A chain backed by a temporary database
    pub fn in_memory(config: ChainConfig) -> Result<Ledger> {
        config.validate()?;
        let store = ChainStore::temporary()?;
        Self::from_store(config, store)
    }

    fn from_store(config: ChainConfig, store: ChainStore) -> Result<Ledger> {
        let config = match store.load_metadata()? {
            Some(stored) => config.apply_metadata(stored),
            None => config,
        };

        let mut blocks = store.load_blocks()?;
        if blocks.is_empty() {
            let genesis = Block::genesis(
                &config.genesis_message,
                &config.premine,
                current_timestamp()?,
            );
            store.initialize(&genesis, &config.metadata())?;
            info!(
                "Created chain '{}' with genesis block {} ({} pre-allocations)",
                config.name,
                genesis.get_hash(),
                config.premine.len()
            );
            blocks.push(genesis);
        } else {
            info!("Loading chain '{}' with {} blocks", config.name, blocks.len());
        }
        let mined_ids = validate_blocks(&blocks, &config)?;

        let mut state = ChainState {
            blocks,
            mempool: MemoryPool::new(),
            mined_ids,
        };
        // Pending entries are held to the same rules as fresh submissions.
        let mut dropped = Vec::new();
        for (sequence, transaction) in store.load_mempool()? {
            match state.admit(&transaction) {
                Ok(_) => state.mempool.add(sequence, transaction),
                Err(e) => {
                    warn!("Dropping stored pending transaction {sequence}: {e}");
                    dropped.push(sequence);
                }
            }
        }
        if !dropped.is_empty() {
            store.remove_pending(&dropped)?;
        }
        if !state.mempool.is_empty() {
            info!("Restored {} pending transactions", state.mempool.len());
        }

        Ok(Ledger {
            config,
            store,
            state: RwLock::new(state),
            mining_lock: Mutex::new(()),
            mining: AtomicBool::new(false),
        })
    }

    // A panic mid-update cannot leave a half-written state: storage is
    // written first and the in-memory swap is a handful of infallible steps.
    fn read_state(&self) -> RwLockReadGuard<'_, ChainState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ChainState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Accept a signed user transaction into the mempool
    pub fn submit(&self, transaction: Transaction) -> Result<TransactionId> {
        let mut state = self.write_state();
        let id = state.admit(&transaction).map_err(|e| {
            warn!(
                "Rejected {} from {}: {e}",
                transaction.kind(),
                transaction.get_sender()
            );
            e
        })?;

        let sequence = self.store.insert_pending(&transaction)?;
        info!(
            "Accepted {} {id} into the mempool of '{}'",
            transaction.kind(),
            self.config.name
        );
        state.mempool.add(sequence, transaction);
        Ok(id)
    }

    /// Build, sign and submit a transfer from `wallet`
    pub fn submit_transfer(&self, wallet: &Wallet, to: &str, amount: Amount) -> Result<TransactionId> {
        let transaction = UnsignedTransaction::build_transfer(&wallet.get_address(), to, amount)?
            .sign(wallet.get_keypair())?;
        self.submit(transaction)
    }

    /// Mine the pending transactions into one block
    pub fn mine(&self) -> Result<BlockSummary> {
        Miner::new(self).mine()
    }

    /// Walk the whole chain from genesis
    pub fn validate_chain(&self) -> Result<()> {
        validate_blocks(&self.read_state().blocks, &self.config).map(|_| ())
    }

    /// Mined balance; pending transactions do not count
    pub fn balance_of(&self, address: &str) -> Amount {
        self.read_state().balance_of(address)
    }

    /// Append a mined block on top of the current tip and drop the
    /// transactions it consumed from the mempool
    pub fn append_block(&self, block: Block) -> Result<BlockSummary> {
        let mut state = self.write_state();
        let index = block.get_index();
        let integrity = |violation| LedgerError::ChainIntegrity { index, violation };

        check_block(Some(state.tip()), &block).map_err(integrity)?;
        if block.get_difficulty() < self.config.difficulty {
            return Err(integrity(IntegrityViolation::DifficultyNotMet));
        }

        let ids = check_contents(&block, self.config.mining_reward, &state.mined_ids, |address| {
            state.balance_of(address)
        })?;
        let consumed: Vec<u64> = ids
            .iter()
            .filter_map(|id| state.mempool.sequence_of(id))
            .collect();

        self.store.append_block(&block, &consumed)?;
        for id in ids {
            state.mempool.remove(&id);
            state.mined_ids.insert(id);
        }
        let summary = block.summary();
        info!(
            "Appended block {} ({} transactions) to '{}': {}",
            summary.index, summary.transaction_count, self.config.name, summary.hash
        );
        state.blocks.push(block);
        Ok(summary)
    }

    pub fn dump_chain(&self) -> Vec<Block> {
        self.read_state().blocks.clone()
    }

    /// Run `f` over the mined blocks without copying them
    pub fn with_blocks<R>(&self, f: impl FnOnce(&[Block]) -> R) -> R {
        f(&self.read_state().blocks)
    }

    /// Look a transaction up among mined blocks, then the mempool
    pub fn find_transaction(&self, id: &str) -> Option<TransactionRecord> {
        let state = self.read_state();
        for block in &state.blocks {
            if let Some(tx) = block.get_transactions().iter().find(|tx| tx.id() == id) {
                return Some(TransactionRecord {
                    transaction: tx.clone(),
                    block_index: Some(block.get_index()),
                });
            }
        }
        state.mempool.get(id).map(|tx| TransactionRecord {
            transaction: tx.clone(),
            block_index: None,
        })
    }

    /// Pending transactions in submission order
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.read_state().mempool.get_all()
    }

    pub fn tip(&self) -> Block {
        self.read_state().tip().clone()
    }

    pub fn tip_hash(&self) -> String {
        self.read_state().tip().get_hash().to_string()
    }

    /// Index of the tip block
    pub fn height(&self) -> u64 {
        self.read_state().tip().get_index()
    }

    pub fn status(&self) -> ChainStatus {
        let state = self.read_state();
        let phase = if self.mining.load(Ordering::SeqCst) {
            ChainPhase::Mining
        } else if !state.mempool.is_empty() {
            ChainPhase::Extending
        } else {
            ChainPhase::Created
        };
        ChainStatus {
            name: self.config.name.clone(),
            phase,
            height: state.tip().get_index(),
            tip_hash: state.tip().get_hash().to_string(),
            pending: state.mempool.len(),
            difficulty: self.config.difficulty,
        }
    }

    /// Serialize miners on this ledger; the phase reads `Mining` until the
    /// session is dropped
    pub(crate) fn begin_mining(&self) -> MiningSession<'_> {
        let lock = self.mining_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.mining.store(true, Ordering::SeqCst);
        MiningSession {
            _lock: lock,
            flag: &self.mining,
        }
    }

    /// Next block over the current tip: the oldest pending transactions up
    /// to the batch cap, then the reward if one is configured
    pub(crate) fn build_candidate(&self) -> Result<Block> {
        let state = self.read_state();
        let tip = state.tip();
        let timestamp = current_timestamp()?;

        let mut transactions = state.mempool.first_n(self.config.max_block_transactions);
        if self.config.mining_reward > 0 {
            transactions.push(Transaction::coinbase(
                &self.config.miner_address,
                self.config.mining_reward,
                timestamp,
            ));
        }
        Ok(Block::candidate(
            tip.get_index().saturating_add(1),
            tip.get_hash(),
            transactions,
            self.config.difficulty,
            timestamp,
        ))
    }
}

/// Replay the chain from genesis: linkage and proof of work, the chain's
/// minimum difficulty, the genesis allocations and every block's
/// transaction rules. Returns the ids of all mined user transactions.
fn validate_blocks(blocks: &[Block], config: &ChainConfig) -> Result<HashSet<TransactionId>> {
    let mut previous = None;
    let mut mined_ids = HashSet::new();
    let mut balances: HashMap<String, Amount> = HashMap::new();

    for (position, block) in blocks.iter().enumerate() {
        let index = position as u64;
        let integrity = |violation| LedgerError::ChainIntegrity { index, violation };

        check_block(previous, block).map_err(integrity)?;
        if previous.is_none() {
            let expected =
                Block::genesis(&config.genesis_message, &config.premine, block.get_timestamp());
            if block.get_transactions() != expected.get_transactions() {
                return Err(integrity(IntegrityViolation::GenesisMismatch));
            }
        } else {
            if block.get_difficulty() < config.difficulty {
                return Err(integrity(IntegrityViolation::DifficultyNotMet));
            }
            let ids = check_contents(block, config.mining_reward, &mined_ids, |address| {
                balances.get(address).copied().unwrap_or(0)
            })
            .map_err(|e| {
                warn!("Block {index} of '{}': {e}", config.name);
                integrity(IntegrityViolation::InvalidContents)
            })?;
            mined_ids.extend(ids);
        }

        for tx in block.get_transactions() {
            match tx.get_payload() {
                Payload::Transfer { recipient, amount } => {
                    let sender = balances.entry(tx.get_sender().to_string()).or_insert(0);
                    *sender = sender.saturating_sub(*amount);
                    let credited = balances.entry(recipient.clone()).or_insert(0);
                    *credited = credited.saturating_add(*amount);
                }
                Payload::Coinbase { recipient, amount } => {
                    let credited = balances.entry(recipient.clone()).or_insert(0);
                    *credited = credited.saturating_add(*amount);
                }
                Payload::Notarization { .. }
                | Payload::EncryptedMessage { .. }
                | Payload::Genesis { .. } => {}
            }
        }
        previous = Some(block);
    }
    Ok(mined_ids)
}

/// Transaction rules of a mined block: no genesis payload, at most one
/// reward of exactly `mining_reward`, user transactions verified and new,
/// transfers funded by `balance_of` less earlier spends in the same block.
/// Returns the ids of the user transactions.
fn check_contents(
    block: &Block,
    mining_reward: Amount,
    mined_ids: &HashSet<TransactionId>,
    balance_of: impl Fn(&str) -> Amount,
) -> Result<HashSet<TransactionId>> {
    let index = block.get_index();
    let mut seen = HashSet::new();
    let mut spent: HashMap<&str, Amount> = HashMap::new();
    let mut coinbases = 0;

    for tx in block.get_transactions() {
        match tx.get_payload() {
            Payload::Genesis { .. } => {
                return Err(LedgerError::InvalidTransaction(
                    "genesis transaction outside block 0".to_string(),
                ))
            }
            Payload::Coinbase { amount, .. } => {
                coinbases += 1;
                if coinbases > 1 || *amount != mining_reward {
                    return Err(LedgerError::InvalidTransaction(format!(
                        "block {index} must carry at most one reward of {mining_reward}"
                    )));
                }
                continue;
            }
            Payload::Transfer { amount, .. } => {
                tx.verify()?;
                let sender = tx.get_sender();
                let already = spent.entry(sender).or_insert(0);
                let available = balance_of(sender).saturating_sub(*already);
                if *amount > available {
                    return Err(LedgerError::InsufficientFunds {
                        address: sender.to_string(),
                        required: *amount,
                        available,
                    });
                }
                *already = already.saturating_add(*amount);
            }
            Payload::Notarization { .. } | Payload::EncryptedMessage { .. } => tx.verify()?,
        }

        let id = tx.id();
        if mined_ids.contains(&id) || !seen.insert(id.clone()) {
            return Err(LedgerError::DuplicateTransaction(id));
        }
    }
    Ok(seen)
}

/// Linkage, self hash and proof of work of `block` on top of `previous`
fn check_block(
    previous: Option<&Block>,
    block: &Block,
) -> std::result::Result<(), IntegrityViolation> {
    let (expected_index, expected_previous) = match previous {
        Some(prev) => (prev.get_index().saturating_add(1), prev.get_hash()),
        None => (0, GENESIS_PREVIOUS_HASH),
    };
    if block.get_index() != expected_index {
        return Err(IntegrityViolation::IndexOutOfSequence);
    }
    if block.get_previous_hash() != expected_previous {
        return Err(IntegrityViolation::BadPreviousHash);
    }
    if block.compute_hash() != block.get_hash() {
        return Err(IntegrityViolation::BadSelfHash);
    }
    if !ProofOfWork::validate(block) {
        return Err(IntegrityViolation::DifficultyNotMet);
    }
    Ok(())
}
