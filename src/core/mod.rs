//! Core ledger functionality
//!
//! Transactions, blocks, the canonical encoding they hash under, the ledger
//! engine and the proof-of-work miner that extends it.

pub mod block;
pub mod encoding;
pub mod ledger;
pub mod miner;
pub mod proof_of_work;
pub mod registry;
pub mod transaction;

pub use block::{Block, BlockSummary, GENESIS_PREVIOUS_HASH};
pub use encoding::{CanonicalEncoder, ENCODING_VERSION};
pub use ledger::{
    fold_balance, ChainConfig, ChainPhase, ChainStatus, Ledger, TransactionRecord,
    DEFAULT_DIFFICULTY, DEFAULT_GENESIS_MESSAGE, DEFAULT_MAX_BLOCK_TRANSACTIONS,
    DEFAULT_MINER_ADDRESS, DEFAULT_MINING_REWARD, MAX_DIFFICULTY,
};
pub use miner::{CancelToken, Miner, MAX_STALE_RETRIES};
pub use proof_of_work::{MiningOutcome, ProofOfWork, CHECK_INTERVAL};
pub use registry::ChainRegistry;
pub use transaction::{
    Amount, Payload, Transaction, TransactionId, TransactionKind, UnsignedTransaction,
    COINBASE_SENDER, GENESIS_SENDER,
};
