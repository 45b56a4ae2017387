//! # Datum - a local truth ledger
//!
//! An append-only, proof-of-work chain of signed records kept in an embedded
//! database. Three kinds of record share the chain:
//!
//! - **Transfers** move value between addresses under account balances
//! - **Notarizations** pin a file's SHA-256 hash to a signer and a timestamp
//! - **Dead-drop messages** carry X25519 + AES-256-GCM sealed payloads that
//!   only the holder of the matching inbox key can open
//!
//! ## Layout
//! - `core/`: canonical encoding, transactions, blocks, the ledger engine and miner
//! - `services/`: notary and dead-drop built on top of the ledger
//! - `storage/`: sled chain store and the ordered memory pool
//! - `crypto/`: signing, key agreement, key derivation and AEAD
//! - `wallet/`: key pairs, addresses and the (optionally sealed) wallet file
//! - `config/`: TOML + environment settings
//! - `cli/`: command-line arguments for the `datum` binary
//!
//! A [`Ledger`] is safe to share between threads; reads run concurrently and
//! only one block build runs at a time.

pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod error;
pub mod services;
pub mod storage;
pub mod utils;
pub mod wallet;

pub use cli::{Command, Opt};
pub use config::Settings;
pub use core::{
    Amount, Block, BlockSummary, CancelToken, ChainConfig, ChainPhase, ChainRegistry, ChainStatus,
    Ledger, Miner, Payload, ProofOfWork, Transaction, TransactionId, TransactionKind,
    TransactionRecord, UnsignedTransaction,
};
pub use error::{IntegrityViolation, LedgerError, Result};
pub use services::{DeadDrop, InboxEntry, NotarizationRecord, Notary, VerificationResult};
pub use wallet::{validate_address, Wallet, Wallets};
