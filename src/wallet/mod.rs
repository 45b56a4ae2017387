//! Wallet management
//!
//! Key pairs, address derivation and the wallet file. Private keys never
//! enter the ledger.

pub mod encryption;
#[allow(clippy::module_inception)]
pub mod wallet;
pub mod wallets;

pub use wallet::{
    address_from_public_key, convert_address, hash_pub_key, validate_address, Wallet,
    ADDRESS_CHECK_SUM_LEN,
};
pub use wallets::{Wallets, WALLET_FILE};
