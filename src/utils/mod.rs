//! Utility functions and helpers
//!
//! Digests, encodings and timestamps used throughout the ledger.

pub mod hashing;
pub mod serialization;

pub use hashing::{
    base58_decode, base58_encode, current_timestamp, hash_file, ripemd160_digest, sha256_digest,
    sha256_hex,
};

pub use serialization::{deserialize, serialize};
