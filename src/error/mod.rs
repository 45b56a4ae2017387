//! Error handling for the ledger
//!
//! Every core operation returns a typed [`LedgerError`]; nothing is
//! silently defaulted.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// The specific invariant a block broke during chain validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// Block index is not one past its predecessor
    IndexOutOfSequence,
    /// Stored hash does not match the recomputed hash
    BadSelfHash,
    /// `previous_hash` does not equal the predecessor's hash
    BadPreviousHash,
    /// Hash misses the block's recorded target, or the recorded difficulty
    /// is below the chain's
    DifficultyNotMet,
    /// Block 0 does not carry the stored genesis message and allocations
    GenesisMismatch,
    /// A transaction in the block breaks an admission rule
    InvalidContents,
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityViolation::IndexOutOfSequence => write!(f, "index out of sequence"),
            IntegrityViolation::BadSelfHash => write!(f, "stored hash does not match contents"),
            IntegrityViolation::BadPreviousHash => write!(f, "previous hash link is broken"),
            IntegrityViolation::DifficultyNotMet => write!(f, "difficulty target not met"),
            IntegrityViolation::GenesisMismatch => write!(f, "genesis block does not match the chain"),
            IntegrityViolation::InvalidContents => write!(f, "block contains an invalid transaction"),
        }
    }
}

/// Error types for every ledger operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Transaction signature is missing or does not verify
    InvalidSignature(String),
    /// Transfer would overdraw the sender
    InsufficientFunds {
        address: String,
        required: u64,
        available: u64,
    },
    /// Transaction already pending or mined
    DuplicateTransaction(String),
    /// Hash or linkage mismatch; fatal for the chain instance
    ChainIntegrity {
        index: u64,
        violation: IntegrityViolation,
    },
    /// Malformed encoded data (keys, signatures, persisted blocks)
    Encoding(String),
    /// Authenticated decryption failed
    Decryption(String),
    /// Transaction payload breaks a policy rule
    InvalidTransaction(String),
    /// Cryptographic operation errors
    Crypto(String),
    /// Database-related errors
    Database(String),
    /// File I/O errors
    Io(String),
    /// Configuration errors
    Config(String),
    /// Wallet operation errors
    Wallet(String),
    /// Mining errors
    Mining(String),
    /// Lookup of a block, transaction or wallet failed
    NotFound(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::InvalidSignature(msg) => write!(f, "Invalid signature: {msg}"),
            LedgerError::InsufficientFunds {
                address,
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds for {address}: required {required}, available {available}"
                )
            }
            LedgerError::DuplicateTransaction(id) => write!(f, "Duplicate transaction: {id}"),
            LedgerError::ChainIntegrity { index, violation } => {
                write!(f, "Chain integrity error at block {index}: {violation}")
            }
            LedgerError::Encoding(msg) => write!(f, "Encoding error: {msg}"),
            LedgerError::Decryption(msg) => write!(f, "Decryption error: {msg}"),
            LedgerError::InvalidTransaction(msg) => write!(f, "Invalid transaction: {msg}"),
            LedgerError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            LedgerError::Database(msg) => write!(f, "Database error: {msg}"),
            LedgerError::Io(msg) => write!(f, "I/O error: {msg}"),
            LedgerError::Config(msg) => write!(f, "Configuration error: {msg}"),
            LedgerError::Wallet(msg) => write!(f, "Wallet error: {msg}"),
            LedgerError::Mining(msg) => write!(f, "Mining error: {msg}"),
            LedgerError::NotFound(msg) => write!(f, "Not found: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for LedgerError {
    fn from(err: bincode::error::EncodeError) -> Self {
        LedgerError::Encoding(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for LedgerError {
    fn from(err: bincode::error::DecodeError) -> Self {
        LedgerError::Encoding(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_error_names_block_and_violation() {
        let err = LedgerError::ChainIntegrity {
            index: 3,
            violation: IntegrityViolation::BadPreviousHash,
        };
        assert_eq!(
            err.to_string(),
            "Chain integrity error at block 3: previous hash link is broken"
        );
    }

    #[test]
    fn test_insufficient_funds_message() {
        let err = LedgerError::InsufficientFunds {
            address: "alice".to_string(),
            required: 30,
            available: 10,
        };
        assert!(err.to_string().contains("required 30, available 10"));
    }
}
