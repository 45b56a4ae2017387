// Transactions are tagged payloads signed by the sender's wallet key.
// Every consumer (signing, balance folding, notarization lookup, display)
// matches on Payload exhaustively, so a new variant is a compile error
// until each of them handles it.

use crate::core::encoding::{CanonicalEncoder, TRANSACTION_DOMAIN};
use crate::crypto::{self, parse_exchange_key, parse_inbox_key, KeyPair, NONCE_LEN};
use crate::error::{LedgerError, Result};
use crate::utils::{current_timestamp, sha256_digest};
use crate::wallet::address_from_public_key;
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base units; transfers are whole, non-negative quantities
pub type Amount = u64;

/// Hex SHA-256 of the full canonical encoding, signature included
pub type TransactionId = String;

pub const GENESIS_SENDER: &str = "genesis";
pub const COINBASE_SENDER: &str = "coinbase";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Transfer,
    Notarization,
    EncryptedMessage,
    Genesis,
    Coinbase,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionKind::Transfer => "transfer",
            TransactionKind::Notarization => "notarization",
            TransactionKind::EncryptedMessage => "message",
            TransactionKind::Genesis => "genesis",
            TransactionKind::Coinbase => "coinbase",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum Payload {
    Transfer {
        recipient: String,
        amount: Amount,
    },
    Notarization {
        owner: String,
        file_hash: String,
        file_label: String,
    },
    EncryptedMessage {
        /// Recipient inbox key (hex X25519 public key)
        recipient: String,
        ciphertext: Vec<u8>,
        nonce: Vec<u8>,
        ephemeral_public_key: Vec<u8>,
    },
    /// Chain metadata; only ever in block 0
    Genesis { message: String },
    /// Genesis pre-allocation or mining reward; never signed
    Coinbase { recipient: String, amount: Amount },
}

impl Payload {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Payload::Transfer { .. } => TransactionKind::Transfer,
            Payload::Notarization { .. } => TransactionKind::Notarization,
            Payload::EncryptedMessage { .. } => TransactionKind::EncryptedMessage,
            Payload::Genesis { .. } => TransactionKind::Genesis,
            Payload::Coinbase { .. } => TransactionKind::Coinbase,
        }
    }

    /// System payloads are minted by the ledger itself and cannot be submitted
    pub fn is_system(&self) -> bool {
        match self {
            Payload::Transfer { .. }
            | Payload::Notarization { .. }
            | Payload::EncryptedMessage { .. } => false,
            Payload::Genesis { .. } | Payload::Coinbase { .. } => true,
        }
    }

    // Tags are part of the frozen canonical layout.
    fn encode_into(&self, encoder: &mut CanonicalEncoder) {
        match self {
            Payload::Transfer { recipient, amount } => {
                encoder.put_u8(1).put_str(recipient).put_u64(*amount);
            }
            Payload::Notarization {
                owner,
                file_hash,
                file_label,
            } => {
                encoder
                    .put_u8(2)
                    .put_str(owner)
                    .put_str(file_hash)
                    .put_str(file_label);
            }
            Payload::EncryptedMessage {
                recipient,
                ciphertext,
                nonce,
                ephemeral_public_key,
            } => {
                encoder
                    .put_u8(3)
                    .put_str(recipient)
                    .put_bytes(ciphertext)
                    .put_bytes(nonce)
                    .put_bytes(ephemeral_public_key);
            }
            Payload::Genesis { message } => {
                encoder.put_u8(4).put_str(message);
            }
            Payload::Coinbase { recipient, amount } => {
                encoder.put_u8(5).put_str(recipient).put_u64(*amount);
            }
        }
    }
}

/// A built transaction waiting for the sender's signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    sender: String,
    timestamp: i64,
    payload: Payload,
}

impl UnsignedTransaction {
    pub fn build_transfer(from: &str, to: &str, amount: Amount) -> Result<UnsignedTransaction> {
        // Zero-value transfers carry no meaning and would only pad blocks.
        if amount == 0 {
            return Err(LedgerError::InvalidTransaction(
                "Transfer amount must be positive".to_string(),
            ));
        }
        if to.is_empty() {
            return Err(LedgerError::InvalidTransaction(
                "Transfer recipient is empty".to_string(),
            ));
        }
        Self::new(
            from,
            Payload::Transfer {
                recipient: to.to_string(),
                amount,
            },
        )
    }

    pub fn build_notarization(
        owner: &str,
        file_hash: &str,
        file_label: &str,
    ) -> Result<UnsignedTransaction> {
        let decoded = HEXLOWER
            .decode(file_hash.as_bytes())
            .map_err(|e| LedgerError::Encoding(format!("File hash is not lowercase hex: {e}")))?;
        if decoded.len() != 32 {
            return Err(LedgerError::Encoding(format!(
                "File hash must be a SHA-256 digest, got {} bytes",
                decoded.len()
            )));
        }
        if file_label.is_empty() {
            return Err(LedgerError::InvalidTransaction(
                "Notarization needs a file label".to_string(),
            ));
        }
        Self::new(
            owner,
            Payload::Notarization {
                owner: owner.to_string(),
                file_hash: file_hash.to_string(),
                file_label: file_label.to_string(),
            },
        )
    }

    pub fn build_message(
        from: &str,
        to: &str,
        ciphertext: Vec<u8>,
        nonce: Vec<u8>,
        ephemeral_public_key: Vec<u8>,
    ) -> Result<UnsignedTransaction> {
        parse_inbox_key(to)?;
        parse_exchange_key(&ephemeral_public_key)?;
        if nonce.len() != NONCE_LEN {
            return Err(LedgerError::Encoding(format!(
                "Message nonce must be {NONCE_LEN} bytes"
            )));
        }
        Self::new(
            from,
            Payload::EncryptedMessage {
                recipient: to.to_string(),
                ciphertext,
                nonce,
                ephemeral_public_key,
            },
        )
    }

    fn new(sender: &str, payload: Payload) -> Result<UnsignedTransaction> {
        Ok(UnsignedTransaction {
            sender: sender.to_string(),
            timestamp: current_timestamp()?,
            payload,
        })
    }

    /// For notarizations the sender is the signer's address, while the
    /// payload keeps the human owner label.
    pub fn sign(self, key_pair: &KeyPair) -> Result<Transaction> {
        let signer = address_from_public_key(key_pair.public_key());
        let sender = match self.payload {
            Payload::Notarization { .. } => signer,
            _ if self.sender == signer => signer,
            _ => {
                return Err(LedgerError::InvalidTransaction(format!(
                    "Sender {} is not the signing key's address {signer}",
                    self.sender
                )))
            }
        };

        let mut transaction = Transaction {
            sender,
            public_key: key_pair.public_key().to_vec(),
            timestamp: self.timestamp,
            payload: self.payload,
            signature: vec![],
        };
        transaction.signature = key_pair.sign(&transaction.signing_bytes())?;
        Ok(transaction)
    }

    pub fn get_payload(&self) -> &Payload {
        &self.payload
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Transaction {
    sender: String,
    public_key: Vec<u8>,
    timestamp: i64,
    payload: Payload,
    signature: Vec<u8>,
}

impl Transaction {
    pub fn genesis(message: &str, timestamp: i64) -> Transaction {
        Self::system(
            GENESIS_SENDER,
            timestamp,
            Payload::Genesis {
                message: message.to_string(),
            },
        )
    }

    pub fn coinbase(recipient: &str, amount: Amount, timestamp: i64) -> Transaction {
        Self::system(
            COINBASE_SENDER,
            timestamp,
            Payload::Coinbase {
                recipient: recipient.to_string(),
                amount,
            },
        )
    }

    fn system(sender: &str, timestamp: i64, payload: Payload) -> Transaction {
        Transaction {
            sender: sender.to_string(),
            public_key: vec![],
            timestamp,
            payload,
            signature: vec![],
        }
    }

    /// Everything the signature covers
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut encoder = CanonicalEncoder::new(TRANSACTION_DOMAIN);
        encoder
            .put_str(&self.sender)
            .put_bytes(&self.public_key)
            .put_i64(self.timestamp);
        self.payload.encode_into(&mut encoder);
        encoder.finish()
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = self.signing_bytes();
        bytes.extend((self.signature.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.signature);
        bytes
    }

    pub fn id_bytes(&self) -> Vec<u8> {
        sha256_digest(&self.canonical_bytes())
    }

    pub fn id(&self) -> TransactionId {
        HEXLOWER.encode(&self.id_bytes())
    }

    pub fn verify(&self) -> Result<()> {
        if address_from_public_key(&self.public_key) != self.sender {
            return Err(LedgerError::InvalidSignature(format!(
                "sender {} is not derived from the embedded public key",
                self.sender
            )));
        }
        self.verify_with_key(&self.public_key)
    }

    /// Check the signature against a specific public key
    pub fn verify_with_key(&self, public_key: &[u8]) -> Result<()> {
        if self.signature.is_empty() {
            return Err(LedgerError::InvalidSignature(
                "transaction is unsigned".to_string(),
            ));
        }
        if crypto::verify(public_key, &self.signing_bytes(), &self.signature)? {
            Ok(())
        } else {
            Err(LedgerError::InvalidSignature(format!(
                "signature does not verify for transaction {}",
                self.id()
            )))
        }
    }

    /// Amount this transaction moves out of `address`
    pub fn debit_for(&self, address: &str) -> Amount {
        match &self.payload {
            Payload::Transfer { amount, .. } if self.sender == address => *amount,
            Payload::Transfer { .. }
            | Payload::Notarization { .. }
            | Payload::EncryptedMessage { .. }
            | Payload::Genesis { .. }
            | Payload::Coinbase { .. } => 0,
        }
    }

    /// Amount this transaction moves into `address`
    pub fn credit_for(&self, address: &str) -> Amount {
        match &self.payload {
            Payload::Transfer { recipient, amount } | Payload::Coinbase { recipient, amount }
                if recipient == address =>
            {
                *amount
            }
            Payload::Transfer { .. }
            | Payload::Coinbase { .. }
            | Payload::Notarization { .. }
            | Payload::EncryptedMessage { .. }
            | Payload::Genesis { .. } => 0,
        }
    }

    pub fn get_sender(&self) -> &str {
        self.sender.as_str()
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_payload(&self) -> &Payload {
        &self.payload
    }

    pub fn get_signature(&self) -> &[u8] {
        self.signature.as_slice()
    }

    pub fn kind(&self) -> TransactionKind {
        self.payload.kind()
    }

    pub fn is_system(&self) -> bool {
        self.payload.is_system()
    }

    /// One-line description for logs and the chain dump
    pub fn summary(&self) -> String {
        match &self.payload {
            Payload::Transfer { recipient, amount } => {
                format!("transfer {amount} {} -> {recipient}", self.sender)
            }
            Payload::Notarization {
                owner,
                file_hash,
                file_label,
            } => format!("notarization '{file_label}' by {owner} ({file_hash})"),
            Payload::EncryptedMessage {
                recipient,
                ciphertext,
                ..
            } => format!(
                "message {} -> {recipient} ({} bytes)",
                self.sender,
                ciphertext.len()
            ),
            Payload::Genesis { message } => format!("genesis \"{message}\""),
            Payload::Coinbase { recipient, amount } => format!("coinbase {amount} -> {recipient}"),
        }
    }
}
