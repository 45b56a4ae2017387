//! Dead drops: end-to-end encrypted messages carried by the ledger.
//!
//! The sender generates a one-time X25519 key, agrees a secret with the
//! recipient's inbox key and expands it with HKDF-SHA256 into an AES-256-GCM
//! key. Sender address, recipient inbox key and the ephemeral public key are
//! bound in as associated data, so re-addressing a message breaks its tag.

use crate::core::encoding::CanonicalEncoder;
use crate::core::{Ledger, Payload, Transaction, TransactionId, UnsignedTransaction};
use crate::crypto::{
    aead_decrypt, aead_encrypt, derive_symmetric_key, generate_nonce, parse_exchange_key,
    parse_inbox_key, EphemeralExchange, SecureKey, EXCHANGE_KEY_LEN,
};
use crate::error::{LedgerError, Result};
use crate::wallet::Wallet;
use data_encoding::HEXLOWER;
use log::info;
use serde::Serialize;

/// HKDF context label; bump the version if the derivation ever changes
pub const DEAD_DROP_INFO: &[u8] = b"datum/dead-drop/v1";
const AAD_DOMAIN: &[u8] = b"datum/dead-drop/aad";

/// A mined message addressed to an inbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboxEntry {
    pub block_index: u64,
    pub transaction_id: TransactionId,
    pub sender: String,
    pub timestamp: i64,
    pub ciphertext_len: usize,
}

pub struct DeadDrop<'a> {
    ledger: &'a Ledger,
}

impl<'a> DeadDrop<'a> {
    pub fn new(ledger: &'a Ledger) -> DeadDrop<'a> {
        DeadDrop { ledger }
    }

    /// Encrypt `plaintext` for `recipient_inbox_key`, sign it with the
    /// sender's wallet and submit it
    pub fn send(
        &self,
        sender: &Wallet,
        recipient_inbox_key: &str,
        plaintext: &[u8],
    ) -> Result<Transaction> {
        let transaction = seal(sender, recipient_inbox_key, plaintext)?;
        let id = self.ledger.submit(transaction.clone())?;
        info!("Dropped {} encrypted bytes in {id}", plaintext.len());
        Ok(transaction)
    }

    pub fn send_message(
        &self,
        sender: &Wallet,
        recipient_inbox_key: &str,
        plaintext: &[u8],
    ) -> Result<TransactionId> {
        Ok(self.send(sender, recipient_inbox_key, plaintext)?.id())
    }

    /// Decrypt a message found by id, mined or pending
    pub fn receive_message(&self, recipient: &Wallet, transaction_id: &str) -> Result<Vec<u8>> {
        let record = self
            .ledger
            .find_transaction(transaction_id)
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {transaction_id}")))?;
        receive(recipient, &record.transaction)
    }

    /// Mined messages addressed to `inbox_key`, oldest first
    pub fn inbox(&self, inbox_key: &str) -> Result<Vec<InboxEntry>> {
        let inbox_key = HEXLOWER.encode(&parse_inbox_key(inbox_key)?);
        Ok(self.ledger.with_blocks(|blocks| {
            let mut entries = Vec::new();
            for block in blocks {
                for tx in block.get_transactions() {
                    if let Payload::EncryptedMessage {
                        recipient,
                        ciphertext,
                        ..
                    } = tx.get_payload()
                    {
                        if *recipient == inbox_key {
                            entries.push(InboxEntry {
                                block_index: block.get_index(),
                                transaction_id: tx.id(),
                                sender: tx.get_sender().to_string(),
                                timestamp: tx.get_timestamp(),
                                ciphertext_len: ciphertext.len(),
                            });
                        }
                    }
                }
            }
            entries
        }))
    }
}

/// Build and sign an encrypted message transaction without submitting it
pub fn seal(sender: &Wallet, recipient_inbox_key: &str, plaintext: &[u8]) -> Result<Transaction> {
    let recipient_key = parse_inbox_key(recipient_inbox_key)?;
    let recipient_inbox_key = HEXLOWER.encode(&recipient_key);
    let sender_address = sender.get_address();

    let ephemeral = EphemeralExchange::new();
    let ephemeral_public_key = ephemeral.public_key();
    let shared = ephemeral.agree(&recipient_key)?;
    let key = message_key(&shared, &ephemeral_public_key, &recipient_key)?;

    let nonce = generate_nonce();
    let aad = associated_data(&sender_address, &recipient_inbox_key, &ephemeral_public_key);
    let ciphertext = aead_encrypt(&key, &nonce, plaintext, &aad)?;

    UnsignedTransaction::build_message(
        &sender_address,
        &recipient_inbox_key,
        ciphertext,
        nonce.to_vec(),
        ephemeral_public_key.to_vec(),
    )?
    .sign(sender.get_keypair())
}

/// Decrypt a message with the recipient wallet's exchange key. A wrong key
/// or any tampering with the bound fields fails with `Decryption`.
pub fn receive(recipient: &Wallet, transaction: &Transaction) -> Result<Vec<u8>> {
    let (recipient_inbox_key, ciphertext, nonce, ephemeral_public_key) =
        match transaction.get_payload() {
            Payload::EncryptedMessage {
                recipient,
                ciphertext,
                nonce,
                ephemeral_public_key,
            } => (recipient, ciphertext, nonce, ephemeral_public_key),
            Payload::Transfer { .. }
            | Payload::Notarization { .. }
            | Payload::Genesis { .. }
            | Payload::Coinbase { .. } => {
                return Err(LedgerError::InvalidTransaction(format!(
                    "{} is a {}, not a message",
                    transaction.id(),
                    transaction.kind()
                )))
            }
        };

    let ephemeral_key = parse_exchange_key(ephemeral_public_key)?;
    let addressed_to = parse_inbox_key(recipient_inbox_key)?;
    let shared = recipient.get_exchange().derive_shared_secret(&ephemeral_key)?;
    let key = message_key(&shared, &ephemeral_key, &addressed_to)?;
    let aad = associated_data(
        transaction.get_sender(),
        recipient_inbox_key,
        ephemeral_public_key,
    );
    let plaintext = aead_decrypt(&key, nonce, ciphertext, &aad)?;

    // The tag already binds the sender; this checks the sender really signed it.
    transaction.verify()?;
    Ok(plaintext)
}

fn message_key(
    shared: &SecureKey,
    ephemeral_public_key: &[u8; EXCHANGE_KEY_LEN],
    recipient_public_key: &[u8; EXCHANGE_KEY_LEN],
) -> Result<SecureKey> {
    let mut salt = Vec::with_capacity(2 * EXCHANGE_KEY_LEN);
    salt.extend_from_slice(ephemeral_public_key);
    salt.extend_from_slice(recipient_public_key);
    derive_symmetric_key(shared, &salt, DEAD_DROP_INFO)
}

fn associated_data(sender: &str, recipient_inbox_key: &str, ephemeral_public_key: &[u8]) -> Vec<u8> {
    let mut encoder = CanonicalEncoder::new(AAD_DOMAIN);
    encoder
        .put_str(sender)
        .put_str(recipient_inbox_key)
        .put_bytes(ephemeral_public_key);
    encoder.finish()
}
