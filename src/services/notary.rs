//! File notarization on top of the ledger.
//!
//! A notarization records the SHA-256 of a file's raw bytes under a label
//! (normally the file name). Verification only trusts mined records.

use crate::core::{Block, Ledger, Payload, Transaction, TransactionId, UnsignedTransaction};
use crate::error::{LedgerError, Result};
use crate::utils::{hash_file, sha256_hex};
use crate::wallet::Wallet;
use log::info;
use serde::Serialize;
use std::path::Path;

/// One mined notarization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotarizationRecord {
    pub block_index: u64,
    pub transaction_id: TransactionId,
    pub owner: String,
    /// Address of the signing wallet
    pub signer: String,
    pub file_hash: String,
    pub file_label: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum VerificationResult {
    /// These exact bytes were notarized; earliest record wins
    Verified {
        first_seen_block_index: u64,
        owner: String,
        timestamp: i64,
    },
    /// The label is known but was recorded with different bytes
    Modified {
        latest_block_index: u64,
        recorded_hash: String,
    },
    NotFound,
}

pub struct Notary<'a> {
    ledger: &'a Ledger,
}

impl<'a> Notary<'a> {
    pub fn new(ledger: &'a Ledger) -> Notary<'a> {
        Notary { ledger }
    }

    /// Sign and submit an attestation of `file_bytes`
    pub fn notarize(
        &self,
        wallet: &Wallet,
        owner: &str,
        file_label: &str,
        file_bytes: &[u8],
    ) -> Result<Transaction> {
        self.submit(wallet, owner, file_label, &sha256_hex(file_bytes))
    }

    /// Streams the file from disk; the file name becomes the label
    pub fn notarize_file(&self, wallet: &Wallet, owner: &str, path: &Path) -> Result<Transaction> {
        let file_hash = hash_file(path)?;
        self.submit(wallet, owner, &file_label(path)?, &file_hash)
    }

    fn submit(
        &self,
        wallet: &Wallet,
        owner: &str,
        file_label: &str,
        file_hash: &str,
    ) -> Result<Transaction> {
        let transaction = UnsignedTransaction::build_notarization(owner, file_hash, file_label)?
            .sign(wallet.get_keypair())?;
        let id = self.ledger.submit(transaction.clone())?;
        info!("Notarized '{file_label}' for {owner} in {id}");
        Ok(transaction)
    }

    pub fn verify(&self, file_label: Option<&str>, file_bytes: &[u8]) -> VerificationResult {
        self.verify_digest(file_label, &sha256_hex(file_bytes))
    }

    pub fn verify_file(&self, path: &Path) -> Result<VerificationResult> {
        let file_hash = hash_file(path)?;
        Ok(self.verify_digest(Some(&file_label(path)?), &file_hash))
    }

    fn verify_digest(&self, file_label: Option<&str>, file_hash: &str) -> VerificationResult {
        let records = self.records();
        if let Some(first) = records.iter().find(|record| record.file_hash == file_hash) {
            return VerificationResult::Verified {
                first_seen_block_index: first.block_index,
                owner: first.owner.clone(),
                timestamp: first.timestamp,
            };
        }

        let latest = file_label.and_then(|label| {
            records
                .iter()
                .rev()
                .find(|record| record.file_label == label)
        });
        match latest {
            Some(record) => VerificationResult::Modified {
                latest_block_index: record.block_index,
                recorded_hash: record.file_hash.clone(),
            },
            None => VerificationResult::NotFound,
        }
    }

    /// Every mined notarization of `file_label`, oldest first
    pub fn history(&self, file_label: &str) -> Vec<NotarizationRecord> {
        self.records()
            .into_iter()
            .filter(|record| record.file_label == file_label)
            .collect()
    }

    /// All mined notarizations in chain order
    pub fn records(&self) -> Vec<NotarizationRecord> {
        self.ledger.with_blocks(|blocks| {
            blocks.iter().flat_map(records_in_block).collect()
        })
    }
}

fn records_in_block(block: &Block) -> Vec<NotarizationRecord> {
    block
        .get_transactions()
        .iter()
        .filter_map(|tx| match tx.get_payload() {
            Payload::Notarization {
                owner,
                file_hash,
                file_label,
            } => Some(NotarizationRecord {
                block_index: block.get_index(),
                transaction_id: tx.id(),
                owner: owner.clone(),
                signer: tx.get_sender().to_string(),
                file_hash: file_hash.clone(),
                file_label: file_label.clone(),
                timestamp: tx.get_timestamp(),
            }),
            Payload::Transfer { .. }
            | Payload::EncryptedMessage { .. }
            | Payload::Genesis { .. }
            | Payload::Coinbase { .. } => None,
        })
        .collect()
}

fn file_label(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| LedgerError::Io(format!("{} has no usable file name", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChainConfig;

    fn setup() -> (Ledger, Wallet) {
        let ledger = Ledger::in_memory(ChainConfig::new("notary").with_difficulty(4)).unwrap();
        (ledger, Wallet::new().unwrap())
    }

    #[test]
    fn test_pending_notarization_is_not_verified() {
        let (ledger, wallet) = setup();
        let notary = Notary::new(&ledger);
        notary
            .notarize(&wallet, "Alice", "contract.pdf", b"v1")
            .unwrap();

        assert_eq!(
            notary.verify(Some("contract.pdf"), b"v1"),
            VerificationResult::NotFound
        );
    }

    #[test]
    fn test_verified_then_modified() {
        let (ledger, wallet) = setup();
        let notary = Notary::new(&ledger);
        let tx = notary
            .notarize(&wallet, "Alice", "contract.pdf", b"v1")
            .unwrap();
        ledger.mine().unwrap();

        match notary.verify(Some("contract.pdf"), b"v1") {
            VerificationResult::Verified {
                first_seen_block_index,
                owner,
                timestamp,
            } => {
                assert_eq!(first_seen_block_index, 1);
                assert_eq!(owner, "Alice");
                assert_eq!(timestamp, tx.get_timestamp());
            }
            other => panic!("expected Verified, got {other:?}"),
        }

        assert_eq!(
            notary.verify(Some("contract.pdf"), b"v2"),
            VerificationResult::Modified {
                latest_block_index: 1,
                recorded_hash: sha256_hex(b"v1"),
            }
        );
        // Without a label there is nothing to compare against
        assert_eq!(notary.verify(None, b"v2"), VerificationResult::NotFound);
    }

    #[test]
    fn test_history_is_oldest_first() {
        let (ledger, wallet) = setup();
        let notary = Notary::new(&ledger);
        notary.notarize(&wallet, "Alice", "a.txt", b"one").unwrap();
        ledger.mine().unwrap();
        notary.notarize(&wallet, "Alice", "a.txt", b"two").unwrap();
        notary.notarize(&wallet, "Bob", "b.txt", b"other").unwrap();
        ledger.mine().unwrap();

        let history = notary.history("a.txt");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].file_hash, sha256_hex(b"one"));
        assert_eq!(history[1].file_hash, sha256_hex(b"two"));
        assert_eq!(history[1].block_index, 2);
        assert_eq!(history[0].signer, wallet.get_address());
    }

    #[test]
    fn test_notarize_and_verify_file_on_disk() {
        let (ledger, wallet) = setup();
        let notary = Notary::new(&ledger);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, b"quarterly numbers").unwrap();

        let tx = notary.notarize_file(&wallet, "Alice", &path).unwrap();
        ledger.mine().unwrap();
        assert!(matches!(
            notary.verify_file(&path).unwrap(),
            VerificationResult::Verified { .. }
        ));
        assert!(matches!(
            tx.get_payload(),
            Payload::Notarization { file_label, .. } if file_label == "report.txt"
        ));

        std::fs::write(&path, b"restated numbers").unwrap();
        assert!(matches!(
            notary.verify_file(&path).unwrap(),
            VerificationResult::Modified { .. }
        ));
    }
}
