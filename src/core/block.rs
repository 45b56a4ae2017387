use crate::core::encoding::{CanonicalEncoder, BLOCK_DOMAIN};
use crate::core::transaction::{Amount, Transaction};
use crate::error::Result;
use crate::utils::{deserialize, serialize, sha256_digest};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const GENESIS_PREVIOUS_HASH: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    index: u64,
    timestamp: i64,
    transactions: Vec<Transaction>,
    previous_hash: String,
    difficulty: u32, // leading zero bits this block was mined against
    nonce: u64,
    hash: String,
}

/// What `mine()` reports back
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSummary {
    pub index: u64,
    pub hash: String,
    pub transaction_count: usize,
}

impl Block {
    /// Block 0: the chain message followed by one coinbase per pre-allocation.
    /// Genesis is not mined; it carries difficulty 0.
    pub fn genesis(message: &str, premine: &BTreeMap<String, Amount>, timestamp: i64) -> Block {
        let mut transactions = vec![Transaction::genesis(message, timestamp)];
        for (address, amount) in premine {
            if *amount > 0 {
                transactions.push(Transaction::coinbase(address, *amount, timestamp));
            }
        }
        let mut block = Block::candidate(0, GENESIS_PREVIOUS_HASH, transactions, 0, timestamp);
        block.hash = block.compute_hash();
        block
    }

    /// Unmined block with nonce 0 and no hash yet
    pub fn candidate(
        index: u64,
        previous_hash: &str,
        transactions: Vec<Transaction>,
        difficulty: u32,
        timestamp: i64,
    ) -> Block {
        Block {
            index,
            timestamp,
            transactions,
            previous_hash: previous_hash.to_string(),
            difficulty,
            nonce: 0,
            hash: String::new(),
        }
    }

    /// Canonical header up to, but excluding, the nonce
    pub fn header_prefix(&self) -> Vec<u8> {
        let mut encoder = CanonicalEncoder::new(BLOCK_DOMAIN);
        encoder
            .put_u64(self.index)
            .put_i64(self.timestamp)
            .put_str(&self.previous_hash)
            .put_u32(self.difficulty)
            .put_u32(self.transactions.len() as u32);
        for transaction in &self.transactions {
            encoder.put_raw(&transaction.id_bytes());
        }
        encoder.finish()
    }

    pub fn hash_with_nonce(prefix: &[u8], nonce: u64) -> Vec<u8> {
        let mut data = Vec::with_capacity(prefix.len() + 8);
        data.extend_from_slice(prefix);
        data.extend(nonce.to_be_bytes());
        sha256_digest(&data)
    }

    /// Recompute the hash from the current contents
    pub fn compute_hash(&self) -> String {
        HEXLOWER.encode(&Self::hash_with_nonce(&self.header_prefix(), self.nonce))
    }

    pub fn seal(mut self, nonce: u64, hash: String) -> Block {
        self.nonce = nonce;
        self.hash = hash;
        self
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            index: self.index,
            hash: self.hash.clone(),
            transaction_count: self.transactions.len(),
        }
    }

    #[cfg(test)]
    pub(crate) fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }

    #[cfg(test)]
    pub(crate) fn set_hash(&mut self, hash: &str) {
        self.hash = hash.to_string();
    }
}
