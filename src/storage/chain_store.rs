//! sled persistence for one chain.
//!
//! | Tree      | Key               | Value                  |
//! |-----------|-------------------|------------------------|
//! | `blocks`  | index (8B BE)     | bincode `Block`        |
//! | `mempool` | sequence (8B BE)  | bincode `Transaction`  |
//! | `meta`    | `chain`           | bincode `ChainMetadata`|
//!
//! Big-endian keys make sled's lexicographic order match numeric order, so
//! iterating a tree yields blocks by index and pending transactions in
//! submission order.

use crate::core::{Amount, Block, Transaction};
use crate::error::{LedgerError, Result};
use crate::utils::{deserialize, serialize};
use serde::{Deserialize, Serialize};
use sled::transaction::TransactionError;
use sled::{Db, Transactional, Tree};
use std::collections::BTreeMap;
use std::path::Path;

const BLOCKS_TREE: &str = "blocks";
const MEMPOOL_TREE: &str = "mempool";
const META_TREE: &str = "meta";
const CHAIN_METADATA_KEY: &str = "chain";

/// Consensus parameters fixed when the chain was created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct ChainMetadata {
    pub name: String,
    pub difficulty: u32,
    pub mining_reward: Amount,
    pub genesis_message: String,
    pub premine: BTreeMap<String, Amount>,
    pub max_block_transactions: u64,
}

pub struct ChainStore {
    db: Db,
    blocks: Tree,
    mempool: Tree,
    meta: Tree,
}

impl ChainStore {
    pub fn open(path: &Path) -> Result<ChainStore> {
        let db = sled::open(path)
            .map_err(|e| LedgerError::Database(format!("Failed to open {}: {e}", path.display())))?;
        Self::from_db(db)
    }

    /// Scratch database removed when dropped
    pub fn temporary() -> Result<ChainStore> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| LedgerError::Database(format!("Failed to open temporary database: {e}")))?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<ChainStore> {
        Ok(ChainStore {
            blocks: db.open_tree(BLOCKS_TREE)?,
            mempool: db.open_tree(MEMPOOL_TREE)?,
            meta: db.open_tree(META_TREE)?,
            db,
        })
    }

    pub fn load_metadata(&self) -> Result<Option<ChainMetadata>> {
        match self.meta.get(CHAIN_METADATA_KEY)? {
            Some(bytes) => Ok(Some(deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All blocks in index order. Any block that fails to decode fails the
    /// whole load.
    pub fn load_blocks(&self) -> Result<Vec<Block>> {
        let mut blocks = Vec::with_capacity(self.blocks.len());
        for entry in self.blocks.iter() {
            let (key, value) = entry?;
            let block = Block::deserialize(&value).map_err(|e| {
                LedgerError::Encoding(format!("Block at key {} is corrupt: {e}", hex::encode(&key)))
            })?;
            blocks.push(block);
        }
        Ok(blocks)
    }

    /// Pending transactions with their sequence numbers, oldest first
    pub fn load_mempool(&self) -> Result<Vec<(u64, Transaction)>> {
        let mut pending = Vec::with_capacity(self.mempool.len());
        for entry in self.mempool.iter() {
            let (key, value) = entry?;
            let sequence = decode_key(&key)?;
            let transaction: Transaction = deserialize(&value).map_err(|e| {
                LedgerError::Encoding(format!("Pending transaction {sequence} is corrupt: {e}"))
            })?;
            pending.push((sequence, transaction));
        }
        Ok(pending)
    }

    /// Write genesis and the chain metadata together
    pub fn initialize(&self, genesis: &Block, metadata: &ChainMetadata) -> Result<()> {
        let key = genesis.get_index().to_be_bytes();
        let block_data = genesis.serialize()?;
        let meta_data = serialize(metadata)?;

        (&self.blocks, &self.meta)
            .transaction(|(blocks, meta)| {
                blocks.insert(&key[..], block_data.as_slice())?;
                meta.insert(CHAIN_METADATA_KEY, meta_data.as_slice())?;
                Ok(())
            })
            .map_err(|e: TransactionError| {
                LedgerError::Database(format!("Failed to write genesis: {e}"))
            })?;
        self.db.flush()?;
        Ok(())
    }

    /// Persist a pending transaction and return its sequence number
    pub fn insert_pending(&self, transaction: &Transaction) -> Result<u64> {
        let sequence = self.db.generate_id()?;
        self.mempool
            .insert(&sequence.to_be_bytes()[..], serialize(transaction)?)?;
        self.db.flush()?;
        Ok(sequence)
    }

    /// Discard pending entries that no longer pass admission
    pub fn remove_pending(&self, sequences: &[u64]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for sequence in sequences {
            batch.remove(&sequence.to_be_bytes()[..]);
        }
        self.mempool.apply_batch(batch)?;
        self.db.flush()?;
        Ok(())
    }

    /// Append a block and drop the pending entries it consumed, atomically
    pub fn append_block(&self, block: &Block, consumed: &[u64]) -> Result<()> {
        let key = block.get_index().to_be_bytes();
        let block_data = block.serialize()?;

        (&self.blocks, &self.mempool)
            .transaction(|(blocks, mempool)| {
                blocks.insert(&key[..], block_data.as_slice())?;
                for sequence in consumed {
                    mempool.remove(sequence.to_be_bytes().to_vec())?;
                }
                Ok(())
            })
            .map_err(|e: TransactionError| {
                LedgerError::Database(format!("Failed to append block {}: {e}", block.get_index()))
            })?;
        self.db.flush()?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn raw_blocks(&self) -> &Tree {
        &self.blocks
    }
}

fn decode_key(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| LedgerError::Encoding(format!("Bad sequence key of {} bytes", key.len())))?;
    Ok(u64::from_be_bytes(bytes))
}
