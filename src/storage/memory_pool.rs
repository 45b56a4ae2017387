use crate::core::{Amount, Transaction, TransactionId};
use std::collections::{BTreeMap, HashMap};

/// Pending transactions in submission order.
///
/// ( K -> sequence, V => (txid_hex, Transaction) ) plus a reverse index by id.
/// The pool has no lock of its own; it lives inside the ledger's state lock.
#[derive(Debug, Default)]
pub struct MemoryPool {
    ordered: BTreeMap<u64, (TransactionId, Transaction)>,
    by_id: HashMap<TransactionId, u64>,
}

impl MemoryPool {
    pub fn new() -> MemoryPool {
        MemoryPool::default()
    }

    pub fn get(&self, txid: &str) -> Option<&Transaction> {
        let sequence = self.by_id.get(txid)?;
        self.ordered.get(sequence).map(|(_, tx)| tx)
    }

    pub fn add(&mut self, sequence: u64, tx: Transaction) {
        let txid = tx.id();
        self.by_id.insert(txid.clone(), sequence);
        self.ordered.insert(sequence, (txid, tx));
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.by_id.contains_key(txid)
    }

    /// Remove by id, returning the sequence it was stored under
    pub fn remove(&mut self, txid: &str) -> Option<u64> {
        let sequence = self.by_id.remove(txid)?;
        self.ordered.remove(&sequence);
        Some(sequence)
    }

    pub fn sequence_of(&self, txid: &str) -> Option<u64> {
        self.by_id.get(txid).copied()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn get_all(&self) -> Vec<Transaction> {
        self.ordered.values().map(|(_, tx)| tx.clone()).collect()
    }

    /// The oldest `limit` transactions
    pub fn first_n(&self, limit: usize) -> Vec<Transaction> {
        self.ordered
            .values()
            .take(limit)
            .map(|(_, tx)| tx.clone())
            .collect()
    }

    /// Sum of pending transfers out of `address`
    pub fn pending_debits(&self, address: &str) -> Amount {
        self.ordered
            .values()
            .map(|(_, tx)| tx.debit_for(address))
            .fold(0, Amount::saturating_add)
    }
}
