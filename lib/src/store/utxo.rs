use crate::crypto::Address;
use crate::error::Result;
use crate::hash::Hash;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct UtxoRecord {
    pub transaction_hash: Hash,
    pub output_id: u32,
    pub claimer: Address,
    pub claimed: bool,
}

pub trait UtxoStore: Send + Sync {
    fn add_output(&self, txn_hash: Hash, claimer: Address, output_id: u32) -> Result<()>;
    fn output_is_claimed(&self, txn_hash: &Hash, output_id: u32) -> Result<bool>;
    fn mark_claimed(&self, txn_hash: &Hash, output_id: u32) -> Result<()>;
    fn unclaimed_outputs(&self, address: &Address) -> Result<Vec<UtxoRecord>>;

    /// Reverses `mark_claimed` — used when a block spending this output is
    /// abandoned and the output becomes spendable again.
    fn unmark_claimed(&self, txn_hash: &Hash, output_id: u32) -> Result<()>;
    /// Drops a UTXO record entirely — used when the block that produced it
    /// is abandoned.
    fn remove_output(&self, txn_hash: &Hash, output_id: u32) -> Result<()>;
}

#[derive(Default)]
pub struct MemUtxoStore {
    records: RwLock<HashMap<(Hash, u32), UtxoRecord>>,
}

impl MemUtxoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UtxoStore for MemUtxoStore {
    fn add_output(&self, txn_hash: Hash, claimer: Address, output_id: u32) -> Result<()> {
        self.records.write().unwrap().insert(
            (txn_hash, output_id),
            UtxoRecord {
                transaction_hash: txn_hash,
                output_id,
                claimer,
                claimed: false,
            },
        );
        Ok(())
    }

    fn output_is_claimed(&self, txn_hash: &Hash, output_id: u32) -> Result<bool> {
        Ok(self
            .records
            .read()
            .unwrap()
            .get(&(*txn_hash, output_id))
            .map(|r| r.claimed)
            .unwrap_or(false))
    }

    fn mark_claimed(&self, txn_hash: &Hash, output_id: u32) -> Result<()> {
        if let Some(record) = self
            .records
            .write()
            .unwrap()
            .get_mut(&(*txn_hash, output_id))
        {
            record.claimed = true;
        }
        Ok(())
    }

    fn unclaimed_outputs(&self, address: &Address) -> Result<Vec<UtxoRecord>> {
        Ok(self
            .records
            .read()
            .unwrap()
            .values()
            .filter(|r| !r.claimed && &r.claimer == address)
            .cloned()
            .collect())
    }

    fn unmark_claimed(&self, txn_hash: &Hash, output_id: u32) -> Result<()> {
        if let Some(record) = self
            .records
            .write()
            .unwrap()
            .get_mut(&(*txn_hash, output_id))
        {
            record.claimed = false;
        }
        Ok(())
    }

    fn remove_output(&self, txn_hash: &Hash, output_id: u32) -> Result<()> {
        self.records.write().unwrap().remove(&(*txn_hash, output_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn fresh_output_is_unclaimed_and_listed() {
        let store = MemUtxoStore::new();
        let kp = KeyPair::new();
        let txn_hash = Hash::of_bytes(b"t");
        store.add_output(txn_hash, kp.address(), 0).unwrap();
        assert!(!store.output_is_claimed(&txn_hash, 0).unwrap());
        assert_eq!(store.unclaimed_outputs(&kp.address()).unwrap().len(), 1);
    }

    #[test]
    fn marking_claimed_removes_it_from_unclaimed() {
        let store = MemUtxoStore::new();
        let kp = KeyPair::new();
        let txn_hash = Hash::of_bytes(b"t");
        store.add_output(txn_hash, kp.address(), 0).unwrap();
        store.mark_claimed(&txn_hash, 0).unwrap();
        assert!(store.output_is_claimed(&txn_hash, 0).unwrap());
        assert!(store.unclaimed_outputs(&kp.address()).unwrap().is_empty());
    }
}
