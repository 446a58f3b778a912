use crate::error::Result;
use crate::hash::Hash;
use crate::types::SignedTransaction;
use std::collections::HashMap;
use std::sync::RwLock;

pub trait MempoolStore: Send + Sync {
    fn add(&self, txn: SignedTransaction) -> Result<()>;
    fn remove_by_hash(&self, hash: &Hash) -> Result<()>;
    fn has(&self, hash: &Hash) -> Result<bool>;
    fn get_all(&self) -> Result<Vec<SignedTransaction>>;
    fn get_by_hash(&self, hash: &Hash) -> Result<Option<SignedTransaction>>;
}

#[derive(Default)]
pub struct MemMempoolStore {
    txns: RwLock<HashMap<Hash, SignedTransaction>>,
}

impl MemMempoolStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MempoolStore for MemMempoolStore {
    fn add(&self, txn: SignedTransaction) -> Result<()> {
        let hash = txn.hash();
        self.txns.write().unwrap().entry(hash).or_insert(txn);
        Ok(())
    }

    fn remove_by_hash(&self, hash: &Hash) -> Result<()> {
        self.txns.write().unwrap().remove(hash);
        Ok(())
    }

    fn has(&self, hash: &Hash) -> Result<bool> {
        Ok(self.txns.read().unwrap().contains_key(hash))
    }

    fn get_all(&self) -> Result<Vec<SignedTransaction>> {
        Ok(self.txns.read().unwrap().values().cloned().collect())
    }

    fn get_by_hash(&self, hash: &Hash) -> Result<Option<SignedTransaction>> {
        Ok(self.txns.read().unwrap().get(hash).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::types::Transaction;

    fn sample() -> SignedTransaction {
        let kp = KeyPair::new();
        SignedTransaction::sign(Transaction::reward(kp.address()), &kp)
    }

    #[test]
    fn add_then_has_then_remove() {
        let store = MemMempoolStore::new();
        let txn = sample();
        let hash = txn.hash();
        store.add(txn).unwrap();
        assert!(store.has(&hash).unwrap());
        store.remove_by_hash(&hash).unwrap();
        assert!(!store.has(&hash).unwrap());
    }

    #[test]
    fn adding_twice_is_idempotent() {
        let store = MemMempoolStore::new();
        let txn = sample();
        store.add(txn.clone()).unwrap();
        store.add(txn).unwrap();
        assert_eq!(store.get_all().unwrap().len(), 1);
    }
}
