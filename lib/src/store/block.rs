use crate::error::Result;
use crate::hash::Hash;
use crate::types::HashedBlock;
use std::collections::HashMap;
use std::sync::RwLock;

pub trait BlockStore: Send + Sync {
    /// Persists `block` and recomputes the head flag (highest block_num;
    /// ties keep whichever block was stored first). No-op if the block's
    /// mining_hash is already stored.
    fn add_block(&self, block: HashedBlock) -> Result<()>;
    fn get_by_hash(&self, hash: &Hash) -> Result<Option<HashedBlock>>;
    fn has_hash(&self, hash: &Hash) -> Result<bool>;
    fn get_genesis(&self) -> Result<Option<HashedBlock>>;
    fn get_head(&self) -> Result<Option<HashedBlock>>;
    fn get_height(&self) -> Result<u64>;
    /// All stored direct successors of `hash` — more than one on a fork.
    fn get_by_parent_hash(&self, hash: &Hash) -> Result<Vec<HashedBlock>>;
    fn get_by_block_num(&self, block_num: u64) -> Result<Vec<HashedBlock>>;
    /// block_num in `[lo, hi)`.
    fn get_range(&self, lo: u64, hi: u64) -> Result<Vec<HashedBlock>>;
    fn get_all_non_genesis_in_order(&self) -> Result<Vec<HashedBlock>>;
    /// Removes a single off-main-chain block from active storage. Callers
    /// recurse over descendants themselves.
    fn abandon_block(&self, hash: &Hash) -> Result<()>;
}

#[derive(Default)]
struct Inner {
    blocks: HashMap<Hash, HashedBlock>,
    by_parent: HashMap<Hash, Vec<Hash>>,
    by_block_num: HashMap<u64, Vec<Hash>>,
    genesis: Option<Hash>,
    head: Option<Hash>,
    insertion_order: Vec<Hash>,
}

pub struct MemBlockStore {
    inner: RwLock<Inner>,
}

impl MemBlockStore {
    pub fn new() -> Self {
        MemBlockStore {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemBlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore for MemBlockStore {
    fn add_block(&self, block: HashedBlock) -> Result<()> {
        let hash = block.mining_hash();
        let mut inner = self.inner.write().unwrap();
        if inner.blocks.contains_key(&hash) {
            return Ok(());
        }

        let block_num = block.block_num();
        if let Some(parent) = block.parent_mining_hash() {
            inner.by_parent.entry(parent).or_default().push(hash);
        } else {
            inner.genesis = Some(hash);
        }
        inner.by_block_num.entry(block_num).or_default().push(hash);
        inner.insertion_order.push(hash);

        let replace_head = match inner.head {
            None => true,
            Some(current) => {
                let current_num = inner.blocks[&current].block_num();
                block_num > current_num
            }
        };
        if replace_head {
            inner.head = Some(hash);
        }

        inner.blocks.insert(hash, block);
        Ok(())
    }

    fn get_by_hash(&self, hash: &Hash) -> Result<Option<HashedBlock>> {
        Ok(self.inner.read().unwrap().blocks.get(hash).cloned())
    }

    fn has_hash(&self, hash: &Hash) -> Result<bool> {
        Ok(self.inner.read().unwrap().blocks.contains_key(hash))
    }

    fn get_genesis(&self) -> Result<Option<HashedBlock>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.genesis.and_then(|h| inner.blocks.get(&h).cloned()))
    }

    fn get_head(&self) -> Result<Option<HashedBlock>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.head.and_then(|h| inner.blocks.get(&h).cloned()))
    }

    fn get_height(&self) -> Result<u64> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .head
            .map(|h| inner.blocks[&h].block_num())
            .unwrap_or(0))
    }

    fn get_by_parent_hash(&self, hash: &Hash) -> Result<Vec<HashedBlock>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .by_parent
            .get(hash)
            .map(|hashes| hashes.iter().filter_map(|h| inner.blocks.get(h).cloned()).collect())
            .unwrap_or_default())
    }

    fn get_by_block_num(&self, block_num: u64) -> Result<Vec<HashedBlock>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .by_block_num
            .get(&block_num)
            .map(|hashes| hashes.iter().filter_map(|h| inner.blocks.get(h).cloned()).collect())
            .unwrap_or_default())
    }

    fn get_range(&self, lo: u64, hi: u64) -> Result<Vec<HashedBlock>> {
        let inner = self.inner.read().unwrap();
        let mut out: Vec<HashedBlock> = inner
            .blocks
            .values()
            .filter(|b| b.block_num() >= lo && b.block_num() < hi)
            .cloned()
            .collect();
        out.sort_by_key(|b| b.block_num());
        Ok(out)
    }

    fn get_all_non_genesis_in_order(&self) -> Result<Vec<HashedBlock>> {
        let inner = self.inner.read().unwrap();
        let mut out: Vec<HashedBlock> = inner
            .blocks
            .values()
            .filter(|b| b.block_num() > 0)
            .cloned()
            .collect();
        out.sort_by_key(|b| b.block_num());
        Ok(out)
    }

    fn abandon_block(&self, hash: &Hash) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let Some(block) = inner.blocks.remove(hash) else {
            return Ok(());
        };
        if let Some(parent) = block.parent_mining_hash() {
            if let Some(children) = inner.by_parent.get_mut(&parent) {
                children.retain(|h| h != hash);
            }
        }
        if let Some(siblings) = inner.by_block_num.get_mut(&block.block_num()) {
            siblings.retain(|h| h != hash);
        }
        inner.insertion_order.retain(|h| h != hash);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::types::{Block, BlockConfig, SignedTransaction, Transaction};

    fn mine(parent: &HashedBlock, difficulty: u8, claimer: crate::Address) -> HashedBlock {
        let kp = KeyPair::from_seed([9u8; 32]);
        let reward = SignedTransaction::sign(Transaction::reward(claimer), &kp);
        let block = Block::new(
            parent.block_num() + 1,
            Some(parent.mining_hash()),
            BlockConfig { difficulty },
            vec![reward],
        );
        let mut entropy = [0u8; 32];
        for nonce in 0u32.. {
            entropy[..4].copy_from_slice(&nonce.to_le_bytes());
            let hb = HashedBlock::new(block.clone(), entropy, crate::Timestamp::from_millis(1));
            if hb.hash_meets_difficulty() {
                return hb;
            }
        }
        unreachable!()
    }

    #[test]
    fn genesis_is_head_until_a_child_is_added() {
        let store = MemBlockStore::new();
        let genesis = HashedBlock::genesis();
        store.add_block(genesis.clone()).unwrap();
        assert_eq!(store.get_head().unwrap().unwrap().mining_hash(), genesis.mining_hash());
        assert_eq!(store.get_genesis().unwrap().unwrap().mining_hash(), genesis.mining_hash());
    }

    #[test]
    fn adding_higher_block_num_moves_head() {
        let store = MemBlockStore::new();
        let genesis = HashedBlock::genesis();
        store.add_block(genesis.clone()).unwrap();
        let kp = KeyPair::new();
        let child = mine(&genesis, 0, kp.address());
        store.add_block(child.clone()).unwrap();
        assert_eq!(store.get_head().unwrap().unwrap().mining_hash(), child.mining_hash());
        assert_eq!(store.get_height().unwrap(), 1);
    }

    #[test]
    fn duplicate_add_is_a_no_op() {
        let store = MemBlockStore::new();
        let genesis = HashedBlock::genesis();
        store.add_block(genesis.clone()).unwrap();
        store.add_block(genesis.clone()).unwrap();
        assert_eq!(store.get_by_block_num(0).unwrap().len(), 1);
    }

    #[test]
    fn fork_tie_break_keeps_first_stored_head() {
        let store = MemBlockStore::new();
        let genesis = HashedBlock::genesis();
        store.add_block(genesis.clone()).unwrap();
        let kp_a = KeyPair::new();
        let kp_b = KeyPair::new();
        let a = mine(&genesis, 0, kp_a.address());
        let b = mine(&genesis, 0, kp_b.address());
        store.add_block(a.clone()).unwrap();
        store.add_block(b).unwrap();
        assert_eq!(store.get_head().unwrap().unwrap().mining_hash(), a.mining_hash());
        assert_eq!(store.get_by_parent_hash(&genesis.mining_hash()).unwrap().len(), 2);
    }

    #[test]
    fn abandon_block_removes_it_from_indices() {
        let store = MemBlockStore::new();
        let genesis = HashedBlock::genesis();
        store.add_block(genesis.clone()).unwrap();
        let kp = KeyPair::new();
        let child = mine(&genesis, 0, kp.address());
        store.add_block(child.clone()).unwrap();
        store.abandon_block(&child.mining_hash()).unwrap();
        assert!(!store.has_hash(&child.mining_hash()).unwrap());
        assert!(store.get_by_parent_hash(&genesis.mining_hash()).unwrap().is_empty());
    }
}
