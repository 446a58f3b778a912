use crate::hash::Hash;
use crate::timestamp::Timestamp;
use crate::types::SignedTransaction;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct BlockConfig {
    pub difficulty: u8,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct Block {
    pub block_num: u64,
    pub parent_mining_hash: Option<Hash>,
    pub config: BlockConfig,
    pub transactions: Vec<SignedTransaction>,
}

impl Block {
    pub fn new(
        block_num: u64,
        parent_mining_hash: Option<Hash>,
        config: BlockConfig,
        transactions: Vec<SignedTransaction>,
    ) -> Self {
        Block {
            block_num,
            parent_mining_hash,
            config,
            transactions,
        }
    }

    /// SHA-256 of canonical(Block) — the half of the mining hash that
    /// doesn't depend on mining_entropy, so it's computed once per search.
    pub fn content_hash(&self) -> Hash {
        Hash::of(self)
    }

    pub fn reward_transaction(&self) -> Option<&SignedTransaction> {
        self.transactions.iter().find(|t| t.is_reward())
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct HashedBlock {
    pub block: Block,
    pub mining_entropy: [u8; 32],
    pub mining_timestamp: Timestamp,
}

impl HashedBlock {
    pub fn new(block: Block, mining_entropy: [u8; 32], mining_timestamp: Timestamp) -> Self {
        HashedBlock {
            block,
            mining_entropy,
            mining_timestamp,
        }
    }

    /// SHA-256(SHA-256(canonical(Block)) ‖ mining_entropy).
    pub fn mining_hash(&self) -> Hash {
        let mut bytes = self.block.content_hash().as_bytes().to_vec();
        bytes.extend_from_slice(&self.mining_entropy);
        Hash::of_bytes(&bytes)
    }

    pub fn hash_meets_difficulty(&self) -> bool {
        self.mining_hash()
            .meets_difficulty(self.block.config.difficulty as u16)
    }

    pub fn parent_mining_hash(&self) -> Option<Hash> {
        self.block.parent_mining_hash
    }

    pub fn block_num(&self) -> u64 {
        self.block.block_num
    }

    /// The deterministic, network-wide genesis block: block_num 0, no
    /// parent, empty transaction list, difficulty 0, all-zero entropy and
    /// the unix epoch as mining_timestamp — every node must derive the
    /// same mining_hash for it without coordination.
    pub fn genesis() -> Self {
        let block = Block::new(0, None, BlockConfig { difficulty: 0 }, vec![]);
        HashedBlock::new(block, [0u8; 32], Timestamp::from_millis(0))
    }
}

#[cfg(test)]
mod tests;
