//! Sole authority for accepting blocks and transactions: validation, head
//! tracking, fork reorganization, abandonment, UTXO updates, mempool
//! cleanup. Generic over the store traits so the same engine runs against
//! in-memory stores in tests and durable stores in the node binary.

use crate::difficulty;
use crate::error::{ChainError, Result};
use crate::hash::Hash;
use crate::store::{BlockStore, MempoolStore, UtxoStore};
use crate::timestamp::Timestamp;
use crate::types::{HashedBlock, SignedTransaction, TransactionInput, TransactionOutput};
use crate::{Amount, ABANDONMENT_DEPTH, REWARD_UNITS};
use std::collections::HashSet;

pub struct ChainEngine<B: BlockStore, T: MempoolStore, U: UtxoStore> {
    blocks: B,
    mempool: T,
    utxos: U,
}

impl<B: BlockStore, T: MempoolStore, U: UtxoStore> ChainEngine<B, T, U> {
    pub fn new(blocks: B, mempool: T, utxos: U) -> Self {
        ChainEngine { blocks, mempool, utxos }
    }

    pub fn blocks(&self) -> &B {
        &self.blocks
    }

    pub fn mempool(&self) -> &T {
        &self.mempool
    }

    pub fn utxos(&self) -> &U {
        &self.utxos
    }

    pub fn get_head(&self) -> Result<Option<HashedBlock>> {
        self.blocks.get_head()
    }

    pub fn get_genesis(&self) -> Result<Option<HashedBlock>> {
        self.blocks.get_genesis()
    }

    /// Required difficulty for a block that would extend `parent`.
    pub fn required_difficulty(&self, parent: &HashedBlock) -> Result<u8> {
        let segment_timestamps = match difficulty::segment_range(parent.block_num()) {
            Some((lo, hi)) => Some(self.segment_timestamps(parent, lo, hi)?),
            None => None,
        };
        Ok(difficulty::required_difficulty(
            parent.block_num(),
            parent.block.config.difficulty,
            segment_timestamps.as_deref(),
        ))
    }

    fn segment_timestamps(&self, parent: &HashedBlock, seg_start: u64, seg_stop: u64) -> Result<Vec<Timestamp>> {
        let _ = seg_stop;
        let mut timestamps = vec![parent.mining_timestamp];
        let mut current = parent.clone();
        while current.block_num() > seg_start {
            let parent_hash = current
                .parent_mining_hash()
                .ok_or_else(|| ChainError::store("ran off the start of the chain collecting segment timestamps"))?;
            current = self
                .blocks
                .get_by_hash(&parent_hash)?
                .ok_or_else(|| ChainError::store("missing ancestor while collecting segment timestamps"))?;
            timestamps.push(current.mining_timestamp);
        }
        timestamps.reverse();
        Ok(timestamps)
    }

    /// Hashes reachable by walking parent links back from the head.
    fn master_chain(&self) -> Result<HashSet<Hash>> {
        let mut set = HashSet::new();
        let Some(head) = self.blocks.get_head()? else {
            return Ok(set);
        };
        let mut current = head;
        set.insert(current.mining_hash());
        while let Some(parent_hash) = current.parent_mining_hash() {
            set.insert(parent_hash);
            match self.blocks.get_by_hash(&parent_hash)? {
                Some(b) => current = b,
                None => break,
            }
        }
        Ok(set)
    }

    pub fn add_block(&self, hb: HashedBlock) -> Result<()> {
        let hash = hb.mining_hash();
        if self.blocks.has_hash(&hash)? {
            return Ok(());
        }
        self.validate_block(&hb)?;
        self.persist_block(&hb)?;
        self.abandon_blocks()?;
        Ok(())
    }

    fn persist_block(&self, hb: &HashedBlock) -> Result<()> {
        self.blocks.add_block(hb.clone())?;
        for txn in &hb.block.transactions {
            let txn_hash = txn.hash();
            for output in &txn.transaction.outputs {
                self.utxos.add_output(txn_hash, output.recipient, output.output_id)?;
            }
            for input in &txn.transaction.inputs {
                self.utxos.mark_claimed(&input.output_transaction_hash, input.output_id)?;
            }
            self.mempool.remove_by_hash(&txn_hash)?;
        }
        Ok(())
    }

    fn validate_block(&self, hb: &HashedBlock) -> Result<()> {
        if hb.block_num() == 0 {
            if hb.parent_mining_hash().is_some() {
                return Err(ChainError::invalid_block("genesis must have no parent"));
            }
            if !hb.block.transactions.is_empty() {
                return Err(ChainError::invalid_block("genesis must have no transactions"));
            }
            if hb.block.config.difficulty != 0 {
                return Err(ChainError::invalid_block("genesis difficulty must be 0"));
            }
            return Ok(());
        }

        let parent_hash = hb
            .parent_mining_hash()
            .ok_or_else(|| ChainError::invalid_block("non-genesis block must have a parent"))?;
        let parent = self
            .blocks
            .get_by_hash(&parent_hash)?
            .ok_or_else(|| ChainError::UnknownParent {
                parent_hash: parent_hash.to_hex(),
            })?;

        // A brand-new leaf block is only ever "in the master chain" by
        // becoming the head outright; any candidate that would land at or
        // below the current head and is already ABANDONMENT_DEPTH behind
        // it is a resurrection of a dead branch.
        if let Some(head) = self.blocks.get_head()? {
            if hb.block_num() <= head.block_num()
                && head.block_num() - hb.block_num() >= ABANDONMENT_DEPTH
            {
                return Err(ChainError::invalid_block(
                    "branch is already eligible for abandonment",
                ));
            }
        }

        if hb.block_num() != parent.block_num() + 1 {
            return Err(ChainError::invalid_block("block_num must be parent.block_num + 1"));
        }

        let required = self.required_difficulty(&parent)?;
        if hb.block.config.difficulty != required {
            return Err(ChainError::DifficultyMismatch {
                expected: required,
                actual: hb.block.config.difficulty,
            });
        }

        if !hb.hash_meets_difficulty() {
            return Err(ChainError::invalid_block("mining_hash does not meet declared difficulty"));
        }

        let reward_count = hb.block.transactions.iter().filter(|t| t.is_reward()).count();
        if reward_count != 1 {
            return Err(ChainError::invalid_block("block must contain exactly one reward transaction"));
        }

        for txn in &hb.block.transactions {
            self.validate_transaction(txn)?;
        }

        Ok(())
    }

    /// Re-checks a transaction against current store state without
    /// touching the mempool — used by the miner to drop stale candidates
    /// when assembling a block.
    pub fn revalidate(&self, txn: &SignedTransaction) -> Result<()> {
        self.validate_transaction(txn)
    }

    pub fn add_outstanding_transaction(&self, txn: SignedTransaction) -> Result<()> {
        let hash = txn.hash();
        if self.mempool.has(&hash)? {
            return Ok(());
        }
        self.validate_transaction(&txn)?;
        self.mempool.add(txn)?;
        Ok(())
    }

    fn validate_transaction(&self, txn: &SignedTransaction) -> Result<()> {
        if !txn.signature_is_valid() {
            return Err(ChainError::BadSignature);
        }

        if txn.is_reward() {
            let output = &txn.transaction.outputs[0];
            if output.amount != Amount::units(REWARD_UNITS) {
                return Err(ChainError::invalid_transaction("reward amount must equal REWARD_UNITS"));
            }
            return Ok(());
        }

        if txn.transaction.inputs.is_empty() {
            return Err(ChainError::invalid_transaction("non-reward transaction must have inputs"));
        }

        let mut input_amounts = Vec::with_capacity(txn.transaction.inputs.len());
        for input in &txn.transaction.inputs {
            let output = self.resolve_output(input)?;
            if output.recipient != txn.transaction.claimer {
                return Err(ChainError::invalid_transaction(
                    "referenced output does not name this transaction's claimer",
                ));
            }
            if self.utxos.output_is_claimed(&input.output_transaction_hash, input.output_id)? {
                return Err(ChainError::invalid_transaction("referenced output already claimed"));
            }
            input_amounts.push(output.amount);
        }

        let input_sum = Amount::sum(input_amounts);
        let output_sum = Amount::sum(txn.transaction.outputs.iter().map(|o| o.amount));
        if input_sum != output_sum {
            return Err(ChainError::invalid_transaction("input and output amounts do not match"));
        }

        Ok(())
    }

    fn resolve_output(&self, input: &TransactionInput) -> Result<TransactionOutput> {
        let block = self
            .blocks
            .get_by_hash(&input.output_block_hash)?
            .ok_or_else(|| ChainError::invalid_transaction("referenced block not found"))?;
        let txn = block
            .block
            .transactions
            .iter()
            .find(|t| t.hash() == input.output_transaction_hash)
            .ok_or_else(|| ChainError::invalid_transaction("referenced transaction not found in block"))?;
        txn.transaction
            .outputs
            .iter()
            .find(|o| o.output_id == input.output_id)
            .cloned()
            .ok_or_else(|| ChainError::invalid_transaction("referenced output not found"))
    }

    /// Sweeps blocks at `head.block_num - ABANDONMENT_DEPTH` that have
    /// fallen off the master chain, recursively abandoning their
    /// descendants, and returns revalidating non-reward transactions to
    /// the mempool.
    pub fn abandon_blocks(&self) -> Result<()> {
        let Some(head) = self.blocks.get_head()? else {
            return Ok(());
        };
        if head.block_num() < ABANDONMENT_DEPTH {
            return Ok(());
        }
        let target_height = head.block_num() - ABANDONMENT_DEPTH;
        let master_chain = self.master_chain()?;
        for candidate in self.blocks.get_by_block_num(target_height)? {
            self.maybe_abandon(&candidate, &master_chain, head.block_num())?;
        }
        Ok(())
    }

    fn maybe_abandon(&self, block: &HashedBlock, master_chain: &HashSet<Hash>, head_num: u64) -> Result<()> {
        let hash = block.mining_hash();
        let should_abandon =
            !master_chain.contains(&hash) && head_num.saturating_sub(block.block_num()) >= ABANDONMENT_DEPTH;
        if !should_abandon {
            return Ok(());
        }

        for child in self.blocks.get_by_parent_hash(&hash)? {
            self.maybe_abandon(&child, master_chain, head_num)?;
        }

        for txn in &block.block.transactions {
            let txn_hash = txn.hash();
            for output in &txn.transaction.outputs {
                self.utxos.remove_output(&txn_hash, output.output_id)?;
            }
            for input in &txn.transaction.inputs {
                self.utxos.unmark_claimed(&input.output_transaction_hash, input.output_id)?;
            }
            if !txn.is_reward() && self.validate_transaction(txn).is_ok() {
                self.mempool.add(txn.clone())?;
            }
        }

        self.blocks.abandon_block(&hash)?;
        Ok(())
    }
}
