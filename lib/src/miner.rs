//! Candidate block assembly and the proof-of-work search loop. Generic over
//! the store traits so the same code drives the standalone `miner` binary
//! and a node's embedded `--run_miner` threads.

use crate::chain::ChainEngine;
use crate::crypto::{Address, KeyPair};
use crate::error::Result;
use crate::store::{BlockStore, MempoolStore, UtxoStore};
use crate::timestamp::Timestamp;
use crate::types::{Block, BlockConfig, HashedBlock, Transaction};
use rand::rngs::OsRng;
use rand::RngCore;
use std::time::{Duration, Instant};

/// Builds a candidate block extending `parent`: one reward transaction to
/// `reward_address` plus every mempool transaction that still revalidates
/// against the engine's current stores.
pub fn assemble_candidate<B: BlockStore, T: MempoolStore, U: UtxoStore>(
    engine: &ChainEngine<B, T, U>,
    parent: &HashedBlock,
    reward_address: Address,
    reward_key: &KeyPair,
) -> Result<Block> {
    let difficulty = engine.required_difficulty(parent)?;
    let mut transactions = vec![crate::types::SignedTransaction::sign(
        Transaction::reward(reward_address),
        reward_key,
    )];
    for txn in engine.mempool().get_all()? {
        if engine.revalidate(&txn).is_ok() {
            transactions.push(txn);
        }
    }
    Ok(Block::new(
        parent.block_num() + 1,
        Some(parent.mining_hash()),
        BlockConfig { difficulty },
        transactions,
    ))
}

/// Outcome of one bounded search slice.
pub enum SearchOutcome {
    Found(HashedBlock),
    SliceExpired,
}

/// Searches random `mining_entropy` values for up to `slice` wall-clock
/// time, sleeping `(1 - throttle)` of the slice to honor `miner_throttle`.
/// `throttle` is clamped to `(0, 1]`.
pub fn search_slice(block: Block, slice: Duration, throttle: f64) -> SearchOutcome {
    let throttle = throttle.clamp(f64::EPSILON, 1.0);
    let active = slice.mul_f64(throttle);
    let started = Instant::now();
    let mut entropy = [0u8; 32];
    while started.elapsed() < active {
        OsRng.fill_bytes(&mut entropy);
        let hb = HashedBlock::new(block.clone(), entropy, Timestamp::now());
        if hb.hash_meets_difficulty() {
            return SearchOutcome::Found(hb);
        }
    }
    let idle = slice.saturating_sub(started.elapsed());
    if !idle.is_zero() {
        std::thread::sleep(idle);
    }
    SearchOutcome::SliceExpired
}

/// One-shot empty genesis-equivalent block for a fresh chain at the
/// configured default difficulty. Real genesis is always difficulty 0 and
/// network-constant (`HashedBlock::genesis`); this helper exists for
/// alternate/private networks that want a non-zero starting difficulty.
pub fn mine_genesis(default_difficulty: u8) -> HashedBlock {
    if default_difficulty == 0 {
        return HashedBlock::genesis();
    }
    let block = Block::new(0, None, BlockConfig { difficulty: default_difficulty }, vec![]);
    let mut entropy = [0u8; 32];
    loop {
        OsRng.fill_bytes(&mut entropy);
        let hb = HashedBlock::new(block.clone(), entropy, Timestamp::now());
        if hb.hash_meets_difficulty() {
            return hb;
        }
    }
}

/// Runs the mining loop until `should_stop` returns true, feeding found
/// blocks into `engine` and restarting on head changes (preemption).
pub fn run_loop<B: BlockStore, T: MempoolStore, U: UtxoStore>(
    engine: &ChainEngine<B, T, U>,
    reward_key: &KeyPair,
    slice: Duration,
    throttle: f64,
    mut should_stop: impl FnMut() -> bool,
) -> Result<()> {
    while !should_stop() {
        let parent = match engine.get_head()? {
            Some(h) => h,
            None => {
                engine.add_block(HashedBlock::genesis())?;
                continue;
            }
        };
        let candidate = assemble_candidate(engine, &parent, reward_key.address(), reward_key)?;
        match search_slice(candidate, slice, throttle) {
            SearchOutcome::Found(hb) => {
                engine.add_block(hb)?;
            }
            SearchOutcome::SliceExpired => {
                // Loop back around: re-reading head is the preemption check.
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemBlockStore, MemMempoolStore, MemUtxoStore};
    use std::time::Duration;

    #[test]
    fn assembled_candidate_carries_exactly_one_reward() {
        let engine = ChainEngine::new(MemBlockStore::new(), MemMempoolStore::new(), MemUtxoStore::new());
        engine.add_block(HashedBlock::genesis()).unwrap();
        let kp = KeyPair::new();
        let genesis = engine.get_genesis().unwrap().unwrap();
        let candidate = assemble_candidate(&engine, &genesis, kp.address(), &kp).unwrap();
        assert_eq!(candidate.transactions.iter().filter(|t| t.is_reward()).count(), 1);
        assert_eq!(candidate.block_num, 1);
    }

    #[test]
    fn search_slice_finds_difficulty_zero_immediately() {
        let block = Block::new(0, None, BlockConfig { difficulty: 0 }, vec![]);
        match search_slice(block, Duration::from_millis(200), 1.0) {
            SearchOutcome::Found(hb) => assert!(hb.hash_meets_difficulty()),
            SearchOutcome::SliceExpired => panic!("difficulty 0 always matches"),
        }
    }

    #[test]
    fn mining_loop_grows_the_chain_by_one_block_per_call() {
        let engine = ChainEngine::new(MemBlockStore::new(), MemMempoolStore::new(), MemUtxoStore::new());
        engine.add_block(HashedBlock::genesis()).unwrap();
        let kp = KeyPair::new();
        let mut ticks = 0;
        run_loop(&engine, &kp, Duration::from_millis(50), 1.0, || {
            ticks += 1;
            ticks > 1
        })
        .unwrap();
        assert_eq!(engine.get_head().unwrap().unwrap().block_num(), 1);
    }
}
