use super::*;
use crate::crypto::KeyPair;
use crate::types::SignedTransaction;
use crate::types::Transaction;

#[test]
fn genesis_has_block_num_zero_and_no_parent() {
    let g = HashedBlock::genesis();
    assert_eq!(g.block_num(), 0);
    assert_eq!(g.parent_mining_hash(), None);
    assert_eq!(g.block.config.difficulty, 0);
    assert!(g.block.transactions.is_empty());
}

#[test]
fn genesis_meets_difficulty_zero() {
    assert!(HashedBlock::genesis().hash_meets_difficulty());
}

#[test]
fn genesis_mining_hash_is_deterministic() {
    assert_eq!(
        HashedBlock::genesis().mining_hash(),
        HashedBlock::genesis().mining_hash()
    );
}

#[test]
fn mining_hash_changes_with_entropy() {
    let kp = KeyPair::new();
    let block = Block::new(
        1,
        Some(HashedBlock::genesis().mining_hash()),
        BlockConfig { difficulty: 2 },
        vec![SignedTransaction::sign(
            Transaction::reward(kp.address()),
            &kp,
        )],
    );
    let a = HashedBlock::new(block.clone(), [1u8; 32], Timestamp::from_millis(1));
    let b = HashedBlock::new(block, [2u8; 32], Timestamp::from_millis(1));
    assert_ne!(a.mining_hash(), b.mining_hash());
}

#[test]
fn reward_transaction_is_found() {
    let kp = KeyPair::new();
    let reward = SignedTransaction::sign(Transaction::reward(kp.address()), &kp);
    let block = Block::new(1, None, BlockConfig { difficulty: 0 }, vec![reward.clone()]);
    assert_eq!(block.reward_transaction(), Some(&reward));
}
