use super::*;
use crate::test_helpers::test_output;

#[test]
fn reward_has_zero_inputs_and_one_output() {
    let kp = KeyPair::new();
    let txn = Transaction::reward(kp.address());
    assert!(txn.inputs.is_empty());
    assert_eq!(txn.outputs.len(), 1);
    assert_eq!(txn.outputs[0].amount, Amount::units(REWARD_UNITS));
}

#[test]
fn signed_reward_is_reward() {
    let kp = KeyPair::new();
    let txn = Transaction::reward(kp.address());
    let signed = SignedTransaction::sign(txn, &kp);
    assert!(signed.is_reward());
    assert!(signed.signature_is_valid());
}

#[test]
fn non_reward_with_input_is_not_reward() {
    let kp = KeyPair::new();
    let input = TransactionInput {
        output_block_hash: Hash::of_bytes(b"block"),
        output_transaction_hash: Hash::of_bytes(b"txn"),
        output_id: 0,
    };
    let output = test_output(kp.address(), 1);
    let txn = Transaction::new(vec![input], vec![output], kp.address());
    let signed = SignedTransaction::sign(txn, &kp);
    assert!(!signed.is_reward());
}

#[test]
fn tampering_with_transaction_after_signing_invalidates_it() {
    let kp = KeyPair::new();
    let txn = Transaction::reward(kp.address());
    let mut signed = SignedTransaction::sign(txn, &kp);
    signed.transaction.outputs[0].output_id = 99;
    assert!(!signed.signature_is_valid());
}

#[test]
fn hash_is_stable_across_clones() {
    let kp = KeyPair::new();
    let txn = Transaction::reward(kp.address());
    assert_eq!(txn.hash(), txn.clone().hash());
}
