use super::Core;
use chainlib::crypto::KeyPair;
use chainlib::hash::Hash;
use chainlib::types::TransactionOutput;
use chainlib::Amount;

fn output(output_id: u32, units: i64, recipient: chainlib::crypto::Address) -> TransactionOutput {
    TransactionOutput {
        output_id,
        amount: Amount::units(units),
        recipient,
    }
}

#[test]
fn balance_sums_every_unspent_output() {
    let kp = KeyPair::new();
    let core = Core::for_test(
        KeyPair::from_seed(kp.seed()),
        vec![
            (Hash::of_bytes(b"b0"), Hash::of_bytes(b"t0"), output(0, 3, kp.address())),
            (Hash::of_bytes(b"b1"), Hash::of_bytes(b"t1"), output(0, 5, kp.address())),
        ],
    );
    assert_eq!(core.get_balance(), Amount::units(8));
}

#[test]
fn create_transaction_selects_just_enough_inputs_and_pays_change_back() {
    let kp = KeyPair::new();
    let core = Core::for_test(
        KeyPair::from_seed(kp.seed()),
        vec![
            (Hash::of_bytes(b"b0"), Hash::of_bytes(b"t0"), output(0, 3, kp.address())),
            (Hash::of_bytes(b"b1"), Hash::of_bytes(b"t1"), output(0, 5, kp.address())),
            (Hash::of_bytes(b"b2"), Hash::of_bytes(b"t2"), output(0, 8, kp.address())),
        ],
    );
    let recipient = KeyPair::new().address();
    let signed = core.create_transaction(recipient, Amount::units(10)).unwrap();

    // Greedy selection walks 3, then 3+5=8, then 3+5+8=16 before it covers 10.
    assert_eq!(signed.transaction.inputs.len(), 3);
    assert_eq!(signed.transaction.outputs.len(), 2);
    let paid = signed
        .transaction
        .outputs
        .iter()
        .find(|o| o.recipient == recipient)
        .unwrap();
    assert_eq!(paid.amount, Amount::units(10));
    let change = signed
        .transaction
        .outputs
        .iter()
        .find(|o| o.recipient == core.address())
        .unwrap();
    assert_eq!(change.amount, Amount::units(6));
    assert!(signed.signature_is_valid());
}

#[test]
fn create_transaction_with_exact_balance_has_no_change_output() {
    let kp = KeyPair::new();
    let core = Core::for_test(
        KeyPair::from_seed(kp.seed()),
        vec![(Hash::of_bytes(b"b0"), Hash::of_bytes(b"t0"), output(0, 10, kp.address()))],
    );
    let recipient = KeyPair::new().address();
    let signed = core.create_transaction(recipient, Amount::units(10)).unwrap();
    assert_eq!(signed.transaction.outputs.len(), 1);
}

#[test]
fn create_transaction_fails_when_funds_are_insufficient() {
    let kp = KeyPair::new();
    let core = Core::for_test(
        KeyPair::from_seed(kp.seed()),
        vec![(Hash::of_bytes(b"b0"), Hash::of_bytes(b"t0"), output(0, 3, kp.address()))],
    );
    let recipient = KeyPair::new().address();
    assert!(core.create_transaction(recipient, Amount::units(10)).is_err());
}
