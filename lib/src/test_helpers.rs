//! Shared test helper functions used across unit tests.

use crate::crypto::Address;
use crate::types::TransactionOutput;
use crate::Amount;

/// A throwaway output paying `units` to `recipient`, for tests that don't
/// care about output_id uniqueness.
pub fn test_output(recipient: Address, units: i64) -> TransactionOutput {
    TransactionOutput {
        output_id: 0,
        amount: Amount::units(units),
        recipient,
    }
}
