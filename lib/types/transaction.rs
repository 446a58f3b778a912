use crate::crypto::{Address, KeyPair, Signature};
use crate::hash::Hash;
use crate::timestamp::Timestamp;
use crate::{Amount, REWARD_UNITS};
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct TransactionInput {
    pub output_block_hash: Hash,
    pub output_transaction_hash: Hash,
    pub output_id: u32,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct TransactionOutput {
    pub output_id: u32,
    pub amount: Amount,
    pub recipient: Address,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct Transaction {
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub timestamp: Timestamp,
    pub claimer: Address,
}

impl Transaction {
    pub fn new(
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
        claimer: Address,
    ) -> Self {
        Transaction {
            inputs,
            outputs,
            timestamp: Timestamp::now(),
            claimer,
        }
    }

    /// Build the one reward (coinbase) transaction a block carries: zero
    /// inputs, one output of `REWARD_UNITS` paid to `claimer`.
    pub fn reward(claimer: Address) -> Self {
        let output = TransactionOutput {
            output_id: 0,
            amount: Amount::units(REWARD_UNITS),
            recipient: claimer,
        };
        Transaction {
            inputs: vec![],
            outputs: vec![output],
            timestamp: Timestamp::now(),
            claimer,
        }
    }

    /// SHA-256 of canonical(Transaction) — does not cover the signature.
    pub fn hash(&self) -> Hash {
        Hash::of(self)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: Signature,
}

impl SignedTransaction {
    pub fn sign(transaction: Transaction, key_pair: &KeyPair) -> Self {
        let signature = key_pair.sign(&crate::hash::canonical_bytes(&transaction));
        SignedTransaction {
            transaction,
            signature,
        }
    }

    pub fn hash(&self) -> Hash {
        self.transaction.hash()
    }

    pub fn is_reward(&self) -> bool {
        self.transaction.inputs.is_empty() && self.transaction.outputs.len() == 1
    }

    pub fn signature_is_valid(&self) -> bool {
        let bytes = crate::hash::canonical_bytes(&self.transaction);
        self.transaction
            .claimer
            .signature_is_valid(&bytes, &self.signature)
    }
}

#[cfg(test)]
mod tests;
