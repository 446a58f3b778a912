mod block;
mod transaction;

pub use block::{Block, BlockConfig, HashedBlock};
pub use transaction::{SignedTransaction, Transaction, TransactionInput, TransactionOutput};