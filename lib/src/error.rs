use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("invalid block: {reason}")]
    InvalidBlock { reason: String },
    #[error("invalid block: unknown parent {parent_hash}")]
    UnknownParent { parent_hash: String },
    #[error("invalid block: difficulty mismatch, expected {expected} got {actual}")]
    DifficultyMismatch { expected: u8, actual: u8 },
    #[error("invalid transaction: {reason}")]
    InvalidTransaction { reason: String },
    #[error("invalid signature")]
    BadSignature,
    #[error("genesis block already stored")]
    DuplicateGenesis,
    #[error("no genesis block stored")]
    MissingGenesis,
    #[error("store error: {0}")]
    StoreError(String),
}

impl ChainError {
    pub fn invalid_block<S: Into<String>>(reason: S) -> Self {
        ChainError::InvalidBlock {
            reason: reason.into(),
        }
    }

    pub fn invalid_transaction<S: Into<String>>(reason: S) -> Self {
        ChainError::InvalidTransaction {
            reason: reason.into(),
        }
    }

    pub fn store<S: Into<String>>(reason: S) -> Self {
        ChainError::StoreError(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;
