//! Capability interfaces the chain engine runs against, plus in-memory
//! implementations for tests and other in-process use. A durable,
//! embedded-database-backed implementation of each trait lives in the
//! `node` crate — the engine only ever depends on the trait.

mod block;
mod mempool;
mod peer;
mod utxo;

pub use block::{BlockStore, MemBlockStore};
pub use mempool::{MemMempoolStore, MempoolStore};
pub use peer::{MemPeerStore, PeerStore};
pub use utxo::{MemUtxoStore, UtxoRecord, UtxoStore};
