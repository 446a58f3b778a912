//! Durable storage, HTTP RPC surface, and peer synchronization for a
//! running node. The binary in `src/main.rs` is a thin CLI wrapper around
//! what's exposed here; the `miner` binary depends on this crate purely
//! for its `sled`-backed store implementations so both processes can
//! attach to the same on-disk chain.

pub mod server;
pub mod store;
pub mod sync;
pub mod util;

use chainlib::ChainEngine;
use store::{SledBlockStore, SledMempoolStore, SledPeerStore, SledUtxoStore};

pub type NodeEngine = ChainEngine<SledBlockStore, SledMempoolStore, SledUtxoStore>;

/// Shared handles every actor (server, sync client, embedded miner)
/// mutates through. Holds no chain state of its own — everything lives in
/// the durable stores behind `engine` and `peers`.
pub struct AppState {
    pub engine: NodeEngine,
    pub peers: SledPeerStore,
    pub peer_id: String,
    pub advertize_addr: String,
    pub listen_port: u16,
    pub advertize_self: bool,
}

impl AppState {
    pub fn open(chain_db_path: &str, peer_db_path: &str, config: &chainlib::config::NodeConfig) -> anyhow::Result<Self> {
        let chain_db = sled::open(chain_db_path)?;
        let peer_db = sled::open(peer_db_path)?;
        let engine = ChainEngine::new(
            SledBlockStore::open(&chain_db)?,
            SledMempoolStore::open(&chain_db)?,
            SledUtxoStore::open(&chain_db)?,
        );
        let peers = SledPeerStore::open(&peer_db)?;
        Ok(AppState {
            engine,
            peers,
            peer_id: config.peer_id.clone(),
            advertize_addr: config.advertize_addr.clone(),
            listen_port: config.listen_port,
            advertize_self: config.advertize_self,
        })
    }
}
