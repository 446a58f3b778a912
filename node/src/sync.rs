//! Peer synchronization: periodic peer/mempool exchange and chain catch-up
//! by walking parent links back to a known ancestor, then walking forward
//! again to pick up anything past it. `PeerTransport` abstracts the wire
//! so the protocol logic is testable without a real HTTP round trip.

use chainlib::error::Result as ChainResult;
use chainlib::hash::Hash;
use chainlib::peer::Peer;
use chainlib::store::{BlockStore, MempoolStore, PeerStore, UtxoStore};
use chainlib::types::{HashedBlock, SignedTransaction};
use chainlib::ChainEngine;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

pub trait PeerTransport: Send + Sync {
    fn request_peers(&self, peer: &Peer) -> anyhow::Result<Vec<Peer>>;
    fn push_peers(&self, peer: &Peer, peers: &[Peer]) -> anyhow::Result<()>;
    fn request_transactions(&self, peer: &Peer) -> anyhow::Result<Vec<SignedTransaction>>;
    fn request_head(&self, peer: &Peer) -> anyhow::Result<Option<HashedBlock>>;
    fn request_block_by_hash(&self, peer: &Peer, hash: &Hash) -> anyhow::Result<Option<HashedBlock>>;
    fn request_successors(&self, peer: &Peer, hash: &Hash) -> anyhow::Result<Vec<HashedBlock>>;
}

/// `reqwest` blocking client, one per sync worker — matches the node's
/// single blocking poll loop rather than the otherwise-async runtime.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        HttpTransport {
            client: reqwest::blocking::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client builds with a plain timeout"),
        }
    }

    fn base(peer: &Peer) -> String {
        format!("http://{}:{}", peer.address, peer.port)
    }
}

impl PeerTransport for HttpTransport {
    fn request_peers(&self, peer: &Peer) -> anyhow::Result<Vec<Peer>> {
        let body: serde_json::Value = self.client.get(format!("{}/peer", Self::base(peer))).send()?.json()?;
        Ok(serde_json::from_value(body["peers"].clone())?)
    }

    fn push_peers(&self, peer: &Peer, peers: &[Peer]) -> anyhow::Result<()> {
        self.client
            .post(format!("{}/peer", Self::base(peer)))
            .json(&serde_json::json!({ "peers": peers }))
            .send()?;
        Ok(())
    }

    fn request_transactions(&self, peer: &Peer) -> anyhow::Result<Vec<SignedTransaction>> {
        let body: serde_json::Value = self.client.get(format!("{}/transaction", Self::base(peer))).send()?.json()?;
        Ok(serde_json::from_value(body["transactions"].clone())?)
    }

    fn request_head(&self, peer: &Peer) -> anyhow::Result<Option<HashedBlock>> {
        let chain: serde_json::Value = self.client.get(format!("{}/chain", Self::base(peer))).send()?.json()?;
        let Some(hex) = chain["head_hash"]["sha256_hex"].as_str() else {
            return Ok(None);
        };
        let hash = Hash::from_hex(hex)?;
        self.request_block_by_hash(peer, &hash)
    }

    fn request_block_by_hash(&self, peer: &Peer, hash: &Hash) -> anyhow::Result<Option<HashedBlock>> {
        let body: serde_json::Value = self
            .client
            .get(format!("{}/block?hex_hash={}", Self::base(peer), hash.to_hex()))
            .send()?
            .json()?;
        if body.get("block").is_none() && body.as_object().map(|o| o.is_empty()).unwrap_or(true) {
            return Ok(None);
        }
        Ok(serde_json::from_value(body).ok())
    }

    fn request_successors(&self, peer: &Peer, hash: &Hash) -> anyhow::Result<Vec<HashedBlock>> {
        let body: serde_json::Value = self
            .client
            .get(format!("{}/block?parent_hex_hash={}", Self::base(peer), hash.to_hex()))
            .send()?
            .json()?;
        Ok(serde_json::from_value(body["blocks"].clone()).unwrap_or_default())
    }
}

/// One full sync pass against a single `peer`: merge peer lists, pull
/// outstanding transactions, then catch up on missing blocks.
pub fn sync_with_peer<B: BlockStore, T: MempoolStore, U: UtxoStore, P: PeerStore>(
    engine: &ChainEngine<B, T, U>,
    peer_store: &P,
    self_peer_id: &str,
    self_peer: Option<&Peer>,
    transport: &dyn PeerTransport,
    peer: &Peer,
) -> anyhow::Result<()> {
    let their_peers = transport.request_peers(peer)?;
    let mut they_know_us = false;
    for p in &their_peers {
        if p.peer_id == self_peer_id {
            they_know_us = true;
            continue;
        }
        peer_store.add_peer(p.clone())?;
    }
    if let Some(self_peer) = self_peer {
        if !they_know_us {
            transport.push_peers(peer, std::slice::from_ref(self_peer))?;
        }
    }

    for txn in transport.request_transactions(peer)? {
        if engine.mempool().has(&txn.hash())? {
            continue;
        }
        if let Err(e) = engine.add_outstanding_transaction(txn) {
            debug!("peer {} offered an invalid transaction: {e}", peer.peer_id);
        }
    }

    catch_up(engine, transport, peer)?;
    Ok(())
}

fn catch_up<B: BlockStore, T: MempoolStore, U: UtxoStore>(
    engine: &ChainEngine<B, T, U>,
    transport: &dyn PeerTransport,
    peer: &Peer,
) -> anyhow::Result<()> {
    let Some(their_head) = transport.request_head(peer)? else {
        return Ok(());
    };
    if engine.blocks().has_hash(&their_head.mining_hash())? {
        return Ok(());
    }

    let mut backward = vec![their_head.clone()];
    let mut current = their_head;
    let anchor = loop {
        let Some(parent_hash) = current.parent_mining_hash() else {
            break current.mining_hash();
        };
        if engine.blocks().has_hash(&parent_hash)? {
            break parent_hash;
        }
        match transport.request_block_by_hash(peer, &parent_hash)? {
            Some(b) => {
                current = b.clone();
                backward.push(b);
            }
            None => break parent_hash,
        }
    };

    for block in backward.into_iter().rev() {
        if let Err(e) = engine.add_block(block) {
            warn!("peer {} gave us an invalid block: {e}", peer.peer_id);
        }
    }

    let mut frontier = VecDeque::from([anchor]);
    let mut visited = std::collections::HashSet::new();
    while let Some(hash) = frontier.pop_front() {
        if !visited.insert(hash) {
            continue;
        }
        for child in transport.request_successors(peer, &hash)? {
            let child_hash = child.mining_hash();
            let already_had = engine.blocks().has_hash(&child_hash)?;
            if let Err(e) = engine.add_block(child) {
                warn!("peer {} gave us an invalid block: {e}", peer.peer_id);
                continue;
            }
            if !already_had {
                frontier.push_back(child_hash);
            }
        }
    }

    Ok(())
}

/// One tick of the sync loop: sample up to `sample_size` active peers and
/// sync with each in turn, per-peer I/O errors are logged and skipped.
pub fn sync_tick<B: BlockStore, T: MempoolStore, U: UtxoStore, P: PeerStore>(
    engine: &ChainEngine<B, T, U>,
    peer_store: &P,
    self_peer_id: &str,
    self_peer: Option<&Peer>,
    transport: &dyn PeerTransport,
    sample_size: usize,
) -> ChainResult<()> {
    for peer in peer_store.peer_sample(sample_size)? {
        if let Err(e) = sync_with_peer(engine, peer_store, self_peer_id, self_peer, transport, &peer) {
            warn!("sync with {} failed, skipping until next tick: {e}", peer.peer_id);
        }
    }
    Ok(())
}

/// Blocking poll loop. Runs until `should_stop` returns true — the node
/// binary runs this on its own dedicated thread.
pub fn run_loop<B: BlockStore, T: MempoolStore, U: UtxoStore, P: PeerStore>(
    engine: &ChainEngine<B, T, U>,
    peer_store: &P,
    self_peer_id: &str,
    self_peer: Option<&Peer>,
    transport: &dyn PeerTransport,
    sample_size: usize,
    poll_delay: Duration,
    mut should_stop: impl FnMut() -> bool,
) {
    while !should_stop() {
        if let Err(e) = sync_tick(engine, peer_store, self_peer_id, self_peer, transport, sample_size) {
            warn!("sync tick failed: {e}");
        }
        std::thread::sleep(poll_delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainlib::crypto::KeyPair;
    use chainlib::store::{MemBlockStore, MemMempoolStore, MemPeerStore, MemUtxoStore};
    use std::sync::Mutex;

    type MemEngine = ChainEngine<MemBlockStore, MemMempoolStore, MemUtxoStore>;

    /// Talks directly to a remote in-memory engine/peer-store pair —
    /// simulates the wire without a real HTTP round trip, so the
    /// convergence property can run deterministically in-process.
    struct InProcessTransport<'a> {
        remote_engine: &'a MemEngine,
        remote_peers: &'a MemPeerStore,
        pushed: Mutex<Vec<Peer>>,
    }

    impl<'a> PeerTransport for InProcessTransport<'a> {
        fn request_peers(&self, _peer: &Peer) -> anyhow::Result<Vec<Peer>> {
            Ok(self.remote_peers.get_all_active_peers()?)
        }

        fn push_peers(&self, _peer: &Peer, peers: &[Peer]) -> anyhow::Result<()> {
            self.pushed.lock().unwrap().extend_from_slice(peers);
            for p in peers {
                self.remote_peers.add_peer(p.clone())?;
            }
            Ok(())
        }

        fn request_transactions(&self, _peer: &Peer) -> anyhow::Result<Vec<SignedTransaction>> {
            Ok(self.remote_engine.mempool().get_all()?)
        }

        fn request_head(&self, _peer: &Peer) -> anyhow::Result<Option<HashedBlock>> {
            Ok(self.remote_engine.get_head()?)
        }

        fn request_block_by_hash(&self, _peer: &Peer, hash: &Hash) -> anyhow::Result<Option<HashedBlock>> {
            Ok(self.remote_engine.blocks().get_by_hash(hash)?)
        }

        fn request_successors(&self, _peer: &Peer, hash: &Hash) -> anyhow::Result<Vec<HashedBlock>> {
            Ok(self.remote_engine.blocks().get_by_parent_hash(hash)?)
        }
    }

    fn mine(parent: &HashedBlock, kp: &KeyPair) -> HashedBlock {
        use chainlib::types::{Block, BlockConfig, Transaction};
        let reward = SignedTransaction::sign(Transaction::reward(kp.address()), kp);
        let block = Block::new(
            parent.block_num() + 1,
            Some(parent.mining_hash()),
            BlockConfig { difficulty: chainlib::DEFAULT_DIFFICULTY },
            vec![reward],
        );
        let mut entropy = [0u8; 32];
        for nonce in 0u64.. {
            entropy[..8].copy_from_slice(&nonce.to_le_bytes());
            let hb = HashedBlock::new(block.clone(), entropy, chainlib::Timestamp::from_millis(nonce as i64 + 1));
            if hb.hash_meets_difficulty() {
                return hb;
            }
        }
        unreachable!()
    }

    #[test]
    fn s6_peer_sync_converges_a_lagging_node_to_the_leaders_head() {
        let remote_engine = ChainEngine::new(MemBlockStore::new(), MemMempoolStore::new(), MemUtxoStore::new());
        let remote_peers = MemPeerStore::new();
        let genesis = HashedBlock::genesis();
        remote_engine.add_block(genesis.clone()).unwrap();
        let kp = KeyPair::new();
        let mut tip = genesis.clone();
        for _ in 0..20 {
            tip = mine(&tip, &kp);
            remote_engine.add_block(tip.clone()).unwrap();
        }

        let local_engine = ChainEngine::new(MemBlockStore::new(), MemMempoolStore::new(), MemUtxoStore::new());
        local_engine.add_block(genesis.clone()).unwrap();
        let local_peers = MemPeerStore::new();
        local_peers.add_peer(Peer::new("remote".to_string(), "remote".to_string(), 0, 0)).unwrap();

        let transport = InProcessTransport {
            remote_engine: &remote_engine,
            remote_peers: &remote_peers,
            pushed: Mutex::new(vec![]),
        };

        for _ in 0..25 {
            sync_tick(&local_engine, &local_peers, "local", None, &transport, 1).unwrap();
            if local_engine.get_head().unwrap().unwrap().mining_hash() == tip.mining_hash() {
                break;
            }
        }

        assert_eq!(
            local_engine.get_head().unwrap().unwrap().mining_hash(),
            remote_engine.get_head().unwrap().unwrap().mining_hash()
        );
    }

    #[test]
    fn self_peer_is_pushed_when_the_remote_does_not_know_us() {
        let remote_engine = ChainEngine::new(MemBlockStore::new(), MemMempoolStore::new(), MemUtxoStore::new());
        remote_engine.add_block(HashedBlock::genesis()).unwrap();
        let remote_peers = MemPeerStore::new();
        let transport = InProcessTransport {
            remote_engine: &remote_engine,
            remote_peers: &remote_peers,
            pushed: Mutex::new(vec![]),
        };
        let self_peer = Peer::new("local".to_string(), "127.0.0.1".to_string(), 9000, 0);
        let target = Peer::new("remote".to_string(), "remote".to_string(), 0, 0);
        let local_engine = ChainEngine::new(MemBlockStore::new(), MemMempoolStore::new(), MemUtxoStore::new());
        local_engine.add_block(HashedBlock::genesis()).unwrap();
        let local_peers = MemPeerStore::new();

        sync_with_peer(&local_engine, &local_peers, "local", Some(&self_peer), &transport, &target).unwrap();
        assert_eq!(transport.pushed.lock().unwrap().len(), 1);
    }
}
