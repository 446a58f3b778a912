use crate::error::Result;
use crate::peer::Peer;
use rand::seq::SliceRandom;
use rand::thread_rng;
use std::collections::HashMap;
use std::sync::RwLock;

pub trait PeerStore: Send + Sync {
    /// Insert-or-update `last_seen`/address/port for `peer.peer_id`.
    fn add_peer(&self, peer: Peer) -> Result<()>;
    fn has_peer(&self, peer_id: &str) -> Result<bool>;
    fn mark_peer_inactive(&self, peer_id: &str) -> Result<()>;
    fn get_all_active_peers(&self) -> Result<Vec<Peer>>;
    fn random_peer(&self) -> Result<Option<Peer>>;
    fn peer_sample(&self, n: usize) -> Result<Vec<Peer>>;
}

#[derive(Default)]
pub struct MemPeerStore {
    peers: RwLock<HashMap<String, Peer>>,
}

impl MemPeerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PeerStore for MemPeerStore {
    fn add_peer(&self, peer: Peer) -> Result<()> {
        self.peers.write().unwrap().insert(peer.peer_id.clone(), peer);
        Ok(())
    }

    fn has_peer(&self, peer_id: &str) -> Result<bool> {
        Ok(self.peers.read().unwrap().contains_key(peer_id))
    }

    fn mark_peer_inactive(&self, peer_id: &str) -> Result<()> {
        if let Some(peer) = self.peers.write().unwrap().get_mut(peer_id) {
            peer.active = false;
        }
        Ok(())
    }

    fn get_all_active_peers(&self) -> Result<Vec<Peer>> {
        Ok(self
            .peers
            .read()
            .unwrap()
            .values()
            .filter(|p| p.active)
            .cloned()
            .collect())
    }

    fn random_peer(&self) -> Result<Option<Peer>> {
        let active = self.get_all_active_peers()?;
        Ok(active.choose(&mut thread_rng()).cloned())
    }

    fn peer_sample(&self, n: usize) -> Result<Vec<Peer>> {
        let mut active = self.get_all_active_peers()?;
        active.shuffle(&mut thread_rng());
        active.truncate(n);
        Ok(active)
    }
}
