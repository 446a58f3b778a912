//! Durable `sled`-backed implementations of `chainlib`'s store traits. One
//! `sled::Db` per configured path, split into trees the way a relational
//! schema would split into tables — sled keeps each tree's keys sorted, so
//! `by_block_num` iterates in ascending order for free.

use chainlib::crypto::{Address, KeyPair};
use chainlib::error::{ChainError, Result};
use chainlib::hash::{canonical_bytes, Hash};
use chainlib::peer::Peer;
use chainlib::store::{BlockStore, MempoolStore, PeerStore, UtxoRecord, UtxoStore};
use chainlib::types::{HashedBlock, SignedTransaction};
use serde::{de::DeserializeOwned, Serialize};
use sled::Tree;

fn to_store_err(e: sled::Error) -> ChainError {
    ChainError::store(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    canonical_bytes(value)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| ChainError::store(e.to_string()))
}

pub struct SledBlockStore {
    blocks: Tree,
    by_parent: Tree,
    by_block_num: Tree,
    meta: Tree,
}

impl SledBlockStore {
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(SledBlockStore {
            blocks: db.open_tree("blocks").map_err(to_store_err)?,
            by_parent: db.open_tree("blocks_by_parent").map_err(to_store_err)?,
            by_block_num: db.open_tree("blocks_by_num").map_err(to_store_err)?,
            meta: db.open_tree("blocks_meta").map_err(to_store_err)?,
        })
    }

    fn hash_list(&self, tree: &Tree, key: &[u8]) -> Result<Vec<Hash>> {
        match tree.get(key).map_err(to_store_err)? {
            Some(bytes) => decode(&bytes),
            None => Ok(vec![]),
        }
    }

    fn append_hash(&self, tree: &Tree, key: &[u8], hash: Hash) -> Result<()> {
        let mut list = self.hash_list(tree, key)?;
        list.push(hash);
        tree.insert(key, encode(&list)).map_err(to_store_err)?;
        Ok(())
    }

    fn remove_hash(&self, tree: &Tree, key: &[u8], hash: &Hash) -> Result<()> {
        let mut list = self.hash_list(tree, key)?;
        list.retain(|h| h != hash);
        if list.is_empty() {
            tree.remove(key).map_err(to_store_err)?;
        } else {
            tree.insert(key, encode(&list)).map_err(to_store_err)?;
        }
        Ok(())
    }

    fn load(&self, hash: &Hash) -> Result<Option<HashedBlock>> {
        match self.blocks.get(hash.as_bytes()).map_err(to_store_err)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn head_hash(&self) -> Result<Option<Hash>> {
        match self.meta.get(b"head_hash").map_err(to_store_err)? {
            Some(bytes) => Ok(Some(Hash::from_hex(
                std::str::from_utf8(&bytes).map_err(|e| ChainError::store(e.to_string()))?,
            )
            .map_err(|e| ChainError::store(e.to_string()))?)),
            None => Ok(None),
        }
    }
}

impl BlockStore for SledBlockStore {
    fn add_block(&self, block: HashedBlock) -> Result<()> {
        let hash = block.mining_hash();
        if self.blocks.contains_key(hash.as_bytes()).map_err(to_store_err)? {
            return Ok(());
        }

        let block_num = block.block_num();
        if let Some(parent) = block.parent_mining_hash() {
            self.append_hash(&self.by_parent, parent.as_bytes(), hash)?;
        } else {
            self.meta
                .insert(b"genesis_hash", hash.to_hex().as_bytes())
                .map_err(to_store_err)?;
        }
        self.append_hash(&self.by_block_num, &block_num.to_be_bytes(), hash)?;

        let replace_head = match self.head_hash()? {
            None => true,
            Some(current) => {
                let current_num = self
                    .load(&current)?
                    .map(|b| b.block_num())
                    .unwrap_or(0);
                block_num > current_num
            }
        };
        if replace_head {
            self.meta
                .insert(b"head_hash", hash.to_hex().as_bytes())
                .map_err(to_store_err)?;
        }

        self.blocks
            .insert(hash.as_bytes(), encode(&block))
            .map_err(to_store_err)?;
        Ok(())
    }

    fn get_by_hash(&self, hash: &Hash) -> Result<Option<HashedBlock>> {
        self.load(hash)
    }

    fn has_hash(&self, hash: &Hash) -> Result<bool> {
        Ok(self.blocks.contains_key(hash.as_bytes()).map_err(to_store_err)?)
    }

    fn get_genesis(&self) -> Result<Option<HashedBlock>> {
        match self.meta.get(b"genesis_hash").map_err(to_store_err)? {
            Some(bytes) => {
                let hex = std::str::from_utf8(&bytes).map_err(|e| ChainError::store(e.to_string()))?;
                let hash = Hash::from_hex(hex).map_err(|e| ChainError::store(e.to_string()))?;
                self.load(&hash)
            }
            None => Ok(None),
        }
    }

    fn get_head(&self) -> Result<Option<HashedBlock>> {
        match self.head_hash()? {
            Some(hash) => self.load(&hash),
            None => Ok(None),
        }
    }

    fn get_height(&self) -> Result<u64> {
        Ok(self.get_head()?.map(|b| b.block_num()).unwrap_or(0))
    }

    fn get_by_parent_hash(&self, hash: &Hash) -> Result<Vec<HashedBlock>> {
        self.hash_list(&self.by_parent, hash.as_bytes())?
            .into_iter()
            .filter_map(|h| self.load(&h).transpose())
            .collect()
    }

    fn get_by_block_num(&self, block_num: u64) -> Result<Vec<HashedBlock>> {
        self.hash_list(&self.by_block_num, &block_num.to_be_bytes())?
            .into_iter()
            .filter_map(|h| self.load(&h).transpose())
            .collect()
    }

    fn get_range(&self, lo: u64, hi: u64) -> Result<Vec<HashedBlock>> {
        let mut out = Vec::new();
        for entry in self.by_block_num.range(lo.to_be_bytes()..hi.to_be_bytes()) {
            let (_, bytes) = entry.map_err(to_store_err)?;
            let hashes: Vec<Hash> = decode(&bytes)?;
            for h in hashes {
                if let Some(b) = self.load(&h)? {
                    out.push(b);
                }
            }
        }
        out.sort_by_key(|b| b.block_num());
        Ok(out)
    }

    fn get_all_non_genesis_in_order(&self) -> Result<Vec<HashedBlock>> {
        let mut out = Vec::new();
        for entry in self.by_block_num.iter() {
            let (key, bytes) = entry.map_err(to_store_err)?;
            let num = u64::from_be_bytes(key.as_ref().try_into().map_err(|_| ChainError::store("corrupt block_num key"))?);
            if num == 0 {
                continue;
            }
            let hashes: Vec<Hash> = decode(&bytes)?;
            for h in hashes {
                if let Some(b) = self.load(&h)? {
                    out.push(b);
                }
            }
        }
        out.sort_by_key(|b| b.block_num());
        Ok(out)
    }

    fn abandon_block(&self, hash: &Hash) -> Result<()> {
        let Some(block) = self.load(hash)? else {
            return Ok(());
        };
        if let Some(parent) = block.parent_mining_hash() {
            self.remove_hash(&self.by_parent, parent.as_bytes(), hash)?;
        }
        self.remove_hash(&self.by_block_num, &block.block_num().to_be_bytes(), hash)?;
        self.blocks.remove(hash.as_bytes()).map_err(to_store_err)?;
        Ok(())
    }
}

pub struct SledMempoolStore {
    txns: Tree,
}

impl SledMempoolStore {
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(SledMempoolStore {
            txns: db.open_tree("mempool").map_err(to_store_err)?,
        })
    }
}

impl MempoolStore for SledMempoolStore {
    fn add(&self, txn: SignedTransaction) -> Result<()> {
        let hash = txn.hash();
        if !self.txns.contains_key(hash.as_bytes()).map_err(to_store_err)? {
            self.txns.insert(hash.as_bytes(), encode(&txn)).map_err(to_store_err)?;
        }
        Ok(())
    }

    fn remove_by_hash(&self, hash: &Hash) -> Result<()> {
        self.txns.remove(hash.as_bytes()).map_err(to_store_err)?;
        Ok(())
    }

    fn has(&self, hash: &Hash) -> Result<bool> {
        Ok(self.txns.contains_key(hash.as_bytes()).map_err(to_store_err)?)
    }

    fn get_all(&self) -> Result<Vec<SignedTransaction>> {
        let mut out = Vec::new();
        for entry in self.txns.iter() {
            let (_, bytes) = entry.map_err(to_store_err)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    fn get_by_hash(&self, hash: &Hash) -> Result<Option<SignedTransaction>> {
        match self.txns.get(hash.as_bytes()).map_err(to_store_err)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn utxo_key(txn_hash: &Hash, output_id: u32) -> Vec<u8> {
    let mut key = txn_hash.as_bytes().to_vec();
    key.extend_from_slice(&output_id.to_be_bytes());
    key
}

pub struct SledUtxoStore {
    records: Tree,
}

impl SledUtxoStore {
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(SledUtxoStore {
            records: db.open_tree("utxos").map_err(to_store_err)?,
        })
    }
}

impl UtxoStore for SledUtxoStore {
    fn add_output(&self, txn_hash: Hash, claimer: Address, output_id: u32) -> Result<()> {
        let record = UtxoRecord {
            transaction_hash: txn_hash,
            output_id,
            claimer,
            claimed: false,
        };
        self.records
            .insert(utxo_key(&txn_hash, output_id), encode(&record))
            .map_err(to_store_err)?;
        Ok(())
    }

    fn output_is_claimed(&self, txn_hash: &Hash, output_id: u32) -> Result<bool> {
        match self.records.get(utxo_key(txn_hash, output_id)).map_err(to_store_err)? {
            Some(bytes) => Ok(decode::<UtxoRecord>(&bytes)?.claimed),
            None => Ok(false),
        }
    }

    fn mark_claimed(&self, txn_hash: &Hash, output_id: u32) -> Result<()> {
        self.set_claimed(txn_hash, output_id, true)
    }

    fn unclaimed_outputs(&self, address: &Address) -> Result<Vec<UtxoRecord>> {
        let mut out = Vec::new();
        for entry in self.records.iter() {
            let (_, bytes) = entry.map_err(to_store_err)?;
            let record: UtxoRecord = decode(&bytes)?;
            if !record.claimed && &record.claimer == address {
                out.push(record);
            }
        }
        Ok(out)
    }

    fn unmark_claimed(&self, txn_hash: &Hash, output_id: u32) -> Result<()> {
        self.set_claimed(txn_hash, output_id, false)
    }

    fn remove_output(&self, txn_hash: &Hash, output_id: u32) -> Result<()> {
        self.records.remove(utxo_key(txn_hash, output_id)).map_err(to_store_err)?;
        Ok(())
    }
}

impl SledUtxoStore {
    fn set_claimed(&self, txn_hash: &Hash, output_id: u32, claimed: bool) -> Result<()> {
        let key = utxo_key(txn_hash, output_id);
        if let Some(bytes) = self.records.get(&key).map_err(to_store_err)? {
            let mut record: UtxoRecord = decode(&bytes)?;
            record.claimed = claimed;
            self.records.insert(key, encode(&record)).map_err(to_store_err)?;
        }
        Ok(())
    }
}

pub struct SledPeerStore {
    peers: Tree,
}

impl SledPeerStore {
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(SledPeerStore {
            peers: db.open_tree("peers").map_err(to_store_err)?,
        })
    }
}

impl PeerStore for SledPeerStore {
    fn add_peer(&self, peer: Peer) -> Result<()> {
        self.peers
            .insert(peer.peer_id.as_bytes(), encode(&peer))
            .map_err(to_store_err)?;
        Ok(())
    }

    fn has_peer(&self, peer_id: &str) -> Result<bool> {
        Ok(self.peers.contains_key(peer_id.as_bytes()).map_err(to_store_err)?)
    }

    fn mark_peer_inactive(&self, peer_id: &str) -> Result<()> {
        if let Some(bytes) = self.peers.get(peer_id.as_bytes()).map_err(to_store_err)? {
            let mut peer: Peer = decode(&bytes)?;
            peer.active = false;
            self.peers.insert(peer_id.as_bytes(), encode(&peer)).map_err(to_store_err)?;
        }
        Ok(())
    }

    fn get_all_active_peers(&self) -> Result<Vec<Peer>> {
        let mut out = Vec::new();
        for entry in self.peers.iter() {
            let (_, bytes) = entry.map_err(to_store_err)?;
            let peer: Peer = decode(&bytes)?;
            if peer.active {
                out.push(peer);
            }
        }
        Ok(out)
    }

    fn random_peer(&self) -> Result<Option<Peer>> {
        use rand::seq::SliceRandom;
        let active = self.get_all_active_peers()?;
        Ok(active.choose(&mut rand::thread_rng()).cloned())
    }

    fn peer_sample(&self, n: usize) -> Result<Vec<Peer>> {
        use rand::seq::SliceRandom;
        let mut active = self.get_all_active_peers()?;
        active.shuffle(&mut rand::thread_rng());
        active.truncate(n);
        Ok(active)
    }
}

/// Loads the node's mining keypair from `db`, generating and persisting a
/// fresh one on first run. Kept alongside the chain data it pays out to,
/// not in the peer or log stores.
pub fn load_or_create_miner_key(db: &sled::Db) -> Result<KeyPair> {
    let tree = db.open_tree("miner_key").map_err(to_store_err)?;
    if let Some(seed) = tree.get(b"seed").map_err(to_store_err)? {
        let arr: [u8; 32] = seed.as_ref().try_into().map_err(|_| ChainError::store("corrupt miner key seed"))?;
        return Ok(KeyPair::from_seed(arr));
    }
    let kp = KeyPair::new();
    tree.insert(b"seed", &kp.seed()).map_err(to_store_err)?;
    Ok(kp)
}
