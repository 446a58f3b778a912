//! Known peers: identity, address, liveness.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct Peer {
    pub peer_id: String,
    pub address: String,
    pub port: u16,
    pub last_seen_ms: i64,
    pub active: bool,
}

impl Peer {
    pub fn new(peer_id: String, address: String, port: u16, last_seen_ms: i64) -> Self {
        Peer {
            peer_id,
            address,
            port,
            last_seen_ms,
            active: true,
        }
    }
}

/// 256 random bits, rendered as 64 lowercase hex chars — the stable id a
/// node presents to its peers.
pub fn generate_peer_id() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_peer_id_is_64_lowercase_hex_chars() {
        let id = generate_peer_id();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn generated_peer_ids_are_not_repeated() {
        assert_ne!(generate_peer_id(), generate_peer_id());
    }
}
