//! Canonical serialization and content hashing.
//!
//! Every persisted or hashed object round-trips through a single canonical
//! byte form: sorted-key, whitespace-free JSON with binary fields hex
//! encoded. `serde_json::Value`'s map is a `BTreeMap` (the `preserve_order`
//! feature is never enabled in this workspace), so converting through
//! `Value` before serializing sorts every nesting level for free.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Produce the canonical byte encoding of `value`: sorted-key JSON, no
/// insignificant whitespace. This is the interop-critical form — two
/// implementations that disagree on field order, number formatting, or hex
/// case will silently compute different hashes for the same object.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    let as_value = serde_json::to_value(value).expect("BUG: type must serialize to JSON");
    serde_json::to_vec(&as_value).expect("BUG: Value always serializes")
}

/// SHA-256 of `canonical_bytes(value)`.
pub fn hash_of<T: Serialize>(value: &T) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes(value));
    Hash(hasher.finalize().into())
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; 32]);

impl Hash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn of<T: Serialize>(value: &T) -> Self {
        hash_of(value)
    }

    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Hash(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Hash(arr))
    }

    /// First `n` bits are zero, MSB-first. `n` in `0..=256`. Deliberately
    /// crisp, unlike the byte-boundary variant some reference
    /// implementations use.
    /// `n` ranges over `0..=256` (difficulty stored on a block is only ever
    /// `0..=255`, but the predicate itself is meaningful up to 256 — see
    /// the all-zero-hash boundary case).
    pub fn meets_difficulty(&self, n: u16) -> bool {
        let full_zero_bytes = (n / 8) as usize;
        let remaining_bits = (n % 8) as u8;

        if self.0[..full_zero_bytes].iter().any(|&b| b != 0) {
            return false;
        }

        if remaining_bits == 0 {
            return true;
        }

        let mask = 0xFFu8 << (8 - remaining_bits);
        self.0[full_zero_bytes] & mask == 0
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests;
