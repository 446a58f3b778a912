//! ed25519 keys, addresses and signatures (RFC 8032).

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(VerifyingKey);

impl Address {
    pub fn hex(&self) -> String {
        hex::encode(self.0.as_bytes())
    }

    pub fn from_hex(hex_key: &str) -> Result<Self, AddressError> {
        let bytes = hex::decode(hex_key).map_err(|_| AddressError::Malformed)?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| AddressError::Malformed)?;
        let key = VerifyingKey::from_bytes(&arr).map_err(|_| AddressError::Malformed)?;
        Ok(Address(key))
    }

    pub fn signature_is_valid(&self, message: &[u8], signature: &Signature) -> bool {
        self.0.verify(message, &signature.0).is_ok()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("malformed address")]
    Malformed,
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({})", self.hex())
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl Signature {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    pub fn from_hex(hex_sig: &str) -> Result<Self, AddressError> {
        let bytes = hex::decode(hex_sig).map_err(|_| AddressError::Malformed)?;
        let arr: [u8; 64] = bytes.try_into().map_err(|_| AddressError::Malformed)?;
        Ok(Signature(ed25519_dalek::Signature::from_bytes(&arr)))
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Signature::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

pub struct KeyPair(SigningKey);

impl KeyPair {
    pub fn new() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        KeyPair(SigningKey::from_bytes(&seed))
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        KeyPair(SigningKey::from_bytes(&seed))
    }

    pub fn seed(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn address(&self) -> Address {
        Address(self.0.verifying_key())
    }

    pub fn sign(&self, payload: &[u8]) -> Signature {
        Signature(self.0.sign(payload))
    }
}

impl Default for KeyPair {
    fn default() -> Self {
        Self::new()
    }
}
