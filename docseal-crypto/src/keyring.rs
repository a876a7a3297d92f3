//! In-memory keyrings loaded from key files.
//!
//! A key file is a sequence of key packets, each optionally followed by user
//! id packets and subkeys. Files may be armored or binary; several armored
//! blocks in one file are read as one keyring.

use crate::armor;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{KeyId, PublicKey, SecretKey};
use crate::packet::{Packet, parse_packets};
use std::collections::HashMap;
use tracing::debug;

fn read_key_packets(data: &[u8]) -> CryptoResult<Vec<Packet>> {
    let binary = armor::decode(data).map_err(|e| match e {
        CryptoError::MalformedEnvelope(msg) => CryptoError::InvalidKey(msg),
        other => other,
    })?;
    parse_packets(&binary).map_err(|e| match e {
        CryptoError::MalformedEnvelope(msg) => CryptoError::InvalidKey(msg),
        other => other,
    })
}

/// Secret keys indexed by key id.
#[derive(Clone, Debug, Default)]
pub struct SecretKeyring {
    keys: HashMap<KeyId, SecretKey>,
}

impl SecretKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every secret key and subkey in an armored or binary key file.
    pub fn from_bytes(data: &[u8]) -> CryptoResult<Self> {
        let mut ring = Self::new();
        for packet in read_key_packets(data)? {
            match packet {
                Packet::SecretKey(key) | Packet::SecretSubkey(key) => ring.insert(key),
                Packet::UserId(_) | Packet::Signature | Packet::Trust => {}
                other => {
                    return Err(CryptoError::InvalidKey(format!(
                        "unexpected {} packet in secret keyring",
                        other.name()
                    )));
                }
            }
        }
        if ring.is_empty() {
            return Err(CryptoError::InvalidKey("no secret keys found".into()));
        }
        debug!(keys = ring.len(), "loaded secret keyring");
        Ok(ring)
    }

    pub fn insert(&mut self, key: SecretKey) {
        self.keys.insert(key.key_id(), key);
    }

    pub fn get(&self, key_id: KeyId) -> Option<&SecretKey> {
        self.keys.get(&key_id)
    }

    pub fn key_ids(&self) -> impl Iterator<Item = KeyId> + '_ {
        self.keys.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// A public key together with the user ids that followed it in the file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKeyEntry {
    pub key: PublicKey,
    pub user_ids: Vec<String>,
}

/// Public keys in file order, indexed by key id.
#[derive(Clone, Debug, Default)]
pub struct PublicKeyring {
    entries: Vec<PublicKeyEntry>,
    index: HashMap<KeyId, usize>,
}

impl PublicKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every public key and subkey in an armored or binary key file.
    pub fn from_bytes(data: &[u8]) -> CryptoResult<Self> {
        let mut ring = Self::new();
        let mut primary_index = None;
        for packet in read_key_packets(data)? {
            match packet {
                Packet::PublicKey(key) => {
                    primary_index = Some(ring.entries.len());
                    ring.insert(key);
                }
                Packet::PublicSubkey(key) => ring.insert(key),
                Packet::UserId(id) => match primary_index {
                    Some(index) => ring.entries[index].user_ids.push(id),
                    None => {
                        return Err(CryptoError::InvalidKey(
                            "user id packet before any public key".into(),
                        ));
                    }
                },
                Packet::Signature | Packet::Trust => {}
                other => {
                    return Err(CryptoError::InvalidKey(format!(
                        "unexpected {} packet in public keyring",
                        other.name()
                    )));
                }
            }
        }
        if ring.entries.is_empty() {
            return Err(CryptoError::InvalidKey("no public keys found".into()));
        }
        debug!(keys = ring.entries.len(), "loaded public keyring");
        Ok(ring)
    }

    pub fn insert(&mut self, key: PublicKey) {
        self.index.insert(key.key_id(), self.entries.len());
        self.entries.push(PublicKeyEntry {
            key,
            user_ids: Vec::new(),
        });
    }

    pub fn get(&self, key_id: KeyId) -> Option<&PublicKey> {
        self.index.get(&key_id).map(|i| &self.entries[*i].key)
    }

    pub fn entries(&self) -> &[PublicKeyEntry] {
        &self.entries
    }

    /// The key envelopes are addressed to: the last encryption-capable key
    /// in the file.
    pub fn encryption_key(&self) -> CryptoResult<&PublicKey> {
        self.entries
            .iter()
            .rev()
            .map(|entry| &entry.key)
            .find(|key| key.can_encrypt())
            .ok_or_else(|| CryptoError::InvalidKey("no encryption key in keyring".into()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
