//! Crypto error types.

use crate::keys::KeyId;
use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while generating keys or sealing/opening envelopes.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("key serialization failed: {0}")]
    Serialization(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("secret key for message not found (requested key ids: {})", format_key_ids(.requested))]
    SecretKeyNotFound { requested: Vec<KeyId> },

    #[error("wrong passphrase for secret key {key_id}")]
    Passphrase { key_id: KeyId },

    #[error("unsupported message: {0}")]
    UnsupportedMessage(String),

    #[error("integrity check of message failed: {0}")]
    IntegrityCheckFailed(String),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_key_ids(ids: &[KeyId]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
