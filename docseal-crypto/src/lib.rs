//! Key lifecycle and hybrid envelope encryption for docseal.
//!
//! Payloads are sealed for a single recipient using:
//! - RSA (PKCS#1 v1.5) to wrap a random per-envelope session key
//! - AES in CFB mode with a SHA-1 modification detection code for the data
//! - DEFLATE compression of the literal payload before encryption
//! - Radix-64 armor with a CRC-24 checksum when text output is wanted
//!
//! # Key protection
//!
//! RSA private parameters are never written in the clear. They are sealed
//! with ChaCha20-Poly1305 under a key derived from the passphrase with
//! Argon2id; the Argon2 salt and cost travel inside the secret key packet.
//!
//! # Decryption
//!
//! Decryption looks up the recipient key ids named by the envelope in a
//! [`SecretKeyring`], unlocks the first match with the passphrase, and
//! verifies the integrity code over the whole decrypted stream before any
//! inner packet is read.

pub mod armor;
mod cipher;
pub mod compression;
pub mod envelope;
mod error;
mod key;
pub mod keyring;
pub mod keys;
pub mod packet;
pub mod symmetric;

pub use compression::CompressionAlgorithm;
pub use envelope::{
    EncryptOptions, EnvelopeInfo, decrypt, decrypt_message, encrypt, encrypt_with_options,
    inspect,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{KdfParams, Salt};
pub use keyring::{PublicKeyEntry, PublicKeyring, SecretKeyring};
pub use keys::{
    DEFAULT_KEY_BITS, Fingerprint, KeyId, KeyPair, MAX_KEY_BITS, MIN_KEY_BITS, PublicKey,
    SecretKey, UnlockedKey,
};
pub use packet::LiteralData;
pub use symmetric::SymmetricAlgorithm;
