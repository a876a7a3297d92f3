//! Session-key encryption of the data packet.
//!
//! Data packets use AES in CFB mode with an all-zero IV. The plaintext is
//! prefixed with one random block plus a repeat of its last two octets, so a
//! wrong session key is detected before any payload is returned.
//!
//! Integrity-protected packets (tag 18) additionally append a modification
//! detection code: `0xD3 0x14` followed by the SHA-1 of everything before
//! it. The code is checked over the whole decrypted buffer before any inner
//! packet is interpreted.
//!
//! Legacy packets (tag 9) carry no integrity protection and resynchronise
//! the CFB state after the prefix. They are accepted on input only.

use crate::error::{CryptoError, CryptoResult};
use aes::{Aes128, Aes192, Aes256};
use cfb_mode::cipher::{AsyncStreamCipher, BlockCipher, BlockEncryptMut, KeyInit, KeyIvInit};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use zeroize::Zeroizing;

const BLOCK_SIZE: usize = 16;
const SEIPD_VERSION: u8 = 1;
const MDC_HEADER: [u8; 2] = [0xD3, 0x14];
const MDC_SIZE: usize = 2 + 20;

/// Symmetric algorithm used for the session key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymmetricAlgorithm {
    Aes128,
    Aes192,
    #[default]
    Aes256,
}

impl SymmetricAlgorithm {
    pub fn id(&self) -> u8 {
        match self {
            SymmetricAlgorithm::Aes128 => 7,
            SymmetricAlgorithm::Aes192 => 8,
            SymmetricAlgorithm::Aes256 => 9,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            7 => Some(SymmetricAlgorithm::Aes128),
            8 => Some(SymmetricAlgorithm::Aes192),
            9 => Some(SymmetricAlgorithm::Aes256),
            _ => None,
        }
    }

    /// Session key length in bytes.
    pub fn key_size(&self) -> usize {
        match self {
            SymmetricAlgorithm::Aes128 => 16,
            SymmetricAlgorithm::Aes192 => 24,
            SymmetricAlgorithm::Aes256 => 32,
        }
    }

    /// Generates a fresh random session key.
    pub fn generate_session_key(&self) -> Zeroizing<Vec<u8>> {
        let mut key = Zeroizing::new(vec![0u8; self.key_size()]);
        rand::rngs::OsRng.fill_bytes(&mut key);
        key
    }

    fn check_key(&self, key: &[u8]) -> CryptoResult<()> {
        if key.len() != self.key_size() {
            return Err(CryptoError::InvalidKeyLength {
                expected: self.key_size(),
                actual: key.len(),
            });
        }
        Ok(())
    }

    fn cfb_encrypt(&self, key: &[u8], iv: &[u8], buf: &mut [u8]) -> CryptoResult<()> {
        match self {
            SymmetricAlgorithm::Aes128 => cfb_encrypt::<Aes128>(key, iv, buf),
            SymmetricAlgorithm::Aes192 => cfb_encrypt::<Aes192>(key, iv, buf),
            SymmetricAlgorithm::Aes256 => cfb_encrypt::<Aes256>(key, iv, buf),
        }
    }

    fn cfb_decrypt(&self, key: &[u8], iv: &[u8], buf: &mut [u8]) -> CryptoResult<()> {
        match self {
            SymmetricAlgorithm::Aes128 => cfb_decrypt::<Aes128>(key, iv, buf),
            SymmetricAlgorithm::Aes192 => cfb_decrypt::<Aes192>(key, iv, buf),
            SymmetricAlgorithm::Aes256 => cfb_decrypt::<Aes256>(key, iv, buf),
        }
    }
}

fn cfb_encrypt<C>(key: &[u8], iv: &[u8], buf: &mut [u8]) -> CryptoResult<()>
where
    C: BlockEncryptMut + BlockCipher + KeyInit,
{
    cfb_mode::Encryptor::<C>::new_from_slices(key, iv)
        .map_err(|e| CryptoError::Encryption(format!("cipher setup failed: {e}")))?
        .encrypt(buf);
    Ok(())
}

fn cfb_decrypt<C>(key: &[u8], iv: &[u8], buf: &mut [u8]) -> CryptoResult<()>
where
    C: BlockEncryptMut + BlockCipher + KeyInit,
{
    cfb_mode::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|e| CryptoError::MalformedEnvelope(format!("cipher setup failed: {e}")))?
        .decrypt(buf);
    Ok(())
}

fn random_prefix() -> Vec<u8> {
    let mut prefix = vec![0u8; BLOCK_SIZE + 2];
    rand::rngs::OsRng.fill_bytes(&mut prefix[..BLOCK_SIZE]);
    prefix[BLOCK_SIZE] = prefix[BLOCK_SIZE - 2];
    prefix[BLOCK_SIZE + 1] = prefix[BLOCK_SIZE - 1];
    prefix
}

fn quick_check(prefix: &[u8]) -> bool {
    prefix[BLOCK_SIZE - 2..BLOCK_SIZE] == prefix[BLOCK_SIZE..BLOCK_SIZE + 2]
}

/// Encrypts `plaintext` into the body of an integrity-protected data packet.
pub fn seal_integrity_protected(
    algorithm: SymmetricAlgorithm,
    key: &[u8],
    plaintext: &[u8],
) -> CryptoResult<Vec<u8>> {
    algorithm.check_key(key)?;

    let mut buf = random_prefix();
    buf.reserve(plaintext.len() + MDC_SIZE);
    buf.extend_from_slice(plaintext);
    buf.extend_from_slice(&MDC_HEADER);
    let digest = Sha1::digest(&buf);
    buf.extend_from_slice(&digest);

    algorithm.cfb_encrypt(key, &[0u8; BLOCK_SIZE], &mut buf)?;

    let mut body = Vec::with_capacity(1 + buf.len());
    body.push(SEIPD_VERSION);
    body.extend_from_slice(&buf);
    Ok(body)
}

/// Decrypts an integrity-protected data packet body and verifies its
/// modification detection code. Returns the inner packet stream.
pub fn open_integrity_protected(
    algorithm: SymmetricAlgorithm,
    key: &[u8],
    body: &[u8],
) -> CryptoResult<Zeroizing<Vec<u8>>> {
    algorithm.check_key(key)?;

    let Some((&version, ciphertext)) = body.split_first() else {
        return Err(CryptoError::MalformedEnvelope("empty encrypted data packet".into()));
    };
    // only version 1 is defined; any other value is damage
    if version != SEIPD_VERSION {
        return Err(CryptoError::IntegrityCheckFailed(format!(
            "encrypted data packet version {version}"
        )));
    }
    if ciphertext.len() < BLOCK_SIZE + 2 + MDC_SIZE {
        return Err(CryptoError::IntegrityCheckFailed(
            "encrypted data packet is too short".into(),
        ));
    }

    let mut buf = Zeroizing::new(ciphertext.to_vec());
    algorithm.cfb_decrypt(key, &[0u8; BLOCK_SIZE], &mut buf)?;

    if !quick_check(&buf) {
        return Err(CryptoError::IntegrityCheckFailed(
            "session key quick check failed".into(),
        ));
    }

    let (content, mdc) = buf.split_at(buf.len() - 20);
    if content[content.len() - 2..] != MDC_HEADER {
        return Err(CryptoError::IntegrityCheckFailed(
            "modification detection code missing".into(),
        ));
    }
    if Sha1::digest(content).as_slice() != mdc {
        return Err(CryptoError::IntegrityCheckFailed(
            "modification detection code mismatch".into(),
        ));
    }

    Ok(Zeroizing::new(
        content[BLOCK_SIZE + 2..content.len() - 2].to_vec(),
    ))
}

/// Encrypts `plaintext` into a legacy data packet body (no integrity
/// protection). Only used to produce fixtures for the legacy read path.
pub fn seal_legacy(
    algorithm: SymmetricAlgorithm,
    key: &[u8],
    plaintext: &[u8],
) -> CryptoResult<Vec<u8>> {
    algorithm.check_key(key)?;

    let mut head = random_prefix();
    algorithm.cfb_encrypt(key, &[0u8; BLOCK_SIZE], &mut head)?;

    let mut rest = plaintext.to_vec();
    algorithm.cfb_encrypt(key, &head[2..BLOCK_SIZE + 2], &mut rest)?;

    head.extend_from_slice(&rest);
    Ok(head)
}

/// Decrypts a legacy data packet body.
pub fn open_legacy(
    algorithm: SymmetricAlgorithm,
    key: &[u8],
    body: &[u8],
) -> CryptoResult<Zeroizing<Vec<u8>>> {
    algorithm.check_key(key)?;

    if body.len() < BLOCK_SIZE + 2 {
        return Err(CryptoError::MalformedEnvelope(
            "encrypted data packet is too short".into(),
        ));
    }

    let mut head = Zeroizing::new(body[..BLOCK_SIZE + 2].to_vec());
    algorithm.cfb_decrypt(key, &[0u8; BLOCK_SIZE], &mut head)?;
    if !quick_check(&head) {
        return Err(CryptoError::MalformedEnvelope(
            "session key quick check failed".into(),
        ));
    }

    let mut rest = Zeroizing::new(body[BLOCK_SIZE + 2..].to_vec());
    algorithm.cfb_decrypt(key, &body[2..BLOCK_SIZE + 2], &mut rest)?;
    Ok(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_protected_round_trip() {
        for algorithm in [
            SymmetricAlgorithm::Aes128,
            SymmetricAlgorithm::Aes192,
            SymmetricAlgorithm::Aes256,
        ] {
            let key = algorithm.generate_session_key();
            let body = seal_integrity_protected(algorithm, &key, b"inner packets").unwrap();
            assert_eq!(body[0], SEIPD_VERSION);
            let opened = open_integrity_protected(algorithm, &key, &body).unwrap();
            assert_eq!(opened.as_slice(), b"inner packets");
        }
    }

    #[test]
    fn any_flipped_body_byte_fails_integrity() {
        let algorithm = SymmetricAlgorithm::Aes256;
        let key = algorithm.generate_session_key();
        let body = seal_integrity_protected(algorithm, &key, &[0x55; 40]).unwrap();

        for i in 0..body.len() {
            let mut tampered = body.clone();
            tampered[i] ^= 0x01;
            let err = open_integrity_protected(algorithm, &key, &tampered).unwrap_err();
            assert!(
                matches!(err, CryptoError::IntegrityCheckFailed(_)),
                "byte {i}: {err:?}"
            );
        }
    }

    #[test]
    fn wrong_session_key_fails_integrity() {
        let algorithm = SymmetricAlgorithm::Aes128;
        let body =
            seal_integrity_protected(algorithm, &algorithm.generate_session_key(), b"x").unwrap();
        let err =
            open_integrity_protected(algorithm, &algorithm.generate_session_key(), &body)
                .unwrap_err();
        assert!(matches!(err, CryptoError::IntegrityCheckFailed(_)));
    }

    #[test]
    fn legacy_round_trip() {
        let algorithm = SymmetricAlgorithm::Aes256;
        let key = algorithm.generate_session_key();
        let body = seal_legacy(algorithm, &key, b"legacy payload").unwrap();
        let opened = open_legacy(algorithm, &key, &body).unwrap();
        assert_eq!(opened.as_slice(), b"legacy payload");
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        let err = seal_integrity_protected(SymmetricAlgorithm::Aes256, &[0u8; 16], b"x")
            .unwrap_err();
        assert!(matches!(
            err,
            CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 16
            }
        ));
    }
}
