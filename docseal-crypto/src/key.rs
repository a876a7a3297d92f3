//! Passphrase key derivation.
//!
//! Secret key material is never serialized in the clear. The passphrase is
//! stretched with Argon2id into a 256-bit key that seals the RSA private
//! parameters. The salt and cost parameters travel with the sealed key, so
//! the passphrase is the only input needed to unlock it again.

use crate::error::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a derived key in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of an Argon2id salt in bytes.
pub const SALT_SIZE: usize = 16;

/// A 256-bit symmetric key derived from a passphrase. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// Random Argon2id salt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

/// Argon2id cost parameters.
///
/// Memory is expressed as a power of two in KiB, which is how the parameters
/// are encoded inside a secret-key packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Number of passes over memory.
    pub time_cost: u8,
    /// Degree of parallelism (lanes).
    pub parallelism: u8,
    /// log2 of the memory cost in KiB.
    pub memory_exponent: u8,
}

impl Default for KdfParams {
    fn default() -> Self {
        // 64 MiB, 3 passes, 4 lanes
        Self {
            time_cost: 3,
            parallelism: 4,
            memory_exponent: 16,
        }
    }
}

impl KdfParams {
    /// Low-cost parameters for tests and constrained hosts (8 MiB, 1 pass).
    pub fn interactive() -> Self {
        Self {
            time_cost: 1,
            parallelism: 1,
            memory_exponent: 13,
        }
    }

    fn memory_cost_kib(&self) -> CryptoResult<u32> {
        if self.memory_exponent > 31 {
            return Err(CryptoError::KeyDerivation(format!(
                "memory exponent {} out of range",
                self.memory_exponent
            )));
        }
        Ok(1u32 << self.memory_exponent)
    }
}

/// Derives a key from a passphrase using Argon2id.
pub fn derive_key(passphrase: &str, salt: &Salt, params: &KdfParams) -> CryptoResult<DerivedKey> {
    let argon_params = Params::new(
        params.memory_cost_kib()?,
        u32::from(params.time_cost),
        u32::from(params.parallelism),
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::KeyDerivation(format!("invalid argon2 parameters: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);
    let mut out = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt.as_bytes(), &mut out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    Ok(DerivedKey(out))
}

/// Generates a random 256-bit key.
#[cfg(test)]
pub(crate) fn generate_random_key() -> DerivedKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    DerivedKey(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_derive_same_key() {
        let salt = Salt::random();
        let a = derive_key("passphrase", &salt, &KdfParams::interactive()).unwrap();
        let b = derive_key("passphrase", &salt, &KdfParams::interactive()).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_salt_derives_different_key() {
        let a = derive_key("passphrase", &Salt::random(), &KdfParams::interactive()).unwrap();
        let b = derive_key("passphrase", &Salt::random(), &KdfParams::interactive()).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn oversized_memory_exponent_rejected() {
        let params = KdfParams {
            memory_exponent: 40,
            ..KdfParams::interactive()
        };
        let err = derive_key("passphrase", &Salt::random(), &params).unwrap_err();
        assert!(matches!(err, CryptoError::KeyDerivation(_)));
    }
}
