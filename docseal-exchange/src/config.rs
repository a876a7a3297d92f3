//! Exchange configuration.
//!
//! Loaded from TOML. Every section and field has a default, so a file only
//! needs to name what differs:
//!
//! ```toml
//! [keys]
//! identity = "exchange <exchange@example.com>"
//! passphrase = "correct-horse"
//!
//! [publish]
//! topic = "documents"
//! batch_size = 25
//! ```

use crate::error::{ExchangeError, ExchangeResult};
use docseal_crypto::{DEFAULT_KEY_BITS, KdfParams, MAX_KEY_BITS, MIN_KEY_BITS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Top-level configuration for an exchange pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub keys: KeyConfig,
    pub publish: PublishConfig,
    pub store: StoreConfig,
}

/// Key material location and generation parameters.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    /// User id bound to generated keys.
    pub identity: String,
    pub passphrase: String,
    /// Write key files radix-64 armored and armor envelopes.
    pub armored: bool,
    /// RSA modulus size for generated keys, in bits.
    pub key_size: usize,
    /// Argon2id cost for sealing the secret key.
    pub kdf: KdfParams,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            private_key_path: PathBuf::from("keys/private.asc"),
            public_key_path: PathBuf::from("keys/public.asc"),
            identity: String::new(),
            passphrase: String::new(),
            armored: true,
            key_size: DEFAULT_KEY_BITS,
            kdf: KdfParams::default(),
        }
    }
}

impl fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyConfig")
            .field("private_key_path", &self.private_key_path)
            .field("public_key_path", &self.public_key_path)
            .field("identity", &self.identity)
            .field("passphrase", &"[REDACTED]")
            .field("armored", &self.armored)
            .field("key_size", &self.key_size)
            .field("kdf", &self.kdf)
            .finish()
    }
}

/// Downstream publishing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub topic: String,
    /// Documents per batch. Must be at least 1.
    pub batch_size: usize,
    /// Retries per batch after the first attempt.
    pub retry_count: u32,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            topic: "documents".to_string(),
            batch_size: 10,
            retry_count: 3,
        }
    }
}

/// Object store location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory of the filesystem object store.
    pub root: PathBuf,
    /// Prefix prepended to generated object keys.
    pub prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("store"),
            prefix: String::new(),
        }
    }
}

impl ExchangeConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> ExchangeResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ExchangeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: &Path) -> ExchangeResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExchangeError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> ExchangeResult<String> {
        toml::to_string_pretty(self).map_err(|e| ExchangeError::Config(e.to_string()))
    }

    pub fn validate(&self) -> ExchangeResult<()> {
        let keys = &self.keys;
        if keys.identity.trim().is_empty() {
            return Err(ExchangeError::Config("keys.identity must not be empty".into()));
        }
        if keys.passphrase.is_empty() {
            return Err(ExchangeError::Config("keys.passphrase must not be empty".into()));
        }
        if !(MIN_KEY_BITS..=MAX_KEY_BITS).contains(&keys.key_size) || keys.key_size % 8 != 0 {
            return Err(ExchangeError::Config(format!(
                "keys.key_size {} must be a multiple of 8 between {MIN_KEY_BITS} and {MAX_KEY_BITS}",
                keys.key_size
            )));
        }
        if keys.private_key_path == keys.public_key_path {
            return Err(ExchangeError::Config(
                "keys.private_key_path and keys.public_key_path must differ".into(),
            ));
        }
        if self.publish.batch_size == 0 {
            return Err(ExchangeError::Config("publish.batch_size must be at least 1".into()));
        }
        if self.publish.topic.trim().is_empty() {
            return Err(ExchangeError::Config("publish.topic must not be empty".into()));
        }
        Ok(())
    }
}
