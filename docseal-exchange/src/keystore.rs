//! Key pair persistence.
//!
//! A key pair lives in two files whose paths come from [`KeyConfig`]. The
//! pair is generated once, when neither file exists, and loaded on every
//! later start. A lone private or public file is treated as damage and is
//! never overwritten.

use crate::config::KeyConfig;
use crate::error::{ExchangeError, ExchangeResult};
use docseal_crypto::{CryptoError, KeyPair, PublicKey, PublicKeyring, SecretKeyring};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Loaded key material: the recipient side and the decryption side.
#[derive(Clone, Debug)]
pub struct KeyMaterial {
    pub public: PublicKeyring,
    pub secret: SecretKeyring,
}

impl KeyMaterial {
    /// The public key new envelopes are encrypted to.
    pub fn recipient(&self) -> ExchangeResult<&PublicKey> {
        Ok(self.public.encryption_key()?)
    }
}

/// Reads and writes the configured key files.
pub struct KeyStore {
    config: KeyConfig,
}

impl KeyStore {
    pub fn new(config: KeyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KeyConfig {
        &self.config
    }

    /// True when both key files are present.
    pub fn exists(&self) -> bool {
        self.config.private_key_path.is_file() && self.config.public_key_path.is_file()
    }

    /// Generates and writes a key pair if none exists, then loads it.
    pub fn ensure_key_pair(&self) -> ExchangeResult<KeyMaterial> {
        let private = self.config.private_key_path.exists();
        let public = self.config.public_key_path.exists();
        match (private, public) {
            (false, false) => {
                self.generate()?;
            }
            (true, true) => {
                debug!(path = %self.config.public_key_path.display(), "key pair already present");
            }
            (true, false) => {
                return Err(ExchangeError::KeyMaterial(format!(
                    "private key {} exists without public key {}",
                    self.config.private_key_path.display(),
                    self.config.public_key_path.display()
                )));
            }
            (false, true) => {
                return Err(ExchangeError::KeyMaterial(format!(
                    "public key {} exists without private key {}",
                    self.config.public_key_path.display(),
                    self.config.private_key_path.display()
                )));
            }
        }
        self.load()
    }

    /// Generates a fresh key pair and writes both files, replacing any
    /// existing ones. Callers must hold exclusive access to the key files.
    ///
    /// Both files are staged next to their targets and only renamed into
    /// place once both are fully written, so a failure leaves no new file
    /// behind.
    pub fn generate(&self) -> ExchangeResult<KeyPair> {
        let config = &self.config;
        let pair = KeyPair::generate_with_params(
            &config.passphrase,
            &config.identity,
            config.key_size,
            &config.kdf,
        )?;

        let private_staging = staging_path(&config.private_key_path);
        let public_staging = staging_path(&config.public_key_path);
        let written = self
            .write_staged(&pair, &private_staging, &public_staging)
            .and_then(|()| self.commit(&private_staging, &public_staging));
        if let Err(e) = written {
            let _ = fs::remove_file(&private_staging);
            let _ = fs::remove_file(&public_staging);
            return Err(e);
        }

        info!(
            key_id = %pair.key_id(),
            private = %config.private_key_path.display(),
            public = %config.public_key_path.display(),
            "wrote key pair"
        );
        Ok(pair)
    }

    fn write_staged(
        &self,
        pair: &KeyPair,
        private_staging: &Path,
        public_staging: &Path,
    ) -> ExchangeResult<()> {
        create_parent(&self.config.private_key_path)?;
        create_parent(&self.config.public_key_path)?;
        let private_out = create_key_file(private_staging)?;
        restrict_permissions(private_staging)?;
        let public_out = create_key_file(public_staging)?;
        pair.write_to(private_out, public_out, self.config.armored)?;
        Ok(())
    }

    /// Moves both staged files into place. If the public file cannot be
    /// placed, the private file just placed is removed again.
    fn commit(&self, private_staging: &Path, public_staging: &Path) -> ExchangeResult<()> {
        let private = &self.config.private_key_path;
        let public = &self.config.public_key_path;
        fs::rename(private_staging, private).map_err(|e| serialization(private, e))?;
        if let Err(e) = fs::rename(public_staging, public) {
            let _ = fs::remove_file(private);
            return Err(serialization(public, e));
        }
        Ok(())
    }

    /// Loads both keyrings from disk.
    pub fn load(&self) -> ExchangeResult<KeyMaterial> {
        let secret = SecretKeyring::from_bytes(&read_key_file(&self.config.private_key_path)?)?;
        let public = PublicKeyring::from_bytes(&read_key_file(&self.config.public_key_path)?)?;
        debug!(secret_keys = secret.len(), public_keys = public.len(), "loaded key material");
        Ok(KeyMaterial { public, secret })
    }
}

fn read_key_file(path: &Path) -> ExchangeResult<Vec<u8>> {
    fs::read(path).map_err(|e| {
        ExchangeError::KeyMaterial(format!("cannot read {}: {e}", path.display()))
    })
}

fn create_parent(path: &Path) -> ExchangeResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| serialization(parent, e))
        }
        _ => Ok(()),
    }
}

fn create_key_file(path: &Path) -> ExchangeResult<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| serialization(path, e))
}

/// Hidden sibling of `path` that a key file is written to before it is
/// renamed into place.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4().simple()))
}

fn serialization(path: &Path, err: std::io::Error) -> ExchangeError {
    CryptoError::Serialization(format!("writing {}: {err}", path.display())).into()
}

fn restrict_permissions(path: &Path) -> ExchangeResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| serialization(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
