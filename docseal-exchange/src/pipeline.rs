//! End-to-end exchange.
//!
//! Outbound: files → pack → encrypt → object store.
//! Inbound: object store → decrypt → unpack → publish.
//!
//! Every step runs to completion before the next starts. Failures carry the
//! step and object key they happened at.

use crate::config::ExchangeConfig;
use crate::document::Document;
use crate::error::{ExchangeResult, Step, StepContext};
use crate::keystore::KeyMaterial;
use crate::publisher::{BatchPublisher, PublishReport};
use crate::store::ObjectStore;
use docseal_archive::ArchiveEntry;
use docseal_crypto::{PublicKey, SecretKeyring};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Suffix of every object key the pipeline writes.
pub const OBJECT_SUFFIX: &str = ".archived.zip.pgp";

const ARCHIVE_SUFFIX: &str = ".archived.zip";

/// Record of one uploaded envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeReceipt {
    pub object_key: String,
    /// Version token returned by the store.
    pub version: String,
    pub envelope_len: usize,
    /// Hex SHA-256 of the uploaded envelope.
    pub sha256: String,
}

// ── Outbound ────────────────────────────────────────────────────

/// Packs, encrypts and uploads bundles for one recipient.
pub struct Outbound {
    store: Arc<dyn ObjectStore>,
    recipient: PublicKey,
    armored: bool,
    prefix: String,
}

impl Outbound {
    /// Armored output, no key prefix.
    pub fn new(store: Arc<dyn ObjectStore>, recipient: PublicKey) -> Self {
        Self {
            store,
            recipient,
            armored: true,
            prefix: String::new(),
        }
    }

    pub fn from_config(
        store: Arc<dyn ObjectStore>,
        material: &KeyMaterial,
        config: &ExchangeConfig,
    ) -> ExchangeResult<Self> {
        Ok(Self::new(store, material.recipient()?.clone())
            .armored(config.keys.armored)
            .prefix(config.store.prefix.clone()))
    }

    pub fn armored(mut self, armored: bool) -> Self {
        self.armored = armored;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Packs every file under `root` and ships the result.
    pub async fn send_bundle(&self, root: &Path) -> ExchangeResult<ExchangeReceipt> {
        let id = Uuid::new_v4();
        let object_key = self.object_key(id);
        let archive = docseal_archive::pack_dir(root).step(Step::Pack, &object_key)?;
        self.ship(id, object_key, archive).await
    }

    /// Packs the given entries and ships the result.
    pub async fn send_entries(&self, entries: &[ArchiveEntry]) -> ExchangeResult<ExchangeReceipt> {
        let id = Uuid::new_v4();
        let object_key = self.object_key(id);
        let archive = docseal_archive::pack(entries).step(Step::Pack, &object_key)?;
        self.ship(id, object_key, archive).await
    }

    fn object_key(&self, id: Uuid) -> String {
        format!("{}{id}{OBJECT_SUFFIX}", self.prefix)
    }

    async fn ship(
        &self,
        id: Uuid,
        object_key: String,
        archive: Vec<u8>,
    ) -> ExchangeResult<ExchangeReceipt> {
        let payload_name = format!("{id}{ARCHIVE_SUFFIX}");
        let envelope =
            docseal_crypto::encrypt(&archive, &payload_name, &self.recipient, self.armored)
                .step(Step::Encrypt, &object_key)?;

        let envelope_len = envelope.len();
        let sha256 = hex::encode(Sha256::digest(&envelope));
        let version = self
            .store
            .put(&object_key, envelope)
            .await
            .step(Step::Upload, &object_key)?;

        info!(
            object_key = %object_key,
            recipient = %self.recipient.key_id(),
            archive_size = archive.len(),
            envelope_size = envelope_len,
            "bundle uploaded"
        );
        Ok(ExchangeReceipt {
            object_key,
            version,
            envelope_len,
            sha256,
        })
    }
}

// ── Inbound ─────────────────────────────────────────────────────

/// Downloads, decrypts and unpacks bundles addressed to a secret keyring.
pub struct Inbound {
    store: Arc<dyn ObjectStore>,
    keyring: SecretKeyring,
    passphrase: Zeroizing<String>,
}

impl Inbound {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        keyring: SecretKeyring,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            store,
            keyring,
            passphrase: Zeroizing::new(passphrase.into()),
        }
    }

    pub fn from_config(
        store: Arc<dyn ObjectStore>,
        material: &KeyMaterial,
        config: &ExchangeConfig,
    ) -> Self {
        Self::new(store, material.secret.clone(), config.keys.passphrase.clone())
    }

    /// Fetches and decrypts the archive stored under `object_key`.
    async fn open(&self, object_key: &str) -> ExchangeResult<Vec<u8>> {
        let envelope = self.store.get(object_key).await.step(Step::Download, object_key)?;
        docseal_crypto::decrypt(&envelope, &self.keyring, &self.passphrase)
            .step(Step::Decrypt, object_key)
    }

    /// Recovers the bundle's entries in archive order.
    pub async fn receive_bundle(&self, object_key: &str) -> ExchangeResult<Vec<ArchiveEntry>> {
        let archive = self.open(object_key).await?;
        let entries = docseal_archive::unpack(&archive).step(Step::Unpack, object_key)?;
        info!(object_key, entries = entries.len(), "bundle received");
        Ok(entries)
    }

    /// Recovers the bundle onto disk below `destination`.
    pub async fn receive_into(
        &self,
        object_key: &str,
        destination: &Path,
    ) -> ExchangeResult<Vec<PathBuf>> {
        let archive = self.open(object_key).await?;
        let written =
            docseal_archive::extract(&archive, destination).step(Step::Unpack, object_key)?;
        info!(object_key, files = written.len(), destination = %destination.display(), "bundle extracted");
        Ok(written)
    }

    /// Recovers the bundle and publishes its files as documents.
    pub async fn receive_and_publish(
        &self,
        object_key: &str,
        publisher: &BatchPublisher,
    ) -> ExchangeResult<PublishReport> {
        let documents = Document::from_entries(self.receive_bundle(object_key).await?);
        let report = publisher.publish(documents).await;
        info!(
            object_key,
            topic = publisher.topic(),
            delivered = report.documents_delivered(),
            complete = report.is_complete(),
            "bundle published"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;

    #[test]
    fn passphrase_is_held_in_zeroizing_storage() {
        let inbound = Inbound::new(
            Arc::new(MemoryObjectStore::new()),
            SecretKeyring::new(),
            "correct-horse",
        );
        let held: &Zeroizing<String> = &inbound.passphrase;
        assert_eq!(held.as_str(), "correct-horse");
    }
}
