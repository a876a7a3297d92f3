//! Secure document exchange pipeline.
//!
//! Ties the archive codec and the envelope engine to an object store and a
//! downstream transport:
//!
//! - [`Outbound`] packs a directory or entry list, encrypts it to the
//!   recipient's public key and uploads the envelope.
//! - [`Inbound`] downloads an envelope, decrypts it with the secret keyring,
//!   unpacks it and optionally hands the files to a [`BatchPublisher`].
//! - [`KeyStore`] generates the key pair once and loads it afterwards.
//!
//! Configuration is read from TOML into [`ExchangeConfig`].

pub mod config;
pub mod document;
mod error;
pub mod keystore;
pub mod logging;
pub mod pipeline;
pub mod publisher;
pub mod store;

pub use config::{ExchangeConfig, KeyConfig, PublishConfig, StoreConfig};
pub use document::{Document, DocumentBatch};
pub use error::{ExchangeError, ExchangeResult, Step};
pub use keystore::{KeyMaterial, KeyStore};
pub use pipeline::{ExchangeReceipt, Inbound, OBJECT_SUFFIX, Outbound};
pub use publisher::{
    BatchOutcome, BatchPublisher, BatchTransport, ChannelTransport, PublishReport, PublishedBatch,
    partition,
};
pub use store::{FsObjectStore, MemoryObjectStore, ObjectStore};
