//! Exchange pipeline error types.

use docseal_archive::ArchiveError;
use docseal_crypto::CryptoError;
use std::fmt;
use thiserror::Error;

/// Result type for exchange operations.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Pipeline step an error occurred in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Pack,
    Encrypt,
    Upload,
    Download,
    Decrypt,
    Unpack,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Pack => "pack",
            Step::Encrypt => "encrypt",
            Step::Upload => "upload",
            Step::Download => "download",
            Step::Decrypt => "decrypt",
            Step::Unpack => "unpack",
        })
    }
}

/// Errors that can occur while exchanging documents.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("object store error: {0}")]
    Store(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("key material incomplete: {0}")]
    KeyMaterial(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{step} failed for {object_key}: {source}")]
    Step {
        step: Step,
        object_key: String,
        #[source]
        source: Box<ExchangeError>,
    },
}

impl ExchangeError {
    /// The underlying error with any step context removed.
    pub fn root(&self) -> &ExchangeError {
        match self {
            ExchangeError::Step { source, .. } => source.root(),
            other => other,
        }
    }

    /// The crypto error at the root, if any.
    pub fn crypto(&self) -> Option<&CryptoError> {
        match self.root() {
            ExchangeError::Crypto(err) => Some(err),
            _ => None,
        }
    }
}

/// Attaches the pipeline step and object key to an error.
pub(crate) trait StepContext<T> {
    fn step(self, step: Step, object_key: &str) -> ExchangeResult<T>;
}

impl<T, E: Into<ExchangeError>> StepContext<T> for Result<T, E> {
    fn step(self, step: Step, object_key: &str) -> ExchangeResult<T> {
        self.map_err(|err| ExchangeError::Step {
            step,
            object_key: object_key.to_string(),
            source: Box::new(err.into()),
        })
    }
}
