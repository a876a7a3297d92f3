//! Compression of the literal data packet before encryption.

use crate::error::{CryptoError, CryptoResult};
use flate2::Compression;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, ZlibEncoder};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Compression algorithm identifiers as carried in a compressed data packet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    Uncompressed,
    /// Raw deflate.
    #[default]
    Zip,
    /// Deflate with a zlib header and Adler-32 trailer.
    Zlib,
}

impl CompressionAlgorithm {
    pub fn id(&self) -> u8 {
        match self {
            CompressionAlgorithm::Uncompressed => 0,
            CompressionAlgorithm::Zip => 1,
            CompressionAlgorithm::Zlib => 2,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(CompressionAlgorithm::Uncompressed),
            1 => Some(CompressionAlgorithm::Zip),
            2 => Some(CompressionAlgorithm::Zlib),
            _ => None,
        }
    }
}

pub fn compress(algorithm: CompressionAlgorithm, data: &[u8]) -> CryptoResult<Vec<u8>> {
    let io_err = |e: std::io::Error| CryptoError::Encryption(format!("compression failed: {e}"));
    match algorithm {
        CompressionAlgorithm::Uncompressed => Ok(data.to_vec()),
        CompressionAlgorithm::Zip => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data).map_err(io_err)?;
            encoder.finish().map_err(io_err)
        }
        CompressionAlgorithm::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data).map_err(io_err)?;
            encoder.finish().map_err(io_err)
        }
    }
}

/// Largest payload a compressed data packet may expand to (1 GiB).
pub const MAX_DECOMPRESSED_SIZE: usize = 1 << 30;

pub fn decompress(algorithm: CompressionAlgorithm, data: &[u8]) -> CryptoResult<Vec<u8>> {
    decompress_limited(algorithm, data, MAX_DECOMPRESSED_SIZE)
}

/// Decompresses at most `limit` bytes; a stream that expands further is
/// rejected.
pub(crate) fn decompress_limited(
    algorithm: CompressionAlgorithm,
    data: &[u8],
    limit: usize,
) -> CryptoResult<Vec<u8>> {
    let cap = limit as u64 + 1;
    let mut out = Vec::new();
    let result = match algorithm {
        CompressionAlgorithm::Uncompressed => data.take(cap).read_to_end(&mut out),
        CompressionAlgorithm::Zip => DeflateDecoder::new(data).take(cap).read_to_end(&mut out),
        CompressionAlgorithm::Zlib => ZlibDecoder::new(data).take(cap).read_to_end(&mut out),
    };
    result.map_err(|e| CryptoError::MalformedEnvelope(format!("decompression failed: {e}")))?;
    if out.len() > limit {
        return Err(CryptoError::MalformedEnvelope(format!(
            "compressed data expands beyond {limit} bytes"
        )));
    }
    Ok(out)
}
