//! OpenPGP-style packet framing.
//!
//! Every object in an envelope or key file is a packet: a one-octet tag
//! followed by a length and a body. Packets are written in the new header
//! format; both header formats are accepted on input, including
//! new-format partial body lengths.
//!
//! Decoding yields a [`Packet`] with one variant per packet kind, so callers
//! dispatch with `match` rather than probing types at runtime.

use crate::compression::CompressionAlgorithm;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{KeyId, PublicKey, SecretKey};
use chrono::{DateTime, Utc};

/// Packet tags used by docseal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    PublicKeyEncryptedSessionKey = 1,
    Signature = 2,
    SymKeyEncryptedSessionKey = 3,
    OnePassSignature = 4,
    SecretKey = 5,
    PublicKey = 6,
    SecretSubkey = 7,
    CompressedData = 8,
    SymEncryptedData = 9,
    Marker = 10,
    LiteralData = 11,
    Trust = 12,
    UserId = 13,
    PublicSubkey = 14,
    SymEncryptedIntegrityProtectedData = 18,
    ModificationDetectionCode = 19,
}

impl Tag {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Tag::PublicKeyEncryptedSessionKey,
            2 => Tag::Signature,
            3 => Tag::SymKeyEncryptedSessionKey,
            4 => Tag::OnePassSignature,
            5 => Tag::SecretKey,
            6 => Tag::PublicKey,
            7 => Tag::SecretSubkey,
            8 => Tag::CompressedData,
            9 => Tag::SymEncryptedData,
            10 => Tag::Marker,
            11 => Tag::LiteralData,
            12 => Tag::Trust,
            13 => Tag::UserId,
            14 => Tag::PublicSubkey,
            18 => Tag::SymEncryptedIntegrityProtectedData,
            19 => Tag::ModificationDetectionCode,
            _ => return None,
        })
    }
}

/// Body of a marker packet.
const MARKER_BODY: &[u8] = b"PGP";

/// Literal data format octet for binary payloads.
pub const LITERAL_BINARY: u8 = b'b';

// ============================================================================
// Byte reader
// ============================================================================

/// Bounds-checked cursor over a packet body.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub(crate) fn take(&mut self, n: usize, what: &str) -> CryptoResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| CryptoError::MalformedEnvelope(format!("truncated {what}")))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn read_u8(&mut self, what: &str) -> CryptoResult<u8> {
        Ok(self.take(1, what)?[0])
    }

    pub(crate) fn read_u16(&mut self, what: &str) -> CryptoResult<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn read_u32(&mut self, what: &str) -> CryptoResult<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn read_u64(&mut self, what: &str) -> CryptoResult<u64> {
        let b = self.take(8, what)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_be_bytes(buf))
    }

    /// Reads a multiprecision integer, returning its big-endian magnitude.
    pub(crate) fn read_mpi(&mut self, what: &str) -> CryptoResult<&'a [u8]> {
        let bits = usize::from(self.read_u16(what)?);
        self.take(bits.div_ceil(8), what)
    }

    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos.min(self.data.len())..];
        self.pos = self.data.len();
        slice
    }
}

/// Appends a multiprecision integer (bit count, then big-endian magnitude).
pub(crate) fn write_mpi(out: &mut Vec<u8>, magnitude: &[u8]) {
    let start = magnitude
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(magnitude.len());
    let trimmed = &magnitude[start..];
    let bits = match trimmed.first() {
        Some(first) => (trimmed.len() - 1) * 8 + (8 - first.leading_zeros() as usize),
        None => 0,
    };
    out.extend_from_slice(&(bits as u16).to_be_bytes());
    out.extend_from_slice(trimmed);
}

// ============================================================================
// Framing
// ============================================================================

/// A framed packet whose body has not been interpreted yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawPacket {
    pub tag: u8,
    pub body: Vec<u8>,
}

/// Appends one packet with a new-format header.
pub fn write_packet(out: &mut Vec<u8>, tag: Tag, body: &[u8]) {
    out.push(0xC0 | tag as u8);
    let len = body.len();
    if len < 192 {
        out.push(len as u8);
    } else if len < 8384 {
        let adjusted = len - 192;
        out.push(((adjusted >> 8) + 192) as u8);
        out.push((adjusted & 0xFF) as u8);
    } else {
        out.push(0xFF);
        out.extend_from_slice(&(len as u32).to_be_bytes());
    }
    out.extend_from_slice(body);
}

/// Splits a binary stream into framed packets.
pub fn read_raw_packets(data: &[u8]) -> CryptoResult<Vec<RawPacket>> {
    let mut reader = ByteReader::new(data);
    let mut packets = Vec::new();

    while !reader.is_empty() {
        let header = reader.read_u8("packet header")?;
        if header & 0x80 == 0 {
            return Err(CryptoError::MalformedEnvelope(format!(
                "invalid packet header octet 0x{header:02X} at offset {}",
                reader.position() - 1
            )));
        }

        let packet = if header & 0x40 != 0 {
            read_new_format(&mut reader, header & 0x3F)?
        } else {
            read_old_format(&mut reader, (header >> 2) & 0x0F, header & 0x03)?
        };
        packets.push(packet);
    }

    Ok(packets)
}

fn read_new_format(reader: &mut ByteReader<'_>, tag: u8) -> CryptoResult<RawPacket> {
    let mut body = Vec::new();
    loop {
        let first = reader.read_u8("packet length")?;
        match first {
            0..=191 => {
                body.extend_from_slice(reader.take(usize::from(first), "packet body")?);
                break;
            }
            192..=223 => {
                let second = reader.read_u8("packet length")?;
                let len = ((usize::from(first) - 192) << 8) + usize::from(second) + 192;
                body.extend_from_slice(reader.take(len, "packet body")?);
                break;
            }
            255 => {
                let len = reader.read_u32("packet length")? as usize;
                body.extend_from_slice(reader.take(len, "packet body")?);
                break;
            }
            // partial body length: more chunks follow
            _ => {
                let len = 1usize << (first & 0x1F);
                body.extend_from_slice(reader.take(len, "partial packet body")?);
            }
        }
    }
    Ok(RawPacket { tag, body })
}

fn read_old_format(reader: &mut ByteReader<'_>, tag: u8, length_type: u8) -> CryptoResult<RawPacket> {
    let body = match length_type {
        0 => {
            let len = reader.read_u8("packet length")?;
            reader.take(usize::from(len), "packet body")?
        }
        1 => {
            let len = reader.read_u16("packet length")?;
            reader.take(usize::from(len), "packet body")?
        }
        2 => {
            let len = reader.read_u32("packet length")?;
            reader.take(len as usize, "packet body")?
        }
        // indeterminate length: the packet runs to the end of the stream
        _ => reader.rest(),
    };
    Ok(RawPacket {
        tag,
        body: body.to_vec(),
    })
}

// ============================================================================
// Packet bodies
// ============================================================================

/// Public-key encrypted session key: names the recipient by key id and
/// carries the RSA-wrapped session key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionKeyPacket {
    pub key_id: KeyId,
    pub algorithm: u8,
    /// RSA ciphertext (big-endian magnitude).
    pub encrypted_key: Vec<u8>,
}

const SESSION_KEY_PACKET_VERSION: u8 = 3;

impl SessionKeyPacket {
    pub fn to_body(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(12 + self.encrypted_key.len());
        body.push(SESSION_KEY_PACKET_VERSION);
        body.extend_from_slice(&self.key_id.as_u64().to_be_bytes());
        body.push(self.algorithm);
        write_mpi(&mut body, &self.encrypted_key);
        body
    }

    pub fn from_body(body: &[u8]) -> CryptoResult<Self> {
        let mut reader = ByteReader::new(body);
        let version = reader.read_u8("session key packet version")?;
        if version != SESSION_KEY_PACKET_VERSION {
            return Err(CryptoError::UnsupportedMessage(format!(
                "session key packet version {version}"
            )));
        }
        let key_id = KeyId::from(reader.read_u64("session key id")?);
        let algorithm = reader.read_u8("session key algorithm")?;
        let encrypted_key = reader.read_mpi("wrapped session key")?.to_vec();
        Ok(Self {
            key_id,
            algorithm,
            encrypted_key,
        })
    }
}

/// Compressed data packet: one algorithm octet followed by the compressed
/// serialization of the inner packets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressedPacket {
    pub algorithm: CompressionAlgorithm,
    pub data: Vec<u8>,
}

impl CompressedPacket {
    pub fn to_body(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(1 + self.data.len());
        body.push(self.algorithm.id());
        body.extend_from_slice(&self.data);
        body
    }

    pub fn from_body(body: &[u8]) -> CryptoResult<Self> {
        let mut reader = ByteReader::new(body);
        let id = reader.read_u8("compression algorithm")?;
        let algorithm = CompressionAlgorithm::from_id(id).ok_or_else(|| {
            CryptoError::UnsupportedMessage(format!("compression algorithm {id}"))
        })?;
        Ok(Self {
            algorithm,
            data: reader.rest().to_vec(),
        })
    }
}

/// Literal data: the innermost payload with its file name and timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiteralData {
    pub format: u8,
    pub file_name: String,
    /// Modification time, seconds since the Unix epoch.
    pub modified: u32,
    pub data: Vec<u8>,
}

impl LiteralData {
    /// Binary literal data. Names longer than 255 bytes are truncated at a
    /// character boundary.
    pub fn binary(file_name: &str, modified: u32, data: Vec<u8>) -> Self {
        let mut end = file_name.len().min(255);
        while !file_name.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            format: LITERAL_BINARY,
            file_name: file_name[..end].to_string(),
            modified,
            data,
        }
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::from(self.modified), 0)
    }

    pub fn to_body(&self) -> Vec<u8> {
        let name = self.file_name.as_bytes();
        let mut body = Vec::with_capacity(6 + name.len() + self.data.len());
        body.push(self.format);
        body.push(name.len() as u8);
        body.extend_from_slice(name);
        body.extend_from_slice(&self.modified.to_be_bytes());
        body.extend_from_slice(&self.data);
        body
    }

    pub fn from_body(body: &[u8]) -> CryptoResult<Self> {
        let mut reader = ByteReader::new(body);
        let format = reader.read_u8("literal data format")?;
        let name_len = reader.read_u8("literal data name length")?;
        let name = reader.take(usize::from(name_len), "literal data name")?;
        let modified = reader.read_u32("literal data date")?;
        Ok(Self {
            format,
            file_name: String::from_utf8_lossy(name).into_owned(),
            modified,
            data: reader.rest().to_vec(),
        })
    }
}

// ============================================================================
// Decoded packets
// ============================================================================

/// A decoded packet, one variant per kind docseal understands.
#[derive(Clone, Debug)]
pub enum Packet {
    SessionKey(SessionKeyPacket),
    /// Symmetric-key encrypted session key (passphrase-only messages).
    SymmetricSessionKey,
    /// Integrity-protected encrypted data (version octet + CFB ciphertext).
    IntegrityProtectedData(Vec<u8>),
    /// Legacy encrypted data without modification detection.
    SymmetricallyEncryptedData(Vec<u8>),
    Compressed(CompressedPacket),
    Literal(LiteralData),
    OnePassSignature,
    Signature,
    Marker,
    PublicKey(PublicKey),
    PublicSubkey(PublicKey),
    SecretKey(SecretKey),
    SecretSubkey(SecretKey),
    UserId(String),
    Trust,
    Unknown(u8),
}

impl Packet {
    pub fn parse(raw: &RawPacket) -> CryptoResult<Self> {
        let Some(tag) = Tag::from_u8(raw.tag) else {
            return Ok(Packet::Unknown(raw.tag));
        };
        Ok(match tag {
            Tag::PublicKeyEncryptedSessionKey => {
                Packet::SessionKey(SessionKeyPacket::from_body(&raw.body)?)
            }
            Tag::SymKeyEncryptedSessionKey => Packet::SymmetricSessionKey,
            Tag::SymEncryptedIntegrityProtectedData => {
                Packet::IntegrityProtectedData(raw.body.clone())
            }
            Tag::SymEncryptedData => Packet::SymmetricallyEncryptedData(raw.body.clone()),
            Tag::CompressedData => Packet::Compressed(CompressedPacket::from_body(&raw.body)?),
            Tag::LiteralData => Packet::Literal(LiteralData::from_body(&raw.body)?),
            Tag::OnePassSignature => Packet::OnePassSignature,
            Tag::Signature => Packet::Signature,
            Tag::Marker => {
                if raw.body != MARKER_BODY {
                    return Err(CryptoError::MalformedEnvelope("invalid marker packet".into()));
                }
                Packet::Marker
            }
            Tag::PublicKey => Packet::PublicKey(PublicKey::from_body(&raw.body)?),
            Tag::PublicSubkey => Packet::PublicSubkey(PublicKey::from_body(&raw.body)?),
            Tag::SecretKey => Packet::SecretKey(SecretKey::from_body(&raw.body)?),
            Tag::SecretSubkey => Packet::SecretSubkey(SecretKey::from_body(&raw.body)?),
            Tag::UserId => Packet::UserId(String::from_utf8_lossy(&raw.body).into_owned()),
            Tag::Trust => Packet::Trust,
            Tag::ModificationDetectionCode => {
                return Err(CryptoError::MalformedEnvelope(
                    "modification detection code outside encrypted data".into(),
                ));
            }
        })
    }

    /// Human-readable packet kind, for error messages and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Packet::SessionKey(_) => "public-key encrypted session key",
            Packet::SymmetricSessionKey => "symmetric-key encrypted session key",
            Packet::IntegrityProtectedData(_) => "integrity-protected encrypted data",
            Packet::SymmetricallyEncryptedData(_) => "symmetrically encrypted data",
            Packet::Compressed(_) => "compressed data",
            Packet::Literal(_) => "literal data",
            Packet::OnePassSignature => "one-pass signature",
            Packet::Signature => "signature",
            Packet::Marker => "marker",
            Packet::PublicKey(_) => "public key",
            Packet::PublicSubkey(_) => "public subkey",
            Packet::SecretKey(_) => "secret key",
            Packet::SecretSubkey(_) => "secret subkey",
            Packet::UserId(_) => "user id",
            Packet::Trust => "trust",
            Packet::Unknown(_) => "unknown",
        }
    }
}

/// Frames and decodes every packet in a binary stream.
pub fn parse_packets(data: &[u8]) -> CryptoResult<Vec<Packet>> {
    read_raw_packets(data)?.iter().map(Packet::parse).collect()
}

/// Appends a marker packet.
pub fn write_marker(out: &mut Vec<u8>) {
    write_packet(out, Tag::Marker, MARKER_BODY);
}
