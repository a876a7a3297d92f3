//! Radix-64 ASCII armor.
//!
//! Armored output is a text block of the form:
//!
//! ```text
//! -----BEGIN PGP MESSAGE-----
//!
//! <base64, 64 columns>
//! =<base64 CRC-24>
//! -----END PGP MESSAGE-----
//! ```
//!
//! Decoding tolerates optional `Key: Value` header lines, CRLF line endings
//! and a missing checksum line. A checksum that is present must match.

use crate::error::{CryptoError, CryptoResult};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

const LINE_WIDTH: usize = 64;
const CRC24_INIT: u32 = 0x00B7_04CE;
const CRC24_POLY: u32 = 0x0186_4CFB;

/// The kind of object an armored block carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArmorKind {
    Message,
    PublicKey,
    PrivateKey,
}

impl ArmorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ArmorKind::Message => "PGP MESSAGE",
            ArmorKind::PublicKey => "PGP PUBLIC KEY BLOCK",
            ArmorKind::PrivateKey => "PGP PRIVATE KEY BLOCK",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label {
            "PGP MESSAGE" => Some(ArmorKind::Message),
            "PGP PUBLIC KEY BLOCK" => Some(ArmorKind::PublicKey),
            "PGP PRIVATE KEY BLOCK" | "PGP SECRET KEY BLOCK" => Some(ArmorKind::PrivateKey),
            _ => None,
        }
    }
}

/// Computes the OpenPGP CRC-24 checksum.
pub fn crc24(data: &[u8]) -> u32 {
    let mut crc = CRC24_INIT;
    for &byte in data {
        crc ^= u32::from(byte) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }
    crc & 0x00FF_FFFF
}

/// Wraps binary data in an armored text block.
pub fn armor(kind: ArmorKind, data: &[u8]) -> String {
    let label = kind.label();
    let encoded = STANDARD.encode(data);
    let crc = crc24(data).to_be_bytes();

    let mut out = String::with_capacity(encoded.len() + encoded.len() / LINE_WIDTH + 96);
    out.push_str("-----BEGIN ");
    out.push_str(label);
    out.push_str("-----\n\n");
    for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
        // base64 output is ASCII, so every chunk is valid UTF-8
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push('=');
    out.push_str(&STANDARD.encode(&crc[1..]));
    out.push('\n');
    out.push_str("-----END ");
    out.push_str(label);
    out.push_str("-----\n");
    out
}

/// Returns true if `data` starts (after whitespace) with an armor header line.
pub fn is_armored(data: &[u8]) -> bool {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    data[start..].starts_with(b"-----BEGIN PGP ")
}

/// Decodes every armored block in `data`, in order.
pub fn dearmor_all(data: &[u8]) -> CryptoResult<Vec<(ArmorKind, Vec<u8>)>> {
    let text = std::str::from_utf8(data)
        .map_err(|_| CryptoError::MalformedEnvelope("armored input is not valid UTF-8".into()))?;

    let mut lines = text.lines().map(|l| l.trim_end_matches('\r').trim());
    let mut blocks = Vec::new();

    while let Some(line) = lines.next() {
        if line.is_empty() {
            continue;
        }
        let label = line
            .strip_prefix("-----BEGIN ")
            .and_then(|rest| rest.strip_suffix("-----"))
            .ok_or_else(|| {
                CryptoError::MalformedEnvelope(format!("unexpected text outside armor: {line:.40}"))
            })?;
        let kind = ArmorKind::from_label(label).ok_or_else(|| {
            CryptoError::MalformedEnvelope(format!("unknown armor type: {label}"))
        })?;
        blocks.push((kind, decode_block(label, &mut lines)?));
    }

    if blocks.is_empty() {
        return Err(CryptoError::MalformedEnvelope("no armored block found".into()));
    }
    Ok(blocks)
}

/// Decodes the first armored block in `data`.
pub fn dearmor(data: &[u8]) -> CryptoResult<(ArmorKind, Vec<u8>)> {
    dearmor_all(data)?
        .into_iter()
        .next()
        .ok_or_else(|| CryptoError::MalformedEnvelope("no armored block found".into()))
}

/// Returns the binary form of `data`, removing armor when present.
///
/// Concatenated armored blocks decode to the concatenation of their
/// payloads, which is how multi-key keyring files are read.
pub fn decode(data: &[u8]) -> CryptoResult<Vec<u8>> {
    if !is_armored(data) {
        return Ok(data.to_vec());
    }
    Ok(dearmor_all(data)?
        .into_iter()
        .flat_map(|(_, bytes)| bytes)
        .collect())
}

fn decode_block<'a>(label: &str, lines: &mut impl Iterator<Item = &'a str>) -> CryptoResult<Vec<u8>> {
    let end_line = format!("-----END {label}-----");
    let mut body = String::new();
    let mut checksum: Option<&str> = None;
    let mut in_headers = true;
    let mut terminated = false;

    for line in lines.by_ref() {
        if line == end_line {
            terminated = true;
            break;
        }
        if in_headers {
            if line.is_empty() {
                in_headers = false;
                continue;
            }
            if line.contains(": ") {
                continue;
            }
            in_headers = false;
        }
        if line.is_empty() {
            continue;
        }
        if let Some(crc) = line.strip_prefix('=') {
            if crc.len() == 4 {
                checksum = Some(crc);
                continue;
            }
        }
        body.push_str(line);
    }

    if !terminated {
        return Err(CryptoError::MalformedEnvelope(format!(
            "armor block {label} is not terminated"
        )));
    }

    let data = STANDARD
        .decode(body.as_bytes())
        .map_err(|e| CryptoError::MalformedEnvelope(format!("invalid armor body: {e}")))?;

    if let Some(crc) = checksum {
        let expected = STANDARD
            .decode(crc)
            .map_err(|e| CryptoError::MalformedEnvelope(format!("invalid armor checksum: {e}")))?;
        let actual = crc24(&data).to_be_bytes();
        if expected.as_slice() != &actual[1..] {
            return Err(CryptoError::MalformedEnvelope("armor checksum mismatch".into()));
        }
    }

    Ok(data)
}
