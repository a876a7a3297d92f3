//! Public-key envelopes.
//!
//! An envelope carries one payload for one recipient:
//!
//! ```text
//! [marker] ‖ session key packet(key id, RSA(sym ‖ session key ‖ checksum)) ‖ encrypted data packet
//!                                                                             └─ compressed ─ literal(name, time, payload)
//! ```
//!
//! The session key is random per envelope. Integrity-protected data packets
//! are verified in full before any inner packet is parsed, so a tampered
//! envelope never yields plaintext.

use crate::armor::{self, ArmorKind};
use crate::compression::{self, CompressionAlgorithm};
use crate::error::{CryptoError, CryptoResult};
use crate::keyring::SecretKeyring;
use crate::keys::{KeyId, PublicKey, UnlockedKey};
use crate::packet::{
    CompressedPacket, LiteralData, Packet, SessionKeyPacket, Tag, parse_packets, write_packet,
};
use crate::symmetric::{self, SymmetricAlgorithm};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// How an envelope is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptOptions {
    /// Radix-64 armor the output.
    pub armored: bool,
    pub symmetric: SymmetricAlgorithm,
    pub compression: CompressionAlgorithm,
    /// Emit an integrity-protected data packet. When false the legacy
    /// packet without modification detection is written.
    pub integrity_protected: bool,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        Self {
            armored: true,
            symmetric: SymmetricAlgorithm::default(),
            compression: CompressionAlgorithm::default(),
            integrity_protected: true,
        }
    }
}

/// What can be learned about an envelope without key material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvelopeInfo {
    pub recipients: Vec<KeyId>,
    pub integrity_protected: bool,
    pub armored: bool,
}

/// Encrypts `payload` for `recipient` with default options.
pub fn encrypt(
    payload: &[u8],
    payload_name: &str,
    recipient: &PublicKey,
    armored: bool,
) -> CryptoResult<Vec<u8>> {
    let options = EncryptOptions {
        armored,
        ..EncryptOptions::default()
    };
    encrypt_with_options(payload, payload_name, recipient, &options)
}

/// Encrypts `payload` for `recipient`.
pub fn encrypt_with_options(
    payload: &[u8],
    payload_name: &str,
    recipient: &PublicKey,
    options: &EncryptOptions,
) -> CryptoResult<Vec<u8>> {
    if !recipient.can_encrypt() {
        return Err(CryptoError::Encryption(format!(
            "key {} is not an encryption key",
            recipient.key_id()
        )));
    }
    debug!(
        key_id = %recipient.key_id(),
        size = payload.len(),
        name = payload_name,
        "encrypting payload"
    );

    let modified = u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX);
    let literal = LiteralData::binary(payload_name, modified, payload.to_vec());
    let mut literal_packet = Zeroizing::new(Vec::new());
    write_packet(&mut literal_packet, Tag::LiteralData, &literal.to_body());

    let compressed = CompressedPacket {
        algorithm: options.compression,
        data: compression::compress(options.compression, &literal_packet)?,
    };
    let mut inner = Zeroizing::new(Vec::new());
    write_packet(&mut inner, Tag::CompressedData, &compressed.to_body());

    let session_key = options.symmetric.generate_session_key();
    let (data_tag, data_body) = if options.integrity_protected {
        (
            Tag::SymEncryptedIntegrityProtectedData,
            symmetric::seal_integrity_protected(options.symmetric, &session_key, &inner)?,
        )
    } else {
        (
            Tag::SymEncryptedData,
            symmetric::seal_legacy(options.symmetric, &session_key, &inner)?,
        )
    };

    let session_packet = SessionKeyPacket {
        key_id: recipient.key_id(),
        algorithm: recipient.algorithm(),
        encrypted_key: recipient
            .encrypt_session_key(&format_session_key(options.symmetric, &session_key))?,
    };

    let mut out = Vec::with_capacity(data_body.len() + session_packet.encrypted_key.len() + 32);
    write_packet(&mut out, Tag::PublicKeyEncryptedSessionKey, &session_packet.to_body());
    write_packet(&mut out, data_tag, &data_body);

    let envelope = if options.armored {
        armor::armor(ArmorKind::Message, &out).into_bytes()
    } else {
        out
    };

    info!(
        key_id = %recipient.key_id(),
        payload = payload.len(),
        envelope = envelope.len(),
        armored = options.armored,
        "payload encrypted"
    );
    Ok(envelope)
}

/// Decrypts an envelope and returns the payload bytes.
pub fn decrypt(envelope: &[u8], keyring: &SecretKeyring, passphrase: &str) -> CryptoResult<Vec<u8>> {
    Ok(decrypt_message(envelope, keyring, passphrase)?.data)
}

/// Decrypts an envelope and returns the literal data with its embedded name
/// and timestamp.
pub fn decrypt_message(
    envelope: &[u8],
    keyring: &SecretKeyring,
    passphrase: &str,
) -> CryptoResult<LiteralData> {
    let binary = armor::decode(envelope)?;
    let (session_packets, data_packet) = split_envelope(parse_packets(&binary)?)?;

    let requested: Vec<KeyId> = session_packets.iter().map(|p| p.key_id).collect();
    debug!(recipients = ?requested, size = envelope.len(), "decrypting envelope");

    let (session_packet, unlocked) = unlock_recipient(&session_packets, keyring, passphrase)?;
    let (algorithm, session_key) = unwrap_session_key(session_packet, &unlocked)?;

    let plaintext = match data_packet {
        Packet::IntegrityProtectedData(body) => {
            symmetric::open_integrity_protected(algorithm, &session_key, &body)?
        }
        Packet::SymmetricallyEncryptedData(body) => {
            warn!(key_id = %unlocked.key_id(), "envelope has no integrity protection");
            symmetric::open_legacy(algorithm, &session_key, &body)?
        }
        other => {
            return Err(CryptoError::MalformedEnvelope(format!(
                "expected encrypted data, found {}",
                other.name()
            )));
        }
    };

    let literal = read_literal(&plaintext)?;
    info!(
        key_id = %unlocked.key_id(),
        size = literal.data.len(),
        name = %literal.file_name,
        "envelope decrypted"
    );
    Ok(literal)
}

/// Reads the outer packets of an envelope without decrypting anything.
pub fn inspect(envelope: &[u8]) -> CryptoResult<EnvelopeInfo> {
    let armored = armor::is_armored(envelope);
    let binary = armor::decode(envelope)?;
    let (session_packets, data_packet) = split_envelope(parse_packets(&binary)?)?;
    Ok(EnvelopeInfo {
        recipients: session_packets.iter().map(|p| p.key_id).collect(),
        integrity_protected: matches!(data_packet, Packet::IntegrityProtectedData(_)),
        armored,
    })
}

/// Splits the outer packet sequence into session key packets and the one
/// encrypted data packet that must follow them.
fn split_envelope(packets: Vec<Packet>) -> CryptoResult<(Vec<SessionKeyPacket>, Packet)> {
    let mut session_packets = Vec::new();
    let mut packets = packets.into_iter();

    let data_packet = loop {
        match packets.next() {
            Some(Packet::Marker) if session_packets.is_empty() => {}
            Some(Packet::SessionKey(packet)) => session_packets.push(packet),
            // passphrase-only recipients are not addressable here
            Some(Packet::SymmetricSessionKey) => {}
            Some(
                packet @ (Packet::IntegrityProtectedData(_) | Packet::SymmetricallyEncryptedData(_)),
            ) => break packet,
            Some(other) => {
                return Err(CryptoError::MalformedEnvelope(format!(
                    "unexpected {} packet before encrypted data",
                    other.name()
                )));
            }
            None => {
                return Err(CryptoError::MalformedEnvelope(
                    "envelope has no encrypted data packet".into(),
                ));
            }
        }
    };

    if session_packets.is_empty() {
        return Err(CryptoError::MalformedEnvelope(
            "envelope has no public-key encrypted session key".into(),
        ));
    }
    if let Some(extra) = packets.next() {
        return Err(CryptoError::MalformedEnvelope(format!(
            "unexpected {} packet after encrypted data",
            extra.name()
        )));
    }
    Ok((session_packets, data_packet))
}

/// Finds the first session key packet whose key is in the keyring and
/// unlocks with `passphrase`.
fn unlock_recipient<'a>(
    session_packets: &'a [SessionKeyPacket],
    keyring: &SecretKeyring,
    passphrase: &str,
) -> CryptoResult<(&'a SessionKeyPacket, UnlockedKey)> {
    let mut locked_out = None;

    for packet in session_packets {
        let Some(secret) = keyring.get(packet.key_id) else {
            debug!(key_id = %packet.key_id, "no secret key for recipient");
            continue;
        };
        match secret.unlock(passphrase) {
            Ok(unlocked) => return Ok((packet, unlocked)),
            Err(CryptoError::Passphrase { key_id }) => {
                warn!(key_id = %key_id, "passphrase rejected for secret key");
                locked_out.get_or_insert(key_id);
            }
            Err(e) => return Err(e),
        }
    }

    Err(match locked_out {
        Some(key_id) => CryptoError::Passphrase { key_id },
        None => CryptoError::SecretKeyNotFound {
            requested: session_packets.iter().map(|p| p.key_id).collect(),
        },
    })
}

/// `sym algorithm ‖ session key ‖ u16 checksum`
fn format_session_key(algorithm: SymmetricAlgorithm, key: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut message = Zeroizing::new(Vec::with_capacity(key.len() + 3));
    message.push(algorithm.id());
    message.extend_from_slice(key);
    message.extend_from_slice(&checksum(key).to_be_bytes());
    message
}

fn checksum(key: &[u8]) -> u16 {
    key.iter()
        .fold(0u16, |sum, byte| sum.wrapping_add(u16::from(*byte)))
}

fn unwrap_session_key(
    packet: &SessionKeyPacket,
    unlocked: &UnlockedKey,
) -> CryptoResult<(SymmetricAlgorithm, Zeroizing<Vec<u8>>)> {
    let message = unlocked.decrypt_session_key(&packet.encrypted_key)?;
    if message.len() < 3 {
        return Err(CryptoError::MalformedEnvelope("session key is too short".into()));
    }

    let algorithm = SymmetricAlgorithm::from_id(message[0]).ok_or_else(|| {
        CryptoError::UnsupportedMessage(format!("symmetric algorithm {}", message[0]))
    })?;
    let key = &message[1..message.len() - 2];
    if key.len() != algorithm.key_size() {
        return Err(CryptoError::InvalidKeyLength {
            expected: algorithm.key_size(),
            actual: key.len(),
        });
    }
    let stored = u16::from_be_bytes([message[message.len() - 2], message[message.len() - 1]]);
    if stored != checksum(key) {
        return Err(CryptoError::MalformedEnvelope("session key checksum mismatch".into()));
    }

    Ok((algorithm, Zeroizing::new(key.to_vec())))
}

/// Walks the decrypted packet stream down to the literal data: one level of
/// compression is unwrapped, signed messages are refused.
fn read_literal(plaintext: &[u8]) -> CryptoResult<LiteralData> {
    let mut packet = first_packet(plaintext)?;

    if let Packet::Compressed(compressed) = packet {
        let inner = Zeroizing::new(compression::decompress(compressed.algorithm, &compressed.data)?);
        packet = first_packet(&inner)?;
    }

    match packet {
        Packet::Literal(literal) => Ok(literal),
        Packet::OnePassSignature | Packet::Signature => Err(CryptoError::UnsupportedMessage(
            "encrypted message contains a signed message, not literal data".into(),
        )),
        other => Err(CryptoError::UnsupportedMessage(format!(
            "message is not a simple encrypted file: found {}",
            other.name()
        ))),
    }
}

fn first_packet(data: &[u8]) -> CryptoResult<Packet> {
    parse_packets(data)?
        .into_iter()
        .next()
        .ok_or_else(|| CryptoError::MalformedEnvelope("encrypted data is empty".into()))
}
