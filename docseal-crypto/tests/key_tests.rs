use docseal_crypto::armor::{ArmorKind, dearmor};
use docseal_crypto::{
    CryptoError, KdfParams, KeyPair, PublicKeyring, SecretKeyring, decrypt, encrypt,
};
use pretty_assertions::assert_eq;

fn generate(identity: &str) -> KeyPair {
    KeyPair::generate_with_params("hunter2", identity, 1024, &KdfParams::interactive()).unwrap()
}

#[test]
fn exported_keys_reload_and_interoperate() {
    let pair = generate("ops <ops@example.com>");
    let mut private_out = Vec::new();
    let mut public_out = Vec::new();
    pair.write_to(&mut private_out, &mut public_out, true).unwrap();

    let (kind, _) = dearmor(&public_out).unwrap();
    assert_eq!(kind, ArmorKind::PublicKey);
    let (kind, _) = dearmor(&private_out).unwrap();
    assert_eq!(kind, ArmorKind::PrivateKey);

    let public_ring = PublicKeyring::from_bytes(&public_out).unwrap();
    let secret_ring = SecretKeyring::from_bytes(&private_out).unwrap();

    let recipient = public_ring.encryption_key().unwrap();
    assert_eq!(recipient.key_id(), pair.key_id());
    assert_eq!(public_ring.entries()[0].user_ids, vec!["ops <ops@example.com>".to_string()]);

    let envelope = encrypt(b"reloaded", "r", recipient, false).unwrap();
    assert_eq!(decrypt(&envelope, &secret_ring, "hunter2").unwrap(), b"reloaded");
}

#[test]
fn binary_exports_reload() {
    let pair = generate("binary");
    let public_ring = PublicKeyring::from_bytes(&pair.public_key_bytes(false)).unwrap();
    let secret_ring = SecretKeyring::from_bytes(&pair.secret_key_bytes(false)).unwrap();
    assert_eq!(public_ring.len(), 1);
    assert_eq!(secret_ring.key_ids().collect::<Vec<_>>(), vec![pair.key_id()]);
}

#[test]
fn key_id_is_stable_across_serialization() {
    let pair = generate("stable");
    let ring = PublicKeyring::from_bytes(&pair.public_key_bytes(true)).unwrap();
    let reloaded = ring.get(pair.key_id()).unwrap();
    assert_eq!(reloaded.fingerprint(), pair.public_key().fingerprint());
    assert_eq!(reloaded.created_at(), pair.public_key().created_at());
}

#[test]
fn two_generations_are_unrelated() {
    let a = generate("same identity");
    let b = generate("same identity");
    assert_ne!(a.key_id(), b.key_id());
    assert_ne!(a.public_key(), b.public_key());
}

#[test]
fn corrupted_secret_key_file_is_rejected() {
    let pair = generate("corrupt");
    let mut binary = pair.secret_key_bytes(false);
    binary.truncate(40);
    let err = SecretKeyring::from_bytes(&binary).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidKey(_)));
}

#[test]
fn sealed_secret_rejects_other_passphrase() {
    let pair = generate("locked");
    let ring = SecretKeyring::from_bytes(&pair.secret_key_bytes(true)).unwrap();
    let secret = ring.get(pair.key_id()).unwrap();
    assert!(secret.unlock("hunter2").is_ok());
    assert!(matches!(
        secret.unlock("hunter3").unwrap_err(),
        CryptoError::Passphrase { .. }
    ));
}
