use docseal_crypto::KdfParams;
use docseal_exchange::{ExchangeConfig, ExchangeError};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use tempfile::TempDir;

const MINIMAL: &str = r#"
[keys]
identity = "exchange <exchange@example.com>"
passphrase = "correct-horse"
"#;

#[test]
fn defaults_fill_unnamed_fields() {
    let config = ExchangeConfig::from_toml_str(MINIMAL).unwrap();
    assert_eq!(config.keys.private_key_path, PathBuf::from("keys/private.asc"));
    assert_eq!(config.keys.public_key_path, PathBuf::from("keys/public.asc"));
    assert!(config.keys.armored);
    assert_eq!(config.keys.key_size, 2048);
    assert_eq!(config.keys.kdf, KdfParams::default());
    assert_eq!(config.publish.topic, "documents");
    assert_eq!(config.publish.batch_size, 10);
    assert_eq!(config.publish.retry_count, 3);
    assert_eq!(config.store.root, PathBuf::from("store"));
    assert_eq!(config.store.prefix, "");
}

#[test]
fn full_document_parses() {
    let text = r#"
[keys]
private_key_path = "/etc/docseal/secret.asc"
public_key_path = "/etc/docseal/public.asc"
identity = "bob"
passphrase = "pw"
armored = false
key_size = 3072

[publish]
topic = "processed"
batch_size = 25
retry_count = 0

[store]
root = "/var/lib/docseal"
prefix = "outbound/"
"#;
    let config = ExchangeConfig::from_toml_str(text).unwrap();
    assert!(!config.keys.armored);
    assert_eq!(config.keys.key_size, 3072);
    assert_eq!(config.publish.batch_size, 25);
    assert_eq!(config.publish.retry_count, 0);
    assert_eq!(config.store.prefix, "outbound/");
}

#[test]
fn serialized_config_reloads() {
    let config = ExchangeConfig::from_toml_str(MINIMAL).unwrap();
    let text = config.to_toml_string().unwrap();
    assert_eq!(ExchangeConfig::from_toml_str(&text).unwrap(), config);
}

#[test]
fn load_reads_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("docseal.toml");
    std::fs::write(&path, MINIMAL).unwrap();
    let config = ExchangeConfig::load(&path).unwrap();
    assert_eq!(config.keys.identity, "exchange <exchange@example.com>");

    let err = ExchangeConfig::load(&dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ExchangeError::Config(_)));
}

#[test]
fn invalid_values_are_rejected() {
    let cases = [
        ("empty identity", "[keys]\nidentity = \"  \"\npassphrase = \"pw\"\n"),
        ("empty passphrase", "[keys]\nidentity = \"a\"\npassphrase = \"\"\n"),
        ("small key", "[keys]\nidentity = \"a\"\npassphrase = \"pw\"\nkey_size = 512\n"),
        ("large key", "[keys]\nidentity = \"a\"\npassphrase = \"pw\"\nkey_size = 8192\n"),
        ("odd key", "[keys]\nidentity = \"a\"\npassphrase = \"pw\"\nkey_size = 2049\n"),
        (
            "same paths",
            "[keys]\nidentity = \"a\"\npassphrase = \"pw\"\nprivate_key_path = \"k\"\npublic_key_path = \"k\"\n",
        ),
        (
            "zero batch",
            "[keys]\nidentity = \"a\"\npassphrase = \"pw\"\n[publish]\nbatch_size = 0\n",
        ),
        (
            "empty topic",
            "[keys]\nidentity = \"a\"\npassphrase = \"pw\"\n[publish]\ntopic = \"\"\n",
        ),
        ("bad toml", "[keys\n"),
        ("wrong type", "[publish]\nbatch_size = \"ten\"\n"),
    ];
    for (label, text) in cases {
        let err = ExchangeConfig::from_toml_str(text).unwrap_err();
        assert!(matches!(err, ExchangeError::Config(_)), "{label}: {err}");
    }
}

#[test]
fn debug_output_hides_passphrase() {
    let config = ExchangeConfig::from_toml_str(MINIMAL).unwrap();
    let debug = format!("{config:?}");
    assert!(!debug.contains("correct-horse"));
    assert!(debug.contains("[REDACTED]"));
}
