// tests/config_tests.rs
use std::fs;
use std::sync::Arc;

use encrypted_field_vault::codec::DataType;
use encrypted_field_vault::config::{Config, DecryptorKind};
use encrypted_field_vault::consts::{
    DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_KEY_EXPIRATION_DAYS, DEFAULT_REKEY_BATCH_SIZE,
    PASSPHRASE_KDF_ITERATIONS,
};
use encrypted_field_vault::error::CoreError;
use encrypted_field_vault::rekey::Decryptor;
use encrypted_field_vault::{EnvelopeKeyManager, InMemoryKeyRecordStore};
use tempfile::tempdir;

mod common;

const FULL: &str = r#"
[engine]
identifier = "pci-card-data"
description = "Card numbers"
key_passphrase = "from-file"
passphrase_kdf_iterations = 5

[expiration]
check_expiration = true
key_expiration_days = 180
key_expiration_notification_days = 14
notification_recipient = "security@example.com"
check_interval_secs = 3600

[rekey]
table_columns = ["orders.cardNumber", "customers.cardNumber", "broken"]
new_key_passphrase = "next-passphrase"
batch_size = 50
max_skipped_rows = 3
commit_on_failure = false

[rekey.decryptor]
kind = "legacy"
legacy_password = "old-password"

[paths]
key_db = "/tmp/efv/keys.db"
data_db = "/tmp/efv/data.db"

[notification.smtp]
host = "smtp.example.com"
from_address = "vault@example.com"

[[fields]]
item_descriptor = "order"
property = "cardNumber"
crypto_engine = "cardEngine"

[[fields]]
item_descriptor = "order"
property = "cardMask"
crypto_engine = "cardEngine"
encrypt_only = true
"#;

#[test]
fn test_full_config_parses() {
    common::setup();
    let config = Config::from_toml_str(FULL).unwrap();
    config.validate().unwrap();

    assert_eq!(config.engine.identifier, "pci-card-data");
    assert_eq!(config.expiration.key_expiration_days, 180);
    assert_eq!(config.rekey.decryptor.kind, DecryptorKind::Legacy);
    assert!(!config.rekey.commit_on_failure);

    let smtp = config.notification.smtp.as_ref().unwrap();
    assert_eq!(smtp.port, 587);
    assert!(smtp.use_tls);

    assert_eq!(config.fields.len(), 2);
    assert_eq!(config.fields[0].data_type, DataType::Text);
    assert!(config.fields[1].encrypt_only);

    let policy = config.expiration_policy();
    assert!(policy.enabled);
    assert_eq!(policy.key_expiration_notification_days, 14);
    assert_eq!(config.check_interval().as_secs(), 3600);

    let rekey = config.rekey_settings();
    assert_eq!(rekey.identifier, "pci-card-data");
    assert_eq!(rekey.targets.len(), 2);
    assert_eq!(rekey.batch_size, 50);
    assert_eq!(rekey.max_skipped_rows, 3);
    assert!(!rekey.commit_on_failure);
    assert_eq!(rekey.new_key_passphrase.expose_secret(), "next-passphrase");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let config = Config::from_toml_str(
        r#"
        [engine]
        identifier = "pci"
        key_passphrase = "secret"
        "#,
    )
    .unwrap();
    config.validate().unwrap();

    assert_eq!(config.engine.passphrase_kdf_iterations, PASSPHRASE_KDF_ITERATIONS);
    assert!(!config.expiration.check_expiration);
    assert_eq!(config.expiration.key_expiration_days, DEFAULT_KEY_EXPIRATION_DAYS);
    assert_eq!(config.expiration.check_interval_secs, DEFAULT_CHECK_INTERVAL_SECS);
    assert_eq!(config.rekey.batch_size, DEFAULT_REKEY_BATCH_SIZE);
    assert!(config.rekey.commit_on_failure);
    assert_eq!(config.rekey.decryptor.kind, DecryptorKind::CurrentEngine);
    assert!(config.fields.is_empty());
    assert!(config.paths.key_db.ends_with("keys.db"));

    // Without a new passphrase rekey keeps the current one
    let rekey = config.rekey_settings();
    assert_eq!(rekey.new_key_passphrase.expose_secret(), "secret");
}

fn invalid(toml: &str) -> CoreError {
    Config::from_toml_str(toml).unwrap().validate().unwrap_err()
}

#[test]
fn test_validation_rejects_missing_or_inconsistent_settings() {
    let cases = [
        "[engine]\nidentifier = \"\"\nkey_passphrase = \"x\"",
        "[engine]\nidentifier = \"pci\"",
        "[engine]\nidentifier = \"pci\"\nkey_passphrase = \"x\"\n[expiration]\nkey_expiration_days = 0",
        "[engine]\nidentifier = \"pci\"\nkey_passphrase = \"x\"\n[expiration]\nkey_expiration_days = 30\nkey_expiration_notification_days = 30",
        "[engine]\nidentifier = \"pci\"\nkey_passphrase = \"x\"\n[expiration]\ncheck_expiration = true",
        "[engine]\nidentifier = \"pci\"\nkey_passphrase = \"x\"\n[rekey]\nbatch_size = 0",
    ];
    for toml in cases {
        assert!(matches!(invalid(toml), CoreError::Configuration(_)), "{toml}");
    }
}

#[test]
fn test_malformed_toml_is_a_configuration_error() {
    let err = Config::from_toml_str("[engine\nidentifier = ").unwrap_err();
    assert!(matches!(err, CoreError::Configuration(_)));

    let err = Config::from_toml_str("[rekey.decryptor]\nkind = \"reflection\"").unwrap_err();
    assert!(matches!(err, CoreError::Configuration(_)));
}

#[test]
fn test_from_path_reads_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("efv.toml");
    fs::write(&path, FULL).unwrap();

    let config = Config::from_path(&path).unwrap();
    assert_eq!(config.engine.identifier, "pci-card-data");

    let missing = Config::from_path(&dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(missing, CoreError::Io(_)));
}

#[test]
fn test_decryptor_section_builds_each_kind() {
    let mut config = Config::from_toml_str(FULL).unwrap();
    let engine = Arc::new(
        EnvelopeKeyManager::start_strict(
            config.engine_settings(),
            Arc::new(InMemoryKeyRecordStore::new()),
        )
        .unwrap(),
    );
    let ciphertext = engine.encrypt_field("4111").unwrap();

    let legacy = config.rekey.decryptor.build(&engine).unwrap();
    let sealed = encrypted_field_vault::crypto::encrypt("4111", "old-password").unwrap();
    assert_eq!(legacy.decrypt(&sealed).unwrap(), "4111");

    config.rekey.decryptor.kind = DecryptorKind::CurrentEngine;
    let current = config.rekey.decryptor.build(&engine).unwrap();
    assert_eq!(current.decrypt(&ciphertext).unwrap(), "4111");

    config.rekey.decryptor.kind = DecryptorKind::Identity;
    let identity = config.rekey.decryptor.build(&engine).unwrap();
    assert_eq!(identity.decrypt("plain").unwrap(), "plain");

    config.rekey.decryptor.kind = DecryptorKind::Legacy;
    config.rekey.decryptor.legacy_password = None;
    assert!(matches!(
        config.rekey.decryptor.build(&engine),
        Err(CoreError::Configuration(_))
    ));
}
