// src/config/defaults.rs
use std::path::PathBuf;

use crate::consts::{
    DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_KEY_EXPIRATION_DAYS,
    DEFAULT_KEY_EXPIRATION_NOTIFICATION_DAYS, DEFAULT_MAX_SKIPPED_ROWS, DEFAULT_REKEY_BATCH_SIZE,
    FIELD_KDF_ITERATIONS, PASSPHRASE_KDF_ITERATIONS,
};

pub const APP_DIR: &str = "encrypted-field-vault";
pub const DEFAULT_SMTP_PORT: u16 = 587;

pub fn passphrase_kdf_iterations() -> u32 {
    PASSPHRASE_KDF_ITERATIONS
}

pub fn field_kdf_iterations() -> u32 {
    FIELD_KDF_ITERATIONS
}

pub fn key_expiration_days() -> u32 {
    DEFAULT_KEY_EXPIRATION_DAYS
}

pub fn key_expiration_notification_days() -> u32 {
    DEFAULT_KEY_EXPIRATION_NOTIFICATION_DAYS
}

pub fn check_interval_secs() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

pub fn batch_size() -> usize {
    DEFAULT_REKEY_BATCH_SIZE
}

pub fn max_skipped_rows() -> usize {
    DEFAULT_MAX_SKIPPED_ROWS
}

pub fn smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

pub fn yes() -> bool {
    true
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

pub fn key_db() -> PathBuf {
    data_dir().join("keys.db")
}

pub fn data_db() -> PathBuf {
    data_dir().join("data.db")
}
