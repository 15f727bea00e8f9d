// src/error.rs
//! Public error type for the entire crate

use aescrypt_rs::AescryptError;
use thiserror::Error;

use crate::rekey::RekeyStage;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Missing or invalid required settings. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Key material is not available (initialization failed or never ran).
    #[error("Crypto engine not initialized: {0}")]
    EngineNotInitialized(String),

    /// Bad ciphertext, wrong key, or unsupported format.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Crypto operation failed: {0}")]
    Crypto(AescryptError),

    #[error("Data store error: {0}")]
    DataStore(#[from] rusqlite::Error),

    #[error("Key record store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    #[error("Notification failed: {0}")]
    Notification(#[from] NotificationError),

    #[error("Rekey already running for identifier {0}")]
    RekeyInProgress(String),

    #[error("Rekey failed during {stage} ({rows_committed} rows committed): {source}")]
    RekeyFailed {
        stage: RekeyStage,
        rows_committed: usize,
        #[source]
        source: Box<CoreError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AescryptError> for CoreError {
    fn from(err: AescryptError) -> Self {
        CoreError::Crypto(err)
    }
}

/// Failures reported by a [`crate::key_record::KeyRecordStore`]
#[derive(Error, Debug)]
pub enum KeyStoreError {
    #[error("key record already exists: {0}")]
    Duplicate(String),

    #[error("key record not found: {0}")]
    NotFound(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for KeyStoreError {
    fn from(err: rusqlite::Error) -> Self {
        KeyStoreError::Backend(err.to_string())
    }
}

/// Failures reported by a [`crate::expiration::NotificationSink`]
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("invalid address: {0}")]
    Address(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
