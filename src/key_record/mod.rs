// src/key_record/mod.rs
//! Persisted envelope records and the stores that hold them
//!
//! A [`KeyRecord`] carries the data key encrypted under the key passphrase.
//! The plaintext data key never reaches a store.

mod memory;
mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::KeyStoreError;

pub use memory::InMemoryKeyRecordStore;
pub use sqlite::{open_key_db, KeyHistoryEntry, SqliteKeyRecordStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Unique engine identifier
    pub identifier: String,
    pub description: String,
    /// Data key sealed under the current key passphrase (Base64 text)
    pub encrypted_data_key: String,
    /// Updated together with `encrypted_data_key`, never on its own
    pub key_created_at: Option<DateTime<Utc>>,
}

impl KeyRecord {
    pub fn new(identifier: &str, description: &str, encrypted_data_key: String) -> Self {
        Self {
            identifier: identifier.to_owned(),
            description: description.to_owned(),
            encrypted_data_key,
            key_created_at: Some(Utc::now()),
        }
    }

    /// Replace the sealed key and its timestamp as one pair
    pub fn with_new_key(&self, encrypted_data_key: String, created_at: DateTime<Utc>) -> Self {
        Self {
            encrypted_data_key,
            key_created_at: Some(created_at),
            ..self.clone()
        }
    }
}

/// Storage trait for envelope key records
pub trait KeyRecordStore: Send + Sync {
    fn get(&self, identifier: &str) -> Result<Option<KeyRecord>, KeyStoreError>;

    /// Insert a new record; fails with [`KeyStoreError::Duplicate`] if one exists
    fn create(&self, record: KeyRecord) -> Result<(), KeyStoreError>;

    /// Replace an existing record; fails with [`KeyStoreError::NotFound`] if absent
    fn update(&self, record: KeyRecord) -> Result<(), KeyStoreError>;
}
