// src/key_record/memory.rs
use std::collections::HashMap;

use parking_lot::RwLock;

use super::{KeyRecord, KeyRecordStore};
use crate::error::KeyStoreError;

/// In-memory implementation of KeyRecordStore
///
/// Suitable for tests and embedding. Records are lost when the process exits.
#[derive(Default)]
pub struct InMemoryKeyRecordStore {
    records: RwLock<HashMap<String, KeyRecord>>,
}

impl InMemoryKeyRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl KeyRecordStore for InMemoryKeyRecordStore {
    fn get(&self, identifier: &str) -> Result<Option<KeyRecord>, KeyStoreError> {
        Ok(self.records.read().get(identifier).cloned())
    }

    fn create(&self, record: KeyRecord) -> Result<(), KeyStoreError> {
        let mut records = self.records.write();
        if records.contains_key(&record.identifier) {
            return Err(KeyStoreError::Duplicate(record.identifier));
        }
        records.insert(record.identifier.clone(), record);
        Ok(())
    }

    fn update(&self, record: KeyRecord) -> Result<(), KeyStoreError> {
        let mut records = self.records.write();
        match records.get_mut(&record.identifier) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(KeyStoreError::NotFound(record.identifier)),
        }
    }
}
