// src/rekey/lease.rs
//! In-process lease: at most one rekey run per key-record identifier

use std::collections::HashSet;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::error::{CoreError, Result};

static ACTIVE: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Held for the duration of a run; released on drop
#[derive(Debug)]
pub struct RekeyLease {
    identifier: String,
}

impl RekeyLease {
    pub fn acquire(identifier: &str) -> Result<Self> {
        if !ACTIVE.lock().insert(identifier.to_owned()) {
            return Err(CoreError::RekeyInProgress(identifier.to_owned()));
        }
        Ok(Self {
            identifier: identifier.to_owned(),
        })
    }

    pub fn is_held(identifier: &str) -> bool {
        ACTIVE.lock().contains(identifier)
    }
}

impl Drop for RekeyLease {
    fn drop(&mut self) {
        ACTIVE.lock().remove(&self.identifier);
    }
}
