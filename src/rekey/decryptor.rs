// src/rekey/decryptor.rs
//! Decryptor capability: how the rekey engine reads the old representation

use std::fmt;

use crate::aliases::LegacyPassword;
use crate::crypto::decrypt;
use crate::engine::EnvelopeKeyManager;
use crate::error::Result;

pub trait Decryptor: Send + Sync {
    fn decrypt(&self, stored: &str) -> Result<String>;
}

/// Stored values are plaintext (first-time encryption of legacy data)
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityDecryptor;

impl Decryptor for IdentityDecryptor {
    fn decrypt(&self, stored: &str) -> Result<String> {
        Ok(stored.to_owned())
    }
}

/// Stored values are ciphertext under a known password
pub struct CipherDecryptor {
    password: LegacyPassword,
}

impl CipherDecryptor {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: LegacyPassword::new(password.into()),
        }
    }
}

impl Decryptor for CipherDecryptor {
    fn decrypt(&self, stored: &str) -> Result<String> {
        decrypt(stored, self.password.expose_secret())
    }
}

impl fmt::Debug for CipherDecryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CipherDecryptor([REDACTED])")
    }
}

/// Stored values are ciphertext under the engine's live data key
impl Decryptor for EnvelopeKeyManager {
    fn decrypt(&self, stored: &str) -> Result<String> {
        self.decrypt_field(stored)
    }
}

/// Adapts any closure
pub struct FnDecryptor<F>(pub F);

impl<F> Decryptor for FnDecryptor<F>
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn decrypt(&self, stored: &str) -> Result<String> {
        (self.0)(stored)
    }
}
