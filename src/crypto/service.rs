// src/crypto/service.rs
//! A cipher bound to one password
//!
//! The envelope manager holds one of these for the live data key; rekey
//! builds a fresh one around the new key.

use std::fmt;

use aescrypt_rs::aliases::Password;

use super::decrypt::decrypt_text;
use super::encrypt::encrypt_text;
use crate::aliases::DataKey;
use crate::error::Result;

pub struct CipherService {
    password: Password,
    iterations: u32,
}

impl CipherService {
    pub fn new(password: &str, iterations: u32) -> Self {
        Self {
            password: Password::new(password.to_owned()),
            iterations,
        }
    }

    pub fn for_data_key(key: &DataKey, iterations: u32) -> Self {
        Self::new(key.expose_secret(), iterations)
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        encrypt_text(plaintext, &self.password, self.iterations)
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String> {
        decrypt_text(ciphertext, &self.password)
    }
}

impl fmt::Debug for CipherService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherService")
            .field("password", &"[REDACTED]")
            .field("iterations", &self.iterations)
            .finish()
    }
}
