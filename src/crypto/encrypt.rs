// src/crypto/encrypt.rs
use std::io::Cursor;

use aescrypt_rs::aliases::Password;
use aescrypt_rs::encrypt as aescrypt_encrypt;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::consts::FIELD_KDF_ITERATIONS;
use crate::error::{CoreError, Result};

/// Encrypt plaintext → AES-Crypt v3 container (in-memory)
pub fn encrypt_to_vec(plaintext: &[u8], password: &Password, iterations: u32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    aescrypt_encrypt(Cursor::new(plaintext), &mut out, password, iterations)
        .map_err(CoreError::Crypto)?;
    Ok(out)
}

/// Encrypt a field value under `password`, returning Base64 text.
///
/// Uses [`FIELD_KDF_ITERATIONS`], which is only appropriate for random
/// high-entropy passwords such as data keys.
pub fn encrypt(plaintext: &str, password: &str) -> Result<String> {
    encrypt_with_iterations(plaintext, password, FIELD_KDF_ITERATIONS)
}

pub fn encrypt_with_iterations(plaintext: &str, password: &str, iterations: u32) -> Result<String> {
    let password = Password::new(password.to_owned());
    encrypt_text(plaintext, &password, iterations)
}

pub(crate) fn encrypt_text(plaintext: &str, password: &Password, iterations: u32) -> Result<String> {
    let container = encrypt_to_vec(plaintext.as_bytes(), password, iterations)?;
    Ok(STANDARD.encode(container))
}
