// src/crypto/decrypt.rs
use std::io::Cursor;

use aescrypt_rs::aliases::Password;
use aescrypt_rs::decrypt as aescrypt_decrypt;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::consts::AESCRYPT_V3_HEADER;
use crate::error::{CoreError, Result};

/// Decrypt an AES-Crypt container → plaintext (in-memory)
pub fn decrypt_to_vec(ciphertext: &[u8], password: &Password) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    aescrypt_decrypt(Cursor::new(ciphertext), &mut out, password)
        .map_err(|e| CoreError::Decryption(e.to_string()))?;
    Ok(out)
}

/// Decrypt Base64 text produced by [`super::encrypt`].
///
/// Anything that is not a v3 container sealed under `password` fails with
/// [`CoreError::Decryption`].
pub fn decrypt(ciphertext: &str, password: &str) -> Result<String> {
    let password = Password::new(password.to_owned());
    decrypt_text(ciphertext, &password)
}

pub(crate) fn decrypt_text(ciphertext: &str, password: &Password) -> Result<String> {
    let container = decode_container(ciphertext)?;
    let plaintext = decrypt_to_vec(&container, password)?;
    String::from_utf8(plaintext)
        .map_err(|_| CoreError::Decryption("plaintext is not valid UTF-8".into()))
}

/// True when `ciphertext` is Base64 carrying an AES Crypt v3 header.
///
/// A value that passes this check but fails [`decrypt`] was sealed under a
/// different password; one that fails it is not ciphertext at all.
pub fn is_container(ciphertext: &str) -> bool {
    decode_container(ciphertext).is_ok()
}

fn decode_container(ciphertext: &str) -> Result<Vec<u8>> {
    let container = STANDARD
        .decode(ciphertext.trim())
        .map_err(|e| CoreError::Decryption(format!("not base64: {e}")))?;

    if container.get(..5) != Some(AESCRYPT_V3_HEADER.as_slice()) {
        return Err(CoreError::Decryption(
            "unsupported format: missing AES Crypt v3 header".into(),
        ));
    }
    Ok(container)
}
