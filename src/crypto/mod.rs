// src/crypto/mod.rs
//! Pure cryptographic operations: no I/O, no database
//!
//! Field values are sealed in AES Crypt v3 containers (PBKDF2-HMAC-SHA512,
//! AES-256-CBC, HMAC-SHA256) and carried as Base64 text.
mod decrypt;
mod encrypt;
mod key;
mod provider;
mod service;

pub use decrypt::{decrypt, decrypt_to_vec, is_container};
pub use encrypt::{encrypt, encrypt_to_vec, encrypt_with_iterations};
pub use key::{blake3_hex, generate_data_key, key_fingerprint};
pub use provider::{is_registered, register_provider, ALGORITHM_NAME};
pub use service::CipherService;
