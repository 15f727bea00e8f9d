// src/crypto/key.rs
//! Data key generation and safe-to-log fingerprints

use blake3::Hasher;
use rand::RngCore;

use crate::aliases::DataKey;
use crate::consts::{DATA_KEY_BYTES, FINGERPRINT_HEX_LEN};

/// Generate a new random 256-bit data key, hex encoded
pub fn generate_data_key() -> DataKey {
    let mut bytes = [0u8; DATA_KEY_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    let key = DataKey::new(hex::encode(bytes));
    bytes.fill(0);
    key
}

/// Compute BLAKE3 hash and return as lowercase hex string
pub fn blake3_hex(data: &[u8]) -> String {
    Hasher::new().update(data).finalize().to_hex().to_string()
}

/// Short digest identifying a key in logs without revealing it
pub fn key_fingerprint(key: &DataKey) -> String {
    let mut hex = blake3_hex(key.expose_secret().as_bytes());
    hex.truncate(FINGERPRINT_HEX_LEN);
    hex
}
