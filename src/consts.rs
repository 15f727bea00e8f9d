// src/consts.rs
//! Shared constants: security parameters and defaults

/// KDF iterations when a human passphrase protects the data key.
/// Matches the AES Crypt v3 reference default.
pub const PASSPHRASE_KDF_ITERATIONS: u32 = 300_000;

/// KDF iterations for field values. Data keys are 256-bit random, so
/// stretching adds cost without adding security.
pub const FIELD_KDF_ITERATIONS: u32 = 1;

/// Random bytes in a freshly generated data key (hex encoded → 64 chars)
pub const DATA_KEY_BYTES: usize = 32;

/// Hex characters of a BLAKE3 digest shown in logs instead of key material
pub const FINGERPRINT_HEX_LEN: usize = 16;

/// Header magic for AES-Crypt v3 containers
pub const AESCRYPT_V3_HEADER: &[u8; 5] = b"AES\x03\x00";

pub const DEFAULT_KEY_EXPIRATION_DAYS: u32 = 365;
pub const DEFAULT_KEY_EXPIRATION_NOTIFICATION_DAYS: u32 = 30;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Rows fetched per cursor page during rekey
pub const DEFAULT_REKEY_BATCH_SIZE: usize = 500;

/// Malformed rows tolerated before a rekey run aborts
pub const DEFAULT_MAX_SKIPPED_ROWS: usize = 100;

/// Recommended KDF iterations for SQLCipher databases (2025+)
pub const DB_KDF_ITERATIONS: u32 = 256_000;

/// Declarative attribute naming the engine of an encrypted field
pub const CRYPTO_ENGINE_ATTRIBUTE: &str = "cryptoEngine";

/// Declarative attribute marking an encrypted field write-only
pub const ENCRYPT_ONLY_ATTRIBUTE: &str = "encryptOnly";
