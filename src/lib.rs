// src/lib.rs
//! encrypted-field-vault: transparent field-level encryption with key rotation
//!
//! Features:
//! - AES Crypt v3 field cipher, Base64 text ciphertext
//! - Envelope keys: random data key sealed under a key passphrase
//! - Per-field encrypt-on-write / decrypt-on-read codec
//! - Key expiration monitor with periodic notices
//! - Batch rekey of `table.column` targets onto a fresh data key
//! - SQLite / SQLCipher key-record and data stores

pub mod aliases;
pub mod codec;
pub mod config;
pub mod consts;
pub mod crypto;
pub mod db;
pub mod engine;
pub mod expiration;
pub mod key_record;
pub mod rekey;
pub mod store;

pub mod error;

// Re-export everything users need at the crate root
pub use aliases::{DataKey, KeyPassphrase, LegacyPassword};
pub use codec::{DataType, DecryptFallback, FieldCodec, FieldDescriptor};
pub use config::{load as load_config, Config};
pub use crypto::{decrypt, encrypt, register_provider, CipherService};
pub use engine::{EngineRegistry, EngineSettings, EnvelopeKeyManager};
pub use error::{CoreError, KeyStoreError, NotificationError, Result};
pub use expiration::{
    ExpirationCheck, ExpirationMonitor, ExpirationPolicy, LogNotificationSink, NotificationSink,
    PeriodicScheduler,
};
pub use key_record::{InMemoryKeyRecordStore, KeyRecord, KeyRecordStore, SqliteKeyRecordStore};
pub use rekey::{
    ColumnTarget, Decryptor, IdentityDecryptor, RekeyEngine, RekeyReport, RekeySettings,
};
pub use store::{DataStore, SqliteDataStore};
