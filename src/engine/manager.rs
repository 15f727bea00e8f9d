// src/engine/manager.rs
//! Envelope key manager: key passphrase → sealed data key → field cipher
//!
//! On start the manager loads the [`KeyRecord`] for its identifier and
//! unseals the data key with the key passphrase. The first start for an
//! identifier bootstraps a random data key and persists it sealed. The
//! plaintext data key only ever lives inside this process.

use std::fmt;
use std::mem;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::aliases::{DataKey, KeyPassphrase};
use crate::consts::{FIELD_KDF_ITERATIONS, PASSPHRASE_KDF_ITERATIONS};
use crate::crypto::{
    decrypt, encrypt_with_iterations, generate_data_key, key_fingerprint, register_provider,
    CipherService,
};
use crate::error::{CoreError, KeyStoreError, Result};
use crate::key_record::{KeyRecord, KeyRecordStore};

/// Settings of one envelope key manager
pub struct EngineSettings {
    pub identifier: String,
    pub description: String,
    pub key_passphrase: KeyPassphrase,
    pub passphrase_kdf_iterations: u32,
    pub field_kdf_iterations: u32,
}

impl EngineSettings {
    pub fn new(identifier: impl Into<String>, key_passphrase: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            description: String::new(),
            key_passphrase: KeyPassphrase::new(key_passphrase.into()),
            passphrase_kdf_iterations: PASSPHRASE_KDF_ITERATIONS,
            field_kdf_iterations: FIELD_KDF_ITERATIONS,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn passphrase_kdf_iterations(mut self, iterations: u32) -> Self {
        self.passphrase_kdf_iterations = iterations;
        self
    }

    pub fn field_kdf_iterations(mut self, iterations: u32) -> Self {
        self.field_kdf_iterations = iterations;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.identifier.trim().is_empty() {
            return Err(CoreError::Configuration("crypto engine identifier is empty".into()));
        }
        if self.key_passphrase.expose_secret().is_empty() {
            return Err(CoreError::Configuration(format!(
                "key passphrase for {} is empty",
                self.identifier
            )));
        }
        if self.passphrase_kdf_iterations == 0 || self.field_kdf_iterations == 0 {
            return Err(CoreError::Configuration("KDF iterations must be at least 1".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for EngineSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineSettings")
            .field("identifier", &self.identifier)
            .field("description", &self.description)
            .field("key_passphrase", &"[REDACTED]")
            .field("passphrase_kdf_iterations", &self.passphrase_kdf_iterations)
            .field("field_kdf_iterations", &self.field_kdf_iterations)
            .finish()
    }
}

struct LiveKey {
    cipher: CipherService,
    fingerprint: String,
}

pub struct EnvelopeKeyManager {
    settings: EngineSettings,
    // Moved out of `settings`; replaced when a rekey seals under a new one
    passphrase: RwLock<KeyPassphrase>,
    store: Arc<dyn KeyRecordStore>,
    live: RwLock<Option<LiveKey>>,
}

impl EnvelopeKeyManager {
    /// Validate settings without touching the store
    pub fn new(mut settings: EngineSettings, store: Arc<dyn KeyRecordStore>) -> Result<Self> {
        settings.validate()?;
        let passphrase =
            mem::replace(&mut settings.key_passphrase, KeyPassphrase::new(String::new()));
        Ok(Self {
            settings,
            passphrase: RwLock::new(passphrase),
            store,
            live: RwLock::new(None),
        })
    }

    /// Validate settings and initialize.
    ///
    /// Missing settings are fatal. Initialization failures are logged and
    /// leave the manager unusable: field operations then fail with
    /// [`CoreError::EngineNotInitialized`].
    pub fn start(settings: EngineSettings, store: Arc<dyn KeyRecordStore>) -> Result<Self> {
        let manager = Self::new(settings, store)?;
        if let Err(e) = manager.initialize() {
            error!(
                identifier = %manager.settings.identifier,
                error = %e,
                "exception caught setting up the encryptor"
            );
        }
        Ok(manager)
    }

    /// Like [`Self::start`], but an initialization failure is returned
    pub fn start_strict(settings: EngineSettings, store: Arc<dyn KeyRecordStore>) -> Result<Self> {
        let manager = Self::new(settings, store)?;
        manager.initialize()?;
        Ok(manager)
    }

    /// Load (or bootstrap) the data key and make it live
    pub fn initialize(&self) -> Result<()> {
        register_provider()?;
        let data_key = self.load_or_bootstrap()?;
        self.install(&data_key);
        Ok(())
    }

    /// Re-read the key record and swap in its data key.
    ///
    /// Used after a rekey so a running process follows the new key.
    pub fn reload(&self) -> Result<()> {
        register_provider()?;
        let record = self
            .store
            .get(&self.settings.identifier)?
            .ok_or_else(|| KeyStoreError::NotFound(self.settings.identifier.clone()))?;
        let data_key = self.unseal(&record)?;
        self.install(&data_key);
        info!(identifier = %self.settings.identifier, "data key reloaded");
        Ok(())
    }

    /// Make a rekeyed data key live, together with the passphrase that now
    /// seals it in the key record
    pub(crate) fn install_rekeyed(&self, data_key: &DataKey, key_passphrase: KeyPassphrase) {
        *self.passphrase.write() = key_passphrase;
        self.install(data_key);
        info!(identifier = %self.settings.identifier, "rekeyed data key installed");
    }

    pub fn identifier(&self) -> &str {
        &self.settings.identifier
    }

    pub fn description(&self) -> &str {
        &self.settings.description
    }

    pub fn is_initialized(&self) -> bool {
        self.live.read().is_some()
    }

    /// Fingerprint of the live data key, if any
    pub fn key_fingerprint(&self) -> Option<String> {
        self.live.read().as_ref().map(|live| live.fingerprint.clone())
    }

    pub fn key_record(&self) -> Result<Option<KeyRecord>> {
        Ok(self.store.get(&self.settings.identifier)?)
    }

    pub fn encrypt_field(&self, plaintext: &str) -> Result<String> {
        let live = self.live.read();
        let live = live.as_ref().ok_or_else(|| self.not_initialized())?;
        live.cipher.encrypt(plaintext)
    }

    pub fn decrypt_field(&self, ciphertext: &str) -> Result<String> {
        let live = self.live.read();
        let live = live.as_ref().ok_or_else(|| self.not_initialized())?;
        live.cipher.decrypt(ciphertext)
    }

    fn load_or_bootstrap(&self) -> Result<DataKey> {
        let identifier = &self.settings.identifier;
        if let Some(record) = self.store.get(identifier)? {
            return self.unseal(&record);
        }

        warn!(
            identifier = %identifier,
            "crypto engine has not yet been initialized; initializing it now"
        );
        let data_key = generate_data_key();
        let record = KeyRecord::new(identifier, &self.settings.description, self.seal(&data_key)?);

        match self.store.create(record) {
            Ok(()) => {
                info!(
                    identifier = %identifier,
                    fingerprint = %key_fingerprint(&data_key),
                    "new data key created"
                );
                Ok(data_key)
            }
            // Another process bootstrapped first; its record wins.
            Err(KeyStoreError::Duplicate(_)) => {
                warn!(identifier = %identifier, "key record created concurrently; loading it");
                let record = self
                    .store
                    .get(identifier)?
                    .ok_or_else(|| KeyStoreError::NotFound(identifier.clone()))?;
                self.unseal(&record)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn seal(&self, data_key: &DataKey) -> Result<String> {
        encrypt_with_iterations(
            data_key.expose_secret(),
            self.passphrase.read().expose_secret(),
            self.settings.passphrase_kdf_iterations,
        )
    }

    fn unseal(&self, record: &KeyRecord) -> Result<DataKey> {
        decrypt(
            &record.encrypted_data_key,
            self.passphrase.read().expose_secret(),
        )
        .map(DataKey::new)
    }

    fn install(&self, data_key: &DataKey) {
        let fingerprint = key_fingerprint(data_key);
        debug!(
            identifier = %self.settings.identifier,
            fingerprint = %fingerprint,
            "encryptor is set up"
        );
        *self.live.write() = Some(LiveKey {
            cipher: CipherService::for_data_key(data_key, self.settings.field_kdf_iterations),
            fingerprint,
        });
    }

    fn not_initialized(&self) -> CoreError {
        CoreError::EngineNotInitialized(self.settings.identifier.clone())
    }
}

impl fmt::Debug for EnvelopeKeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeKeyManager")
            .field("identifier", &self.settings.identifier)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
