// src/codec.rs
//! Transparent per-field encryption
//!
//! A [`FieldCodec`] sits between a record layer and storage for one
//! encrypted property: values are sealed on write and opened on read.
//!
//! # Decrypt fallback
//!
//! When a stored value does not decrypt under the live key, `read` returns
//! the stored value unchanged instead of failing. This keeps rows written
//! before encryption was enabled (or not yet rekeyed) readable. It also means
//! callers may receive ciphertext or legacy plaintext where they expected
//! decrypted data. Every fallback is logged, counted, and passed to the hook
//! registered with [`FieldCodec::on_fallback`].
//!
//! An engine without a live key is not a decrypt failure: reads then fail
//! with [`CoreError::EngineNotInitialized`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::consts::{CRYPTO_ENGINE_ATTRIBUTE, ENCRYPT_ONLY_ATTRIBUTE};
use crate::engine::{EngineRegistry, EnvelopeKeyManager};
use crate::error::{CoreError, Result};

/// Storage type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Text,
    Integer,
    Real,
    Boolean,
    Timestamp,
    Blob,
}

/// Declarative description of one encrypted property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub item_descriptor: String,
    pub property: String,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub multi_valued: bool,
    /// Name the envelope key manager is registered under
    #[serde(default)]
    pub crypto_engine: String,
    /// Stored ciphertext is returned verbatim on read
    #[serde(default)]
    pub encrypt_only: bool,
    /// Stored value that reads back as null
    #[serde(default)]
    pub null_marker: Option<String>,
}

impl FieldDescriptor {
    pub fn new(item_descriptor: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            item_descriptor: item_descriptor.into(),
            property: property.into(),
            data_type: DataType::Text,
            multi_valued: false,
            crypto_engine: String::new(),
            encrypt_only: false,
            null_marker: None,
        }
    }

    pub fn crypto_engine(mut self, name: impl Into<String>) -> Self {
        self.crypto_engine = name.into();
        self
    }

    pub fn encrypt_only(mut self, encrypt_only: bool) -> Self {
        self.encrypt_only = encrypt_only;
        self
    }

    pub fn null_marker(mut self, marker: impl Into<String>) -> Self {
        self.null_marker = Some(marker.into());
        self
    }

    /// Apply a declarative attribute (`cryptoEngine`, `encryptOnly`).
    /// Unknown attributes are ignored.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        if name.eq_ignore_ascii_case(CRYPTO_ENGINE_ATTRIBUTE) {
            self.crypto_engine = value.to_owned();
        } else if name.eq_ignore_ascii_case(ENCRYPT_ONLY_ATTRIBUTE)
            && value.eq_ignore_ascii_case("true")
        {
            self.encrypt_only = true;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.data_type != DataType::Text {
            return Err(CoreError::Configuration(format!(
                "{}: encrypted properties must be text, not {:?}",
                self.path(),
                self.data_type
            )));
        }
        if self.multi_valued {
            return Err(CoreError::Configuration(format!(
                "{}: encrypted properties must be scalars",
                self.path()
            )));
        }
        if self.crypto_engine.trim().is_empty() {
            return Err(CoreError::Configuration(format!(
                "{}: no crypto engine configured",
                self.path()
            )));
        }
        Ok(())
    }

    pub fn path(&self) -> String {
        format!("{}.{}", self.item_descriptor, self.property)
    }
}

/// Emitted whenever a read falls back to the raw stored value
#[derive(Debug, Clone)]
pub struct DecryptFallback {
    pub item_descriptor: String,
    pub property: String,
    pub error: String,
}

type FallbackHook = Arc<dyn Fn(&DecryptFallback) + Send + Sync>;

pub struct FieldCodec {
    descriptor: FieldDescriptor,
    registry: Arc<EngineRegistry>,
    engine: OnceCell<Arc<EnvelopeKeyManager>>,
    fallback_hook: Option<FallbackHook>,
    fallbacks: AtomicU64,
}

impl FieldCodec {
    /// Build a codec, rejecting descriptors that cannot be encrypted
    pub fn new(descriptor: FieldDescriptor, registry: Arc<EngineRegistry>) -> Result<Self> {
        descriptor.validate()?;
        Ok(Self {
            descriptor,
            registry,
            engine: OnceCell::new(),
            fallback_hook: None,
            fallbacks: AtomicU64::new(0),
        })
    }

    pub fn on_fallback(mut self, hook: impl Fn(&DecryptFallback) + Send + Sync + 'static) -> Self {
        self.fallback_hook = Some(Arc::new(hook));
        self
    }

    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    /// Encrypted properties stay queryable (by exact ciphertext)
    pub fn is_queryable(&self) -> bool {
        true
    }

    /// Reads served by the decrypt fallback so far
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// Value to store for `value`; null stays null
    pub fn write(&self, value: Option<&str>) -> Result<Option<String>> {
        let Some(value) = value else {
            return Ok(None);
        };
        let engine = self.engine()?;
        engine.encrypt_field(value).map(Some)
    }

    /// Value to hand back for `stored`
    pub fn read(&self, stored: Option<&str>) -> Result<Option<String>> {
        let Some(stored) = stored else {
            return Ok(None);
        };
        if self.descriptor.null_marker.as_deref() == Some(stored) {
            return Ok(None);
        }
        if self.descriptor.encrypt_only {
            return Ok(Some(stored.to_owned()));
        }

        let engine = self.engine()?;
        match engine.decrypt_field(stored) {
            Ok(plaintext) => Ok(Some(plaintext)),
            Err(e @ CoreError::EngineNotInitialized(_)) => Err(e),
            Err(e) => {
                self.record_fallback(&e);
                Ok(Some(stored.to_owned()))
            }
        }
    }

    fn engine(&self) -> Result<&Arc<EnvelopeKeyManager>> {
        self.engine.get_or_try_init(|| {
            self.registry
                .resolve(&self.descriptor.crypto_engine)
                .ok_or_else(|| {
                    error!(
                        property = %self.descriptor.path(),
                        engine = %self.descriptor.crypto_engine,
                        "property not properly configured: crypto engine not found"
                    );
                    CoreError::Configuration(format!(
                        "crypto engine {:?} not configured for {}",
                        self.descriptor.crypto_engine,
                        self.descriptor.path()
                    ))
                })
        })
    }

    fn record_fallback(&self, err: &CoreError) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
        warn!(
            property = %self.descriptor.path(),
            error = %err,
            "decrypt failed; returning stored value unchanged"
        );
        if let Some(hook) = &self.fallback_hook {
            hook(&DecryptFallback {
                item_descriptor: self.descriptor.item_descriptor.clone(),
                property: self.descriptor.property.clone(),
                error: err.to_string(),
            });
        }
    }
}

impl fmt::Debug for FieldCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldCodec")
            .field("descriptor", &self.descriptor)
            .field("resolved", &self.engine.get().is_some())
            .field("fallbacks", &self.fallback_count())
            .finish()
    }
}
