// src/config/app.rs
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::defaults;
use crate::codec::FieldDescriptor;
use crate::engine::{EngineSettings, EnvelopeKeyManager};
use crate::error::{CoreError, Result};
use crate::expiration::ExpirationPolicy;
use crate::rekey::{CipherDecryptor, Decryptor, IdentityDecryptor, RekeySettings};

pub const CONFIG_ENV: &str = "EFV_CONFIG";
pub const KEY_PASSPHRASE_ENV: &str = "EFV_KEY_PASSPHRASE";
pub const NEW_KEY_PASSPHRASE_ENV: &str = "EFV_NEW_KEY_PASSPHRASE";
pub const KEY_DB_KEY_ENV: &str = "EFV_KEY_DB_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub engine: EngineSection,
    #[serde(default)]
    pub expiration: ExpirationSection,
    #[serde(default)]
    pub rekey: RekeySection,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub notification: NotificationSection,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    pub identifier: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub key_passphrase: String,
    #[serde(default = "defaults::passphrase_kdf_iterations")]
    pub passphrase_kdf_iterations: u32,
    #[serde(default = "defaults::field_kdf_iterations")]
    pub field_kdf_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpirationSection {
    #[serde(default)]
    pub check_expiration: bool,
    #[serde(default = "defaults::key_expiration_days")]
    pub key_expiration_days: u32,
    #[serde(default = "defaults::key_expiration_notification_days")]
    pub key_expiration_notification_days: u32,
    #[serde(default)]
    pub notification_recipient: String,
    #[serde(default = "defaults::check_interval_secs")]
    pub check_interval_secs: u64,
}

impl Default for ExpirationSection {
    fn default() -> Self {
        Self {
            check_expiration: false,
            key_expiration_days: defaults::key_expiration_days(),
            key_expiration_notification_days: defaults::key_expiration_notification_days(),
            notification_recipient: String::new(),
            check_interval_secs: defaults::check_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RekeySection {
    #[serde(default)]
    pub table_columns: Vec<String>,
    #[serde(default)]
    pub new_key_passphrase: String,
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,
    #[serde(default = "defaults::max_skipped_rows")]
    pub max_skipped_rows: usize,
    #[serde(default = "defaults::yes")]
    pub commit_on_failure: bool,
    #[serde(default)]
    pub decryptor: DecryptorSection,
}

impl Default for RekeySection {
    fn default() -> Self {
        Self {
            table_columns: Vec::new(),
            new_key_passphrase: String::new(),
            batch_size: defaults::batch_size(),
            max_skipped_rows: defaults::max_skipped_rows(),
            commit_on_failure: true,
            decryptor: DecryptorSection::default(),
        }
    }
}

/// How rekey reads the values currently stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecryptorKind {
    /// Values are plaintext
    Identity,
    /// Values are encrypted under the configured engine's current key
    #[default]
    CurrentEngine,
    /// Values are encrypted under `legacy_password`
    Legacy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecryptorSection {
    #[serde(default)]
    pub kind: DecryptorKind,
    #[serde(default)]
    pub legacy_password: Option<String>,
}

impl DecryptorSection {
    /// Build the decryptor; `engine` serves the current-engine kind
    pub fn build(&self, engine: &Arc<EnvelopeKeyManager>) -> Result<Arc<dyn Decryptor>> {
        let decryptor: Arc<dyn Decryptor> = match self.kind {
            DecryptorKind::Identity => Arc::new(IdentityDecryptor),
            DecryptorKind::CurrentEngine => {
                if !engine.is_initialized() {
                    return Err(CoreError::EngineNotInitialized(engine.identifier().to_owned()));
                }
                Arc::clone(engine) as Arc<dyn Decryptor>
            }
            DecryptorKind::Legacy => {
                let password = self
                    .legacy_password
                    .as_deref()
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| {
                        CoreError::Configuration(
                            "legacy decryptor requires rekey.decryptor.legacy_password".into(),
                        )
                    })?;
                Arc::new(CipherDecryptor::new(password))
            }
        };
        Ok(decryptor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsSection {
    #[serde(default = "defaults::key_db")]
    pub key_db: PathBuf,
    #[serde(default = "defaults::data_db")]
    pub data_db: PathBuf,
    /// SQLCipher key for the key-record database; plain SQLite when absent
    #[serde(default)]
    pub key_db_key: Option<String>,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            key_db: defaults::key_db(),
            data_db: defaults::data_db(),
            key_db_key: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationSection {
    #[serde(default)]
    pub smtp: Option<SmtpSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(default = "defaults::smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub from_address: String,
    #[serde(default = "defaults::yes")]
    pub use_tls: bool,
}

impl Config {
    /// Parse TOML without consulting the environment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CoreError::Configuration(format!("invalid TOML: {e}")))
    }

    /// Read a file and apply environment overrides
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Secrets from `EFV_KEY_PASSPHRASE`, `EFV_NEW_KEY_PASSPHRASE`, `EFV_KEY_DB_KEY`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var(KEY_PASSPHRASE_ENV) {
            self.engine.key_passphrase = v;
        }
        if let Ok(v) = env::var(NEW_KEY_PASSPHRASE_ENV) {
            self.rekey.new_key_passphrase = v;
        }
        if let Ok(v) = env::var(KEY_DB_KEY_ENV) {
            self.paths.key_db_key = Some(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.identifier.trim().is_empty() {
            return Err(CoreError::Configuration("engine.identifier is required".into()));
        }
        if self.engine.key_passphrase.is_empty() {
            return Err(CoreError::Configuration("engine.key_passphrase is required".into()));
        }
        self.expiration_policy().validate()?;
        if self.expiration.check_interval_secs == 0 {
            return Err(CoreError::Configuration(
                "expiration.check_interval_secs must be at least 1".into(),
            ));
        }
        if self.rekey.batch_size == 0 {
            return Err(CoreError::Configuration("rekey.batch_size must be at least 1".into()));
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings::new(&self.engine.identifier, &self.engine.key_passphrase)
            .description(&self.engine.description)
            .passphrase_kdf_iterations(self.engine.passphrase_kdf_iterations)
            .field_kdf_iterations(self.engine.field_kdf_iterations)
    }

    pub fn expiration_policy(&self) -> ExpirationPolicy {
        ExpirationPolicy {
            enabled: self.expiration.check_expiration,
            key_expiration_days: self.expiration.key_expiration_days,
            key_expiration_notification_days: self.expiration.key_expiration_notification_days,
            recipient: self.expiration.notification_recipient.clone(),
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.expiration.check_interval_secs)
    }

    /// Rekey settings; the new key passphrase defaults to the current one
    pub fn rekey_settings(&self) -> RekeySettings {
        let passphrase = if self.rekey.new_key_passphrase.is_empty() {
            &self.engine.key_passphrase
        } else {
            &self.rekey.new_key_passphrase
        };
        RekeySettings::new(&self.engine.identifier, passphrase)
            .table_columns(self.rekey.table_columns.as_slice())
            .passphrase_kdf_iterations(self.engine.passphrase_kdf_iterations)
            .field_kdf_iterations(self.engine.field_kdf_iterations)
            .batch_size(self.rekey.batch_size)
            .max_skipped_rows(self.rekey.max_skipped_rows)
            .commit_on_failure(self.rekey.commit_on_failure)
    }
}

/// `$EFV_CONFIG`, else `<config dir>/encrypted-field-vault/config.toml`
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(defaults::APP_DIR)
        .join("config.toml")
}

static CONFIG: OnceCell<Config> = OnceCell::new();

/// Process-wide configuration, loaded and validated on first use
pub fn load() -> Result<&'static Config> {
    CONFIG.get_or_try_init(|| {
        let path = default_config_path();
        if !path.exists() {
            warn!(path = %path.display(), "configuration file not found");
        }
        let config = Config::from_path(&path)?;
        config.validate()?;
        Ok(config)
    })
}
