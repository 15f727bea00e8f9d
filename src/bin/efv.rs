// src/bin/efv.rs
//! efv: operator commands for encrypted-field-vault
//!
//! ```text
//! efv init <config>              create or load the data key
//! efv check-expiration <config>  run one key expiration check
//! efv rekey <config>             re-encrypt configured columns under a new data key
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use encrypted_field_vault::config::Config;
use encrypted_field_vault::expiration::{ExpirationCheck, ExpirationMonitor, NotificationSink};
use encrypted_field_vault::key_record::SqliteKeyRecordStore;
use encrypted_field_vault::{
    EnvelopeKeyManager, KeyRecordStore, LogNotificationSink, RekeyEngine, SqliteDataStore,
};
use rpassword::prompt_password;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: efv <init|check-expiration|rekey> <config.toml>";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(command), Some(path)) = (args.next(), args.next()) else {
        bail!(USAGE);
    };
    let mut config = load_config(Path::new(&path))?;

    match command.as_str() {
        "init" => init(&config),
        "check-expiration" => check_expiration(&config),
        "rekey" => rekey(&mut config),
        other => bail!("unknown command {other:?}\n{USAGE}"),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::from_path(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    if config.engine.key_passphrase.is_empty() {
        config.engine.key_passphrase =
            prompt_password(format!("Key passphrase for {}: ", config.engine.identifier))?;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn key_store(config: &Config) -> Result<Arc<SqliteKeyRecordStore>> {
    let paths = &config.paths;
    let store = SqliteKeyRecordStore::open(&paths.key_db, paths.key_db_key.as_deref())
        .with_context(|| format!("failed to open {}", config.paths.key_db.display()))?;
    Ok(Arc::new(store))
}

fn start_engine(
    config: &Config,
    store: Arc<dyn KeyRecordStore>,
) -> Result<Arc<EnvelopeKeyManager>> {
    let engine = EnvelopeKeyManager::start_strict(config.engine_settings(), store)
        .context("crypto engine failed to start")?;
    Ok(Arc::new(engine))
}

fn init(config: &Config) -> Result<()> {
    let engine = start_engine(config, key_store(config)?)?;
    info!(
        identifier = %engine.identifier(),
        fingerprint = %engine.key_fingerprint().unwrap_or_default(),
        "crypto engine ready"
    );
    Ok(())
}

#[cfg(feature = "smtp")]
fn notification_sink(config: &Config) -> Result<Arc<dyn NotificationSink>> {
    use encrypted_field_vault::expiration::SmtpNotificationSink;

    let sink: Arc<dyn NotificationSink> = match &config.notification.smtp {
        Some(smtp) => Arc::new(SmtpNotificationSink::new(smtp)?),
        None => Arc::new(LogNotificationSink),
    };
    Ok(sink)
}

#[cfg(not(feature = "smtp"))]
fn notification_sink(_config: &Config) -> Result<Arc<dyn NotificationSink>> {
    Ok(Arc::new(LogNotificationSink))
}

fn check_expiration(config: &Config) -> Result<()> {
    let store: Arc<dyn KeyRecordStore> = key_store(config)?;
    let monitor = ExpirationMonitor::new(
        &config.engine.identifier,
        config.expiration_policy(),
        store,
        notification_sink(config)?,
    )?;
    match monitor.run_check() {
        ExpirationCheck::Failed(reason) => bail!("expiration check failed: {reason}"),
        outcome => info!(?outcome, "expiration check finished"),
    }
    Ok(())
}

fn rekey(config: &mut Config) -> Result<()> {
    if config.rekey.new_key_passphrase.is_empty() {
        config.rekey.new_key_passphrase =
            prompt_password("New key passphrase (empty keeps the current one): ")?;
    }
    if config.rekey.table_columns.is_empty() {
        bail!("rekey.table_columns is empty; nothing to rekey");
    }

    let store = key_store(config)?;
    let engine = start_engine(config, store.clone())?;
    let decryptor = config.rekey.decryptor.build(&engine)?;
    let data_path = &config.paths.data_db;
    let data_store = Arc::new(
        SqliteDataStore::open(data_path, None)
            .with_context(|| format!("failed to open {}", data_path.display()))?,
    );

    let mut rekey = RekeyEngine::new(config.rekey_settings(), store, data_store, decryptor)?
        .engine_to_update(engine)?;
    let report = rekey.run()?;
    println!("{}", report.to_json()?);
    Ok(())
}
