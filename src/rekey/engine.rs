// src/rekey/engine.rs
//! The rekey batch run
//!
//! `Idle → Initializing → Migrating → Finalizing → Committed | FailedRolledBack`
//!
//! # Partial failure
//!
//! With `commit_on_failure` (the default) a failed run still commits the rows
//! it already rewrote, then stops. If the failure happened before the key
//! record was updated, those rows are encrypted under a key that is recorded
//! nowhere and cannot be read back. Set `commit_on_failure = false` to roll
//! the data-store transaction back instead: rows and key record then land
//! together or not at all (up to the final commit, which cannot be made
//! atomic across two stores; a failed commit restores the previous record).
//!
//! Values that are not ciphertext at all are skipped, up to
//! `max_skipped_rows`. A well-formed container that fails to open aborts the
//! run before the key record is touched, as does a target where nothing
//! decrypted.
//!
//! A failed run is never resumed. Run it again from scratch; every attempt
//! generates a new data key.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::decryptor::Decryptor;
use super::lease::RekeyLease;
use super::target::{parse_targets, ColumnTarget};
use crate::aliases::{DataKey, KeyPassphrase};
use crate::consts::{
    DEFAULT_MAX_SKIPPED_ROWS, DEFAULT_REKEY_BATCH_SIZE, FIELD_KDF_ITERATIONS,
    PASSPHRASE_KDF_ITERATIONS,
};
use crate::crypto::{
    encrypt_with_iterations, generate_data_key, is_container, key_fingerprint, register_provider,
    CipherService,
};
use crate::engine::EnvelopeKeyManager;
use crate::error::{CoreError, KeyStoreError, Result};
use crate::key_record::{KeyRecord, KeyRecordStore};
use crate::store::{DataConnection, DataStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RekeyState {
    Idle,
    Initializing,
    Migrating,
    Finalizing,
    Committed,
    FailedRolledBack,
}

/// Step at which a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RekeyStage {
    Initialize,
    Connect,
    Migrate,
    Finalize,
    Commit,
}

impl fmt::Display for RekeyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RekeyStage::Initialize => "initialize",
            RekeyStage::Connect => "connect",
            RekeyStage::Migrate => "migrate",
            RekeyStage::Finalize => "finalize",
            RekeyStage::Commit => "commit",
        })
    }
}

pub struct RekeySettings {
    pub identifier: String,
    pub targets: Vec<ColumnTarget>,
    pub new_key_passphrase: KeyPassphrase,
    pub passphrase_kdf_iterations: u32,
    pub field_kdf_iterations: u32,
    pub batch_size: usize,
    pub max_skipped_rows: usize,
    pub commit_on_failure: bool,
}

impl RekeySettings {
    pub fn new(identifier: impl Into<String>, new_key_passphrase: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            targets: Vec::new(),
            new_key_passphrase: KeyPassphrase::new(new_key_passphrase.into()),
            passphrase_kdf_iterations: PASSPHRASE_KDF_ITERATIONS,
            field_kdf_iterations: FIELD_KDF_ITERATIONS,
            batch_size: DEFAULT_REKEY_BATCH_SIZE,
            max_skipped_rows: DEFAULT_MAX_SKIPPED_ROWS,
            commit_on_failure: true,
        }
    }

    /// Targets from `table.column` specs; invalid specs are dropped
    pub fn table_columns<S: AsRef<str>>(mut self, specs: &[S]) -> Self {
        self.targets = parse_targets(specs);
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

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn max_skipped_rows(mut self, max: usize) -> Self {
        self.max_skipped_rows = max;
        self
    }

    pub fn commit_on_failure(mut self, commit: bool) -> Self {
        self.commit_on_failure = commit;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.identifier.trim().is_empty() {
            return Err(CoreError::Configuration("rekey identifier is empty".into()));
        }
        if self.new_key_passphrase.expose_secret().is_empty() {
            return Err(CoreError::Configuration("new key passphrase is empty".into()));
        }
        if self.batch_size == 0 {
            return Err(CoreError::Configuration("batch size must be at least 1".into()));
        }
        if self.passphrase_kdf_iterations == 0 || self.field_kdf_iterations == 0 {
            return Err(CoreError::Configuration("KDF iterations must be at least 1".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for RekeySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RekeySettings")
            .field("identifier", &self.identifier)
            .field("targets", &self.targets)
            .field("new_key_passphrase", &"[REDACTED]")
            .field("batch_size", &self.batch_size)
            .field("max_skipped_rows", &self.max_skipped_rows)
            .field("commit_on_failure", &self.commit_on_failure)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    pub target: String,
    pub rows_seen: usize,
    pub rows_migrated: usize,
    pub rows_skipped_null: usize,
    pub rows_skipped_malformed: usize,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct RekeyReport {
    pub identifier: String,
    pub state: RekeyState,
    pub targets: Vec<TargetReport>,
    pub new_key_fingerprint: Option<String>,
    pub key_created_at: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RekeyReport {
    fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_owned(),
            state: RekeyState::Idle,
            targets: Vec::new(),
            new_key_fingerprint: None,
            key_created_at: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn rows_migrated(&self) -> usize {
        self.targets.iter().map(|t| t.rows_migrated).sum()
    }

    pub fn rows_skipped(&self) -> usize {
        self.targets
            .iter()
            .map(|t| t.rows_skipped_null + t.rows_skipped_malformed)
            .sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

struct Prepared {
    new_key: DataKey,
    cipher: CipherService,
    previous: KeyRecord,
}

pub struct RekeyEngine {
    settings: RekeySettings,
    key_store: Arc<dyn KeyRecordStore>,
    data_store: Arc<dyn DataStore>,
    decryptor: Arc<dyn Decryptor>,
    engine_to_update: Option<Arc<EnvelopeKeyManager>>,
    state: RekeyState,
}

impl RekeyEngine {
    pub fn new(
        settings: RekeySettings,
        key_store: Arc<dyn KeyRecordStore>,
        data_store: Arc<dyn DataStore>,
        decryptor: Arc<dyn Decryptor>,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            key_store,
            data_store,
            decryptor,
            engine_to_update: None,
            state: RekeyState::Idle,
        })
    }

    /// Hand the new key and passphrase to `engine` once the run has committed
    pub fn engine_to_update(mut self, engine: Arc<EnvelopeKeyManager>) -> Result<Self> {
        if engine.identifier() != self.settings.identifier {
            return Err(CoreError::Configuration(format!(
                "engine {} does not match rekey identifier {}",
                engine.identifier(),
                self.settings.identifier
            )));
        }
        self.engine_to_update = Some(engine);
        Ok(self)
    }

    pub fn state(&self) -> RekeyState {
        self.state
    }

    pub fn settings(&self) -> &RekeySettings {
        &self.settings
    }

    pub fn run(&mut self) -> Result<RekeyReport> {
        let _lease = RekeyLease::acquire(&self.settings.identifier)?;
        let identifier = self.settings.identifier.clone();
        let mut report = RekeyReport::new(&identifier);
        info!(
            identifier = %identifier,
            targets = self.settings.targets.len(),
            "rekey starting"
        );

        self.state = RekeyState::Initializing;
        let prepared = match self.initialize() {
            Ok(p) => p,
            Err(e) => return Err(self.abort(RekeyStage::Initialize, 0, e)),
        };
        let fingerprint = key_fingerprint(&prepared.new_key);
        debug!(identifier = %identifier, fingerprint = %fingerprint, "new data key generated");

        let data_store = Arc::clone(&self.data_store);
        let mut conn = match data_store.connect() {
            Ok(conn) => conn,
            Err(e) => return Err(self.abort(RekeyStage::Connect, 0, e)),
        };
        if let Err(e) = conn.begin() {
            return Err(self.abort(RekeyStage::Connect, 0, e));
        }

        self.state = RekeyState::Migrating;
        if let Err(e) = self.migrate(conn.as_mut(), &prepared.cipher, &mut report) {
            let committed = self.cleanup(conn.as_mut(), report.rows_migrated());
            return Err(self.abort(RekeyStage::Migrate, committed, e));
        }

        self.state = RekeyState::Finalizing;
        let record = match self.finalize(&prepared) {
            Ok(record) => record,
            Err(e) => {
                let committed = self.cleanup(conn.as_mut(), report.rows_migrated());
                return Err(self.abort(RekeyStage::Finalize, committed, e));
            }
        };

        if let Err(e) = conn.commit() {
            error!(
                identifier = %identifier,
                error = %e,
                "data commit failed after the key record was updated"
            );
            if !self.settings.commit_on_failure {
                self.restore_previous(&prepared.previous);
            }
            let _ = conn.rollback();
            return Err(self.abort(RekeyStage::Commit, 0, e));
        }
        drop(conn);

        self.state = RekeyState::Committed;
        if let Some(engine) = &self.engine_to_update {
            engine.install_rekeyed(
                &prepared.new_key,
                KeyPassphrase::new(self.settings.new_key_passphrase.expose_secret().to_owned()),
            );
        }

        report.state = RekeyState::Committed;
        report.new_key_fingerprint = Some(fingerprint);
        report.key_created_at = record.key_created_at;
        report.finished_at = Some(Utc::now());
        info!(
            identifier = %identifier,
            rows_migrated = report.rows_migrated(),
            rows_skipped = report.rows_skipped(),
            "rekey committed"
        );
        Ok(report)
    }

    fn initialize(&self) -> Result<Prepared> {
        register_provider()?;
        let previous = self
            .key_store
            .get(&self.settings.identifier)?
            .ok_or_else(|| KeyStoreError::NotFound(self.settings.identifier.clone()))?;

        let live = self
            .engine_to_update
            .as_ref()
            .and_then(|engine| engine.key_fingerprint());
        let mut new_key = generate_data_key();
        while live.as_deref() == Some(key_fingerprint(&new_key).as_str()) {
            warn!("new data key collides with the live key; regenerating");
            new_key = generate_data_key();
        }

        let cipher = CipherService::for_data_key(&new_key, self.settings.field_kdf_iterations);
        Ok(Prepared {
            new_key,
            cipher,
            previous,
        })
    }

    fn migrate(
        &self,
        conn: &mut dyn DataConnection,
        cipher: &CipherService,
        report: &mut RekeyReport,
    ) -> Result<()> {
        let mut skipped = 0usize;
        for target in &self.settings.targets {
            report.targets.push(TargetReport {
                target: target.to_string(),
                ..TargetReport::default()
            });
            let Some(counts) = report.targets.last_mut() else {
                continue;
            };

            let mut cursor = conn.open_cursor(target, self.settings.batch_size)?;
            while let Some(row) = cursor.next_row()? {
                counts.rows_seen += 1;
                let Some(stored) = row.value else {
                    counts.rows_skipped_null += 1;
                    continue;
                };

                let plaintext = match self.decryptor.decrypt(&stored) {
                    Ok(p) => p,
                    // A sound container that does not open means the decryptor
                    // holds the wrong key, not that this row is damaged.
                    Err(CoreError::Decryption(reason)) if is_container(&stored) => {
                        return Err(CoreError::Decryption(format!(
                            "row {} of {target} does not open under the decryptor's key: {reason}",
                            row.row_id
                        )));
                    }
                    Err(CoreError::Decryption(reason)) => {
                        counts.rows_skipped_malformed += 1;
                        skipped += 1;
                        warn!(
                            table = %target.table,
                            column = %target.column,
                            row_id = row.row_id,
                            reason = %reason,
                            "skipping row that does not decrypt"
                        );
                        if skipped > self.settings.max_skipped_rows {
                            return Err(CoreError::Decryption(format!(
                                "{skipped} rows could not be decrypted (limit {})",
                                self.settings.max_skipped_rows
                            )));
                        }
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                cursor.update_current(&cipher.encrypt(&plaintext)?)?;
                counts.rows_migrated += 1;
                debug!(
                    table = %target.table,
                    column = %target.column,
                    row_id = row.row_id,
                    "row re-encrypted"
                );
            }

            if counts.rows_migrated == 0 && counts.rows_skipped_malformed > 0 {
                return Err(CoreError::Decryption(format!(
                    "no value in {target} could be decrypted"
                )));
            }

            info!(
                table = %target.table,
                column = %target.column,
                migrated = counts.rows_migrated,
                skipped_null = counts.rows_skipped_null,
                skipped_malformed = counts.rows_skipped_malformed,
                "column rekeyed"
            );
        }
        Ok(())
    }

    fn finalize(&self, prepared: &Prepared) -> Result<KeyRecord> {
        let sealed = encrypt_with_iterations(
            prepared.new_key.expose_secret(),
            self.settings.new_key_passphrase.expose_secret(),
            self.settings.passphrase_kdf_iterations,
        )?;

        let now = Utc::now();
        let created_at = match prepared.previous.key_created_at {
            Some(prev) if now <= prev => prev + Duration::milliseconds(1),
            _ => now,
        };
        let record = prepared.previous.with_new_key(sealed, created_at);
        self.key_store.update(record.clone())?;
        info!(identifier = %record.identifier, "key record saved");
        Ok(record)
    }

    /// Best-effort end of a failed run; returns the rows that were committed
    fn cleanup(&self, conn: &mut dyn DataConnection, rows_migrated: usize) -> usize {
        if self.settings.commit_on_failure {
            match conn.commit() {
                Ok(()) => {
                    if rows_migrated > 0 {
                        warn!(
                            identifier = %self.settings.identifier,
                            rows = rows_migrated,
                            "committed rows re-encrypted under an unrecorded key"
                        );
                    }
                    rows_migrated
                }
                Err(e) => {
                    error!(error = %e, "unable to commit data connection");
                    0
                }
            }
        } else {
            if let Err(e) = conn.rollback() {
                error!(error = %e, "unable to roll back data connection");
            }
            0
        }
    }

    fn restore_previous(&self, previous: &KeyRecord) {
        match self.key_store.update(previous.clone()) {
            Ok(()) => warn!(identifier = %previous.identifier, "previous key record restored"),
            Err(e) => error!(
                identifier = %previous.identifier,
                error = %e,
                "unable to restore previous key record"
            ),
        }
    }

    fn abort(&mut self, stage: RekeyStage, rows_committed: usize, source: CoreError) -> CoreError {
        self.state = RekeyState::FailedRolledBack;
        error!(
            identifier = %self.settings.identifier,
            stage = %stage,
            rows_committed,
            error = %source,
            "rekey failed"
        );
        CoreError::RekeyFailed {
            stage,
            rows_committed,
            source: Box::new(source),
        }
    }
}

impl fmt::Debug for RekeyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RekeyEngine")
            .field("settings", &self.settings)
            .field("state", &self.state)
            .finish()
    }
}
