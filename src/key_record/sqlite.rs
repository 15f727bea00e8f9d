// src/key_record/sqlite.rs
//! SQLite-backed key records
//!
//! `crypto_engine` always holds the current record. Every update first
//! copies the outgoing sealed key into `crypto_engine_history` inside the
//! same transaction.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use super::{KeyRecord, KeyRecordStore};
use crate::db::open_database;
use crate::error::KeyStoreError;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS crypto_engine (
        identifier   TEXT PRIMARY KEY,
        description  TEXT NOT NULL DEFAULT '',
        enc_data_key TEXT NOT NULL,
        key_date     TEXT
    );

    CREATE TABLE IF NOT EXISTS crypto_engine_history (
        identifier    TEXT NOT NULL,
        version       INTEGER NOT NULL,
        enc_data_key  TEXT NOT NULL,
        key_date      TEXT,
        superseded_at TEXT NOT NULL,
        PRIMARY KEY (identifier, version)
    );

    CREATE INDEX IF NOT EXISTS idx_crypto_engine_history_identifier
        ON crypto_engine_history(identifier);
"#;

/// Open the key-record database and make sure its schema exists
pub fn open_key_db(path: &Path, db_key: Option<&str>) -> rusqlite::Result<Connection> {
    let conn = open_database(path, db_key)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

/// A retired sealed data key
#[derive(Debug, Clone)]
pub struct KeyHistoryEntry {
    pub version: i64,
    pub encrypted_data_key: String,
    pub key_created_at: Option<DateTime<Utc>>,
    pub superseded_at: Option<DateTime<Utc>>,
}

pub struct SqliteKeyRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyRecordStore {
    pub fn open(path: &Path, db_key: Option<&str>) -> Result<Self, KeyStoreError> {
        Ok(Self {
            conn: Mutex::new(open_key_db(path, db_key)?),
        })
    }

    pub fn open_in_memory() -> Result<Self, KeyStoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, KeyStoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Retired sealed keys for `identifier`, oldest first
    pub fn history(&self, identifier: &str) -> Result<Vec<KeyHistoryEntry>, KeyStoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT version, enc_data_key, key_date, superseded_at
             FROM crypto_engine_history WHERE identifier = ?1 ORDER BY version",
        )?;
        let rows = stmt.query_map([identifier], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (version, encrypted_data_key, key_date, superseded_at) = row?;
            entries.push(KeyHistoryEntry {
                version,
                encrypted_data_key,
                key_created_at: parse_timestamp(key_date.as_deref())?,
                superseded_at: parse_timestamp(Some(&superseded_at))?,
            });
        }
        Ok(entries)
    }
}

impl KeyRecordStore for SqliteKeyRecordStore {
    fn get(&self, identifier: &str) -> Result<Option<KeyRecord>, KeyStoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT identifier, description, enc_data_key, key_date
                 FROM crypto_engine WHERE identifier = ?1",
                [identifier],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((identifier, description, encrypted_data_key, key_date)) = row else {
            return Ok(None);
        };
        Ok(Some(KeyRecord {
            identifier,
            description,
            encrypted_data_key,
            key_created_at: parse_timestamp(key_date.as_deref())?,
        }))
    }

    fn create(&self, record: KeyRecord) -> Result<(), KeyStoreError> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO crypto_engine (identifier, description, enc_data_key, key_date)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.identifier,
                record.description,
                record.encrypted_data_key,
                record.key_created_at.map(|d| d.to_rfc3339()),
            ],
        )?;
        if inserted == 0 {
            return Err(KeyStoreError::Duplicate(record.identifier));
        }
        Ok(())
    }

    fn update(&self, record: KeyRecord) -> Result<(), KeyStoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let previous: Option<(String, Option<String>)> = tx
            .query_row(
                "SELECT enc_data_key, key_date FROM crypto_engine WHERE identifier = ?1",
                [&record.identifier],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((old_key, old_date)) = previous else {
            return Err(KeyStoreError::NotFound(record.identifier));
        };

        if old_key != record.encrypted_data_key {
            tx.execute(
                "INSERT INTO crypto_engine_history
                     (identifier, version, enc_data_key, key_date, superseded_at)
                 SELECT ?1, COALESCE(MAX(version), 0) + 1, ?2, ?3, ?4
                 FROM crypto_engine_history WHERE identifier = ?1",
                params![record.identifier, old_key, old_date, Utc::now().to_rfc3339()],
            )?;
        }

        tx.execute(
            "UPDATE crypto_engine SET description = ?2, enc_data_key = ?3, key_date = ?4
             WHERE identifier = ?1",
            params![
                record.identifier,
                record.description,
                record.encrypted_data_key,
                record.key_created_at.map(|d| d.to_rfc3339()),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn parse_timestamp(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, KeyStoreError> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| KeyStoreError::Backend(format!("invalid timestamp {s:?}: {e}")))
    })
    .transpose()
}
