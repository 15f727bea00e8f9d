// tests/support.rs
//! Test fixtures: engines with cheap KDF settings and seeded SQLite tables

use std::sync::Arc;

use encrypted_field_vault::store::SqliteDataStore;
use encrypted_field_vault::{
    EngineSettings, EnvelopeKeyManager, InMemoryKeyRecordStore, KeyRecordStore,
};
use rusqlite::params;

#[allow(dead_code)]
pub const TEST_PASSPHRASE: &str = "test-key-passphrase-2025";

/// Passphrase KDF iterations for tests; production uses 300k
#[allow(dead_code)]
pub const TEST_KDF_ITERATIONS: u32 = 5;

#[allow(dead_code)]
pub fn fast_settings(identifier: &str) -> EngineSettings {
    fast_settings_with(identifier, TEST_PASSPHRASE)
}

#[allow(dead_code)]
pub fn fast_settings_with(identifier: &str, passphrase: &str) -> EngineSettings {
    EngineSettings::new(identifier, passphrase)
        .description(format!("{identifier} test engine"))
        .passphrase_kdf_iterations(TEST_KDF_ITERATIONS)
}

#[allow(dead_code)]
pub fn memory_store() -> Arc<InMemoryKeyRecordStore> {
    Arc::new(InMemoryKeyRecordStore::new())
}

/// Start (bootstrapping if needed) an engine that must come up
#[allow(dead_code)]
pub fn started_engine(
    identifier: &str,
    store: Arc<dyn KeyRecordStore>,
) -> Arc<EnvelopeKeyManager> {
    let engine = EnvelopeKeyManager::start_strict(fast_settings(identifier), store)
        .expect("engine start");
    Arc::new(engine)
}

/// `CREATE TABLE <table> (id INTEGER PRIMARY KEY, cardNumber TEXT)` with `values`
#[allow(dead_code)]
pub fn seed_card_table(store: &SqliteDataStore, table: &str, values: &[Option<String>]) {
    let conn = store.lock();
    conn.execute_batch(&format!(
        "CREATE TABLE {table} (id INTEGER PRIMARY KEY, cardNumber TEXT)"
    ))
    .expect("create table");
    let mut stmt = conn
        .prepare(&format!("INSERT INTO {table} (cardNumber) VALUES (?1)"))
        .expect("prepare insert");
    for value in values {
        stmt.execute(params![value]).expect("insert row");
    }
}

/// Column values in rowid order
#[allow(dead_code)]
pub fn column_values(store: &SqliteDataStore, table: &str, column: &str) -> Vec<Option<String>> {
    let conn = store.lock();
    let mut stmt = conn
        .prepare(&format!("SELECT {column} FROM {table} ORDER BY rowid"))
        .expect("prepare select");
    let rows = stmt
        .query_map([], |row| row.get::<_, Option<String>>(0))
        .expect("query");
    let values = rows.map(|r| r.expect("row")).collect();
    values
}

#[allow(dead_code)]
pub fn encrypt_all(engine: &EnvelopeKeyManager, plaintexts: &[&str]) -> Vec<Option<String>> {
    plaintexts
        .iter()
        .map(|p| Some(engine.encrypt_field(p).expect("encrypt")))
        .collect()
}
