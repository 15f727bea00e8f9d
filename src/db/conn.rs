// src/db/conn.rs
//! Shared SQLite / SQLCipher connection setup

use std::{fs, path::Path};

use rusqlite::{Connection, Result};

use crate::consts::DB_KDF_ITERATIONS;

/// Open (creating parent directories) and unlock a database file.
///
/// With `db_key` the file is a SQLCipher database; without it, plain SQLite.
pub fn open_database(path: &Path, db_key: Option<&str>) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let conn = Connection::open(path)?;
    if let Some(key) = db_key {
        apply_cipher_key(&conn, key)?;
    }
    Ok(conn)
}

pub fn apply_cipher_key(conn: &Connection, key: &str) -> Result<()> {
    let key = key.replace('\'', "''");
    conn.execute_batch(&format!("PRAGMA key = '{key}';"))?;
    conn.execute_batch(&format!(
        r#"
        PRAGMA cipher_page_size = 4096;
        PRAGMA kdf_iter = {DB_KDF_ITERATIONS};
        PRAGMA cipher_hmac_algorithm = HMAC_SHA512;
        PRAGMA cipher_kdf_algorithm = PBKDF2_HMAC_SHA512;
        PRAGMA cipher_plaintext_header_size = 0;
        "#
    ))
}

/// Double-quote an SQL identifier
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
