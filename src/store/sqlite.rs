// src/store/sqlite.rs
//! SQLite implementation of the tabular data store
//!
//! The cursor pages through the table by `rowid` (keyset pagination), so
//! updating a row never disturbs the rows still to come. Tables declared
//! `WITHOUT ROWID` are not supported.

use std::collections::VecDeque;
use std::path::Path;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::{params, Connection};
use tracing::{debug, warn};

use super::{ColumnCursor, CursorRow, DataConnection, DataStore};
use crate::db::{open_database, quote_ident};
use crate::error::{CoreError, Result};
use crate::rekey::ColumnTarget;

pub struct SqliteDataStore {
    conn: Mutex<Connection>,
}

impl SqliteDataStore {
    pub fn open(path: &Path, db_key: Option<&str>) -> Result<Self> {
        Ok(Self::from_connection(open_database(path, db_key)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Direct access to the underlying connection (schema setup, queries)
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

impl DataStore for SqliteDataStore {
    fn connect(&self) -> Result<Box<dyn DataConnection + '_>> {
        Ok(Box::new(SqliteConnection {
            conn: self.conn.lock(),
            in_transaction: false,
        }))
    }
}

struct SqliteConnection<'a> {
    conn: MutexGuard<'a, Connection>,
    in_transaction: bool,
}

impl DataConnection for SqliteConnection<'_> {
    fn begin(&mut self) -> Result<()> {
        if !self.in_transaction {
            self.conn.execute_batch("BEGIN IMMEDIATE")?;
            self.in_transaction = true;
        }
        Ok(())
    }

    fn open_cursor<'c>(
        &'c mut self,
        target: &ColumnTarget,
        batch_size: usize,
    ) -> Result<Box<dyn ColumnCursor + 'c>> {
        if batch_size == 0 {
            return Err(CoreError::Configuration("batch size must be at least 1".into()));
        }
        let table = quote_ident(&target.table);
        let column = quote_ident(&target.column);
        Ok(Box::new(SqliteCursor {
            conn: &*self.conn,
            select_sql: format!(
                "SELECT rowid, {column} FROM {table} WHERE rowid > ?1 ORDER BY rowid LIMIT ?2"
            ),
            update_sql: format!("UPDATE {table} SET {column} = ?1 WHERE rowid = ?2"),
            batch_size,
            page: VecDeque::new(),
            last_row_id: i64::MIN,
            current: None,
            exhausted: false,
        }))
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_transaction {
            self.conn.execute_batch("ROLLBACK")?;
            self.in_transaction = false;
        }
        Ok(())
    }
}

impl Drop for SqliteConnection<'_> {
    fn drop(&mut self) {
        if self.in_transaction {
            warn!("connection released with an open transaction; rolling back");
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %e, "rollback on release failed");
            }
        }
    }
}

struct SqliteCursor<'c> {
    conn: &'c Connection,
    select_sql: String,
    update_sql: String,
    batch_size: usize,
    page: VecDeque<CursorRow>,
    last_row_id: i64,
    current: Option<i64>,
    exhausted: bool,
}

impl SqliteCursor<'_> {
    fn fetch_page(&mut self) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(&self.select_sql)?;
        let rows = stmt.query_map(params![self.last_row_id, self.batch_size as i64], |row| {
            Ok(CursorRow {
                row_id: row.get(0)?,
                value: row.get(1)?,
            })
        })?;
        for row in rows {
            self.page.push_back(row?);
        }
        if self.page.len() < self.batch_size {
            self.exhausted = true;
        }
        if let Some(last) = self.page.back() {
            self.last_row_id = last.row_id;
        }
        debug!(rows = self.page.len(), "fetched cursor page");
        Ok(())
    }
}

impl ColumnCursor for SqliteCursor<'_> {
    fn next_row(&mut self) -> Result<Option<CursorRow>> {
        if self.page.is_empty() && !self.exhausted {
            self.fetch_page()?;
        }
        let row = self.page.pop_front();
        self.current = row.as_ref().map(|r| r.row_id);
        Ok(row)
    }

    fn update_current(&mut self, value: &str) -> Result<()> {
        let row_id = self
            .current
            .ok_or_else(|| CoreError::Configuration("cursor is not positioned on a row".into()))?;
        let mut stmt = self.conn.prepare_cached(&self.update_sql)?;
        stmt.execute(params![value, row_id])?;
        Ok(())
    }
}
