// src/store/mod.rs
//! Tabular data store seen by the rekey engine
//!
//! The engine needs exactly one exclusive connection with auto-commit off, a
//! cursor over a single column of a single table, in-place update of the row
//! under the cursor, and commit / rollback.

pub mod sqlite;

pub use sqlite::SqliteDataStore;

use crate::error::Result;
use crate::rekey::ColumnTarget;

/// One row yielded by a [`ColumnCursor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorRow {
    pub row_id: i64,
    pub value: Option<String>,
}

pub trait DataStore: Send + Sync {
    /// Acquire an exclusive connection
    fn connect(&self) -> Result<Box<dyn DataConnection + '_>>;
}

pub trait DataConnection {
    /// Turn auto-commit off
    fn begin(&mut self) -> Result<()>;

    /// Cursor over `SELECT column FROM table`, fetching `batch_size` rows at a time
    fn open_cursor<'c>(
        &'c mut self,
        target: &ColumnTarget,
        batch_size: usize,
    ) -> Result<Box<dyn ColumnCursor + 'c>>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;
}

pub trait ColumnCursor {
    /// Advance to the next row; `None` once the table is exhausted
    fn next_row(&mut self) -> Result<Option<CursorRow>>;

    /// Overwrite the column of the row last returned by `next_row`
    fn update_current(&mut self, value: &str) -> Result<()>;
}
