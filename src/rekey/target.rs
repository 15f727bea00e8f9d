// src/rekey/target.rs
//! `table.column` rekey targets

use std::fmt;

use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ColumnTarget {
    pub table: String,
    pub column: String,
}

impl ColumnTarget {
    /// Parse `"table.column"`; anything else yields `None`
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let (table, column) = raw.split_once('.')?;
        if column.contains('.') || !is_identifier(table) || !is_identifier(column) {
            return None;
        }
        Some(Self {
            table: table.to_owned(),
            column: column.to_owned(),
        })
    }
}

impl fmt::Display for ColumnTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Parse every entry, logging and dropping the invalid ones
pub fn parse_targets<S: AsRef<str>>(entries: &[S]) -> Vec<ColumnTarget> {
    entries
        .iter()
        .filter_map(|raw| {
            let raw = raw.as_ref();
            let target = ColumnTarget::parse(raw);
            if target.is_none() {
                warn!(raw = %raw, "skipping invalid table.column target");
            }
            target
        })
        .collect()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
