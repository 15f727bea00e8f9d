// src/db/mod.rs
pub mod conn;

pub use conn::{apply_cipher_key, open_database, quote_ident};
