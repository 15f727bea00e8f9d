// src/rekey/mod.rs
//! Rekey: move every configured column onto a fresh data key
//!
//! Rows are decrypted with a caller-supplied [`Decryptor`], re-encrypted
//! under a newly generated data key, and updated in place. The new data key
//! is then sealed under the target key passphrase and written to the key
//! record before the data-store transaction commits.

mod decryptor;
mod engine;
mod lease;
mod target;

pub use decryptor::{CipherDecryptor, Decryptor, FnDecryptor, IdentityDecryptor};
pub use engine::{RekeyEngine, RekeyReport, RekeySettings, RekeyStage, RekeyState, TargetReport};
pub use lease::RekeyLease;
pub use target::{parse_targets, ColumnTarget};
