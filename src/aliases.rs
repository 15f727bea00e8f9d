// src/aliases.rs
//! Re-exports secure-gate's ergonomic secret types
//!
//! These are the canonical secret types used throughout encrypted-field-vault.

pub use secure_gate::dynamic_alias;

// Dynamic secrets
dynamic_alias!(DataKey, String); // live data key, hex text, never persisted in the clear
dynamic_alias!(KeyPassphrase, String); // protects the data key at rest
dynamic_alias!(LegacyPassword, String); // password of a foreign/legacy field cipher
