// src/config/mod.rs
//! Configuration system for encrypted-field-vault
//!
//! TOML file with environment overrides for secrets, loaded lazily once per
//! process by [`load`]. Tests and embedders build a [`Config`] directly with
//! [`Config::from_toml_str`].

pub use app::{
    default_config_path, load, Config, DecryptorKind, DecryptorSection, EngineSection,
    ExpirationSection, NotificationSection, PathsSection, RekeySection, SmtpSettings,
};

mod app;
mod defaults;
