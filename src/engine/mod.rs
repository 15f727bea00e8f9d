// src/engine/mod.rs
//! Envelope key management
//!
//! An [`EnvelopeKeyManager`] owns the live data key for one identifier.
//! Field codecs find their manager by name through an [`EngineRegistry`].

mod manager;
mod registry;

pub use manager::{EngineSettings, EnvelopeKeyManager};
pub use registry::EngineRegistry;
