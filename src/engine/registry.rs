// src/engine/registry.rs
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::EnvelopeKeyManager;

static GLOBAL: Lazy<Arc<EngineRegistry>> = Lazy::new(|| Arc::new(EngineRegistry::new()));

/// Named envelope key managers
#[derive(Default)]
pub struct EngineRegistry {
    engines: RwLock<HashMap<String, Arc<EnvelopeKeyManager>>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry
    pub fn global() -> Arc<EngineRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Register `engine` under `name`, returning any engine it replaced
    pub fn register(
        &self,
        name: impl Into<String>,
        engine: Arc<EnvelopeKeyManager>,
    ) -> Option<Arc<EnvelopeKeyManager>> {
        self.engines.write().insert(name.into(), engine)
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<EnvelopeKeyManager>> {
        self.engines.write().remove(name)
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<EnvelopeKeyManager>> {
        self.engines.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.engines.read().keys().cloned().collect();
        names.sort();
        names
    }
}
