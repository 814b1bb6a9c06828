//! Injected service bundle shared by graphs, nodes, and executable graphs.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::registry::HandleRegistry;
use crate::substrate::Substrate;

/// Everything the engine needs from its environment: the substrate
/// collaborators, the handle registry, and configuration.
///
/// Cloning is cheap; every graph (including clones and embedded child graphs)
/// carries a copy so teardown and validity checks reach the same registry.
#[derive(Clone, Debug)]
pub struct EngineContext {
    pub(crate) registry: Arc<HandleRegistry>,
    pub(crate) substrate: Substrate,
    pub(crate) config: EngineConfig,
}

impl EngineContext {
    /// Build a context with a fresh registry and configuration read from the
    /// environment.
    #[must_use]
    pub fn new(substrate: Substrate) -> Self {
        Self {
            registry: Arc::new(HandleRegistry::new()),
            substrate,
            config: EngineConfig::from_env(),
        }
    }

    /// Replace the configuration (tests and embedders with their own config
    /// source).
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing registry, e.g. one runtime-wide instance.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<HandleRegistry>) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn substrate(&self) -> &Substrate {
        &self.substrate
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
