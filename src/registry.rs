//! Provider registry: maps an engine tag to a factory that builds a fresh
//! [`DatabaseProvider`] instance.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::RegistryError;
use crate::provider::DatabaseProvider;

/// Builds a new, uninitialised provider instance for one engine tag.
pub type ProviderFactory = Arc<dyn Fn() -> Arc<dyn DatabaseProvider> + Send + Sync>;

/// Registry of engine tags to provider factories.
///
/// Holding factories rather than shared instances lets each `create_session`
/// job receive a provider already bound to the job's connection target,
/// while still letting the orchestrator cache one instance per target.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: DashMap<&'static str, ProviderFactory>,
}

impl ProviderRegistry {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }

    /// Registers `factory` under `engine`, replacing any existing factory
    /// for that tag.
    pub fn register(&self, engine: &'static str, factory: ProviderFactory) {
        self.factories.insert(engine, factory);
    }

    /// Builds a fresh provider instance for `engine`.
    ///
    /// # Errors
    /// Returns [`RegistryError::ProviderNotFound`] if no factory is
    /// registered for `engine`.
    pub fn create(&self, engine: &str) -> Result<Arc<dyn DatabaseProvider>, RegistryError> {
        self.factories
            .get(engine)
            .map(|factory| factory())
            .ok_or_else(|| RegistryError::ProviderNotFound(engine.to_owned()))
    }

    /// Returns whether `engine` has a registered factory.
    #[must_use]
    pub fn is_supported(&self, engine: &str) -> bool {
        self.factories.contains_key(engine)
    }

    /// Lists every registered engine tag.
    #[must_use]
    pub fn supported_types(&self) -> Vec<&'static str> {
        self.factories.iter().map(|entry| *entry.key()).collect()
    }

    /// Removes every registered factory. Intended for test teardown.
    pub fn clear(&self) {
        self.factories.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::provider::postgres::PostgresProvider;

    #[test]
    fn unregistered_engine_is_not_supported() {
        let registry = ProviderRegistry::new();
        assert!(!registry.is_supported("postgres"));
    }

    #[test]
    fn registered_engine_builds_a_fresh_provider_each_call() {
        let registry = ProviderRegistry::new();
        registry.register(
            "postgres",
            Arc::new(|| Arc::new(PostgresProvider::default()) as Arc<dyn DatabaseProvider>),
        );
        assert!(registry.is_supported("postgres"));
        assert!(registry.create("postgres").is_ok());
        assert_eq!(registry.supported_types(), vec!["postgres"]);
    }

    #[test]
    fn unknown_engine_raises_provider_not_found() {
        let registry = ProviderRegistry::new();
        let err = match registry.create("mysql") {
            Err(err) => err,
            Ok(_) => panic!("mysql is not registered"),
        };
        assert!(matches!(err, RegistryError::ProviderNotFound(engine) if engine == "mysql"));
    }

    #[test]
    fn clear_removes_every_factory() {
        let registry = ProviderRegistry::new();
        registry.register(
            "postgres",
            Arc::new(|| Arc::new(PostgresProvider::default()) as Arc<dyn DatabaseProvider>),
        );
        registry.clear();
        assert!(!registry.is_supported("postgres"));
    }
}
