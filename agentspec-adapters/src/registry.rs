//! The adapter registry: a process-wide map from adapter name to
//! implementation. Registration happens once at startup; lookups are
//! frequent and should stay cheap, hence the reader-writer lock.

use crate::adapter::Adapter;
use agentspec_core::AdapterError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct AdapterRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn Adapter>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, adapter: Arc<dyn Adapter>) {
        let name = adapter.name().to_string();
        self.adapters.write().unwrap().insert(name, adapter);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Adapter>, AdapterError> {
        self.adapters
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| AdapterError::NotRegistered(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentspec_core::{Action, ApplyResult, Resource};
    use std::path::Path;

    struct Stub(&'static str);

    #[async_trait::async_trait]
    impl Adapter for Stub {
        fn name(&self) -> &str {
            self.0
        }

        async fn validate(&self, _resources: &[Resource]) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn apply(&self, _actions: &[Action]) -> Result<Vec<ApplyResult>, AdapterError> {
            Ok(vec![])
        }

        async fn export(&self, _resources: &[Resource], _out_dir: &Path) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn destroy(&self) -> Result<Vec<ApplyResult>, AdapterError> {
            Ok(vec![])
        }
    }

    #[test]
    fn register_then_get_round_trips() {
        let registry = AdapterRegistry::new();
        registry.register(Arc::new(Stub("local-process")));
        let found = registry.get("local-process").unwrap();
        assert_eq!(found.name(), "local-process");
    }

    #[test]
    fn lookup_of_unregistered_name_is_an_error() {
        let registry = AdapterRegistry::new();
        let err = match registry.get("missing") {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, AdapterError::NotRegistered(name) if name == "missing"));
    }

    #[test]
    fn names_are_sorted() {
        let registry = AdapterRegistry::new();
        registry.register(Arc::new(Stub("kubernetes")));
        registry.register(Arc::new(Stub("docker")));
        assert_eq!(registry.names(), vec!["docker".to_string(), "kubernetes".to_string()]);
    }
}
