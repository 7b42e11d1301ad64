//! Deployment adapters: one `Adapter` implementation per target
//! environment, plus the process-wide registry that resolves a binding's
//! adapter name to the concrete implementation.

mod adapter;
mod canonical;
mod docker;
mod docker_compose;
mod kubernetes;
mod local_mcp;
mod local_process;
mod registry;

pub use adapter::{Adapter, HealthState, LogOptions, ResourceStatus};
pub use canonical::write_canonical_json;
pub use docker::DockerAdapter;
pub use docker_compose::DockerComposeAdapter;
pub use kubernetes::KubernetesAdapter;
pub use local_mcp::LocalMcpAdapter;
pub use local_process::LocalProcessAdapter;
pub use registry::AdapterRegistry;

/// Build a registry with every reference adapter registered under its
/// `deploy_target_adapter_name` mapping.
pub fn default_registry() -> AdapterRegistry {
    let registry = AdapterRegistry::new();
    registry.register(std::sync::Arc::new(LocalProcessAdapter::new()));
    registry.register(std::sync::Arc::new(LocalMcpAdapter::new()));
    registry.register(std::sync::Arc::new(DockerAdapter::new()));
    registry.register(std::sync::Arc::new(DockerComposeAdapter::new()));
    registry.register(std::sync::Arc::new(KubernetesAdapter::default()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_carries_every_reference_adapter() {
        let registry = default_registry();
        assert_eq!(
            registry.names(),
            vec!["docker", "docker-compose", "kubernetes", "local-mcp", "local-process"]
        );
    }
}
