//! Kubernetes adapter: renders Namespace, ConfigMap, Deployment, Service,
//! and HPA manifests and applies them via `kubectl` in that fixed order.
//! On the first failure the remaining manifests are skipped and every
//! requested action is reported as failed, since a partial manifest set
//! leaves the cluster in an unspecified state.

use crate::adapter::{Adapter, LogOptions, ResourceStatus};
use crate::canonical::write_canonical_json;
use agentspec_core::{Action, AdapterError, Resource, ResultStatus};
use serde_json::{json, Value};
use std::path::Path;
use tokio::process::Command;

fn attr_str<'a>(resource: &'a Resource, key: &str) -> Option<&'a str> {
    resource.attributes.get(key).and_then(|v| v.as_str())
}

fn attr_number(resource: &Resource, key: &str) -> Option<f64> {
    resource.attributes.get(key).and_then(|v| v.as_number())
}

const MANIFEST_ORDER: [&str; 5] = ["namespace", "configmap", "deployment", "service", "hpa"];

fn namespace_manifest(namespace: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {"name": namespace},
    })
}

fn configmap_manifest(resource: &Resource, namespace: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": format!("{}-config", resource.name), "namespace": namespace},
        "data": {"model": attr_str(resource, "model").unwrap_or("")},
    })
}

fn deployment_manifest(resource: &Resource, namespace: &str) -> Value {
    let image = attr_str(resource, "image").unwrap_or("agentspec/runtime:latest");
    let replicas = attr_number(resource, "replicas").unwrap_or(1.0) as u64;
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {"name": resource.name, "namespace": namespace},
        "spec": {
            "replicas": replicas,
            "selector": {"matchLabels": {"app": resource.name}},
            "template": {
                "metadata": {"labels": {"app": resource.name}},
                "spec": {"containers": [{"name": resource.name, "image": image}]},
            },
        },
    })
}

fn service_manifest(resource: &Resource, namespace: &str) -> Value {
    let port = attr_number(resource, "port").unwrap_or(8080.0) as u64;
    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {"name": resource.name, "namespace": namespace},
        "spec": {
            "selector": {"app": resource.name},
            "ports": [{"port": port, "targetPort": port}],
        },
    })
}

fn hpa_manifest(resource: &Resource, namespace: &str) -> Option<Value> {
    let autoscale = resource.attributes.get("autoscale")?;
    let agentspec_core::AttributeValue::Mapping(config) = autoscale else {
        return None;
    };
    let min_replicas = config.get("min").and_then(|v| v.as_number()).unwrap_or(1.0) as u64;
    let max_replicas = config.get("max").and_then(|v| v.as_number()).unwrap_or(1.0) as u64;
    Some(json!({
        "apiVersion": "autoscaling/v2",
        "kind": "HorizontalPodAutoscaler",
        "metadata": {"name": format!("{}-hpa", resource.name), "namespace": namespace},
        "spec": {
            "scaleTargetRef": {"apiVersion": "apps/v1", "kind": "Deployment", "name": resource.name},
            "minReplicas": min_replicas,
            "maxReplicas": max_replicas,
        },
    }))
}

fn manifests_for(resources: &[Resource], namespace: &str) -> Vec<(&'static str, Value)> {
    let mut by_kind: Vec<(&'static str, Value)> = vec![("namespace", namespace_manifest(namespace))];
    for resource in resources {
        by_kind.push(("configmap", configmap_manifest(resource, namespace)));
        by_kind.push(("deployment", deployment_manifest(resource, namespace)));
        by_kind.push(("service", service_manifest(resource, namespace)));
        if let Some(hpa) = hpa_manifest(resource, namespace) {
            by_kind.push(("hpa", hpa));
        }
    }
    by_kind.sort_by_key(|(kind, _)| MANIFEST_ORDER.iter().position(|k| k == kind).unwrap_or(usize::MAX));
    by_kind
}

pub struct KubernetesAdapter {
    namespace: String,
}

impl KubernetesAdapter {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into() }
    }
}

impl Default for KubernetesAdapter {
    fn default() -> Self {
        Self::new("default")
    }
}

#[async_trait::async_trait]
impl Adapter for KubernetesAdapter {
    fn name(&self) -> &str {
        "kubernetes"
    }

    async fn validate(&self, resources: &[Resource]) -> Result<(), AdapterError> {
        for resource in resources {
            if attr_str(resource, "image").is_none() {
                return Err(AdapterError::ValidationFailed {
                    adapter: self.name().to_string(),
                    reason: format!("{} is missing an 'image' attribute", resource.fqn),
                });
            }
        }
        Ok(())
    }

    async fn apply(&self, actions: &[Action]) -> Result<Vec<agentspec_core::ApplyResult>, AdapterError> {
        let resources: Vec<Resource> = actions.iter().filter_map(|a| a.resource.clone()).collect();
        let manifests = manifests_for(&resources, &self.namespace);

        let work_dir = tempfile::tempdir().map_err(|e| AdapterError::Io {
            adapter: self.name().to_string(),
            source: std::sync::Arc::new(e),
        })?;

        for (index, (kind, manifest)) in manifests.iter().enumerate() {
            let path = work_dir.path().join(format!("{index:03}-{kind}.json"));
            write_canonical_json(self.name(), &path, manifest)?;

            let output = Command::new("kubectl")
                .arg("apply")
                .arg("-f")
                .arg(&path)
                .output()
                .await
                .map_err(|e| AdapterError::Io {
                    adapter: self.name().to_string(),
                    source: std::sync::Arc::new(e),
                })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                tracing::error!(kind, path = %path.display(), stderr, "kubectl apply failed");
                return Ok(actions
                    .iter()
                    .map(|action| agentspec_core::ApplyResult {
                        fqn: action.fqn.clone(),
                        action: action.action_type,
                        status: ResultStatus::Failed,
                        error: Some(format!("kubectl apply of {kind} manifest failed: {stderr}")),
                        artifact: None,
                    })
                    .collect());
            }
        }

        tracing::info!(namespace = %self.namespace, manifest_count = manifests.len(), "kubectl apply succeeded");
        Ok(actions
            .iter()
            .map(|action| agentspec_core::ApplyResult {
                fqn: action.fqn.clone(),
                action: action.action_type,
                status: ResultStatus::Success,
                error: None,
                artifact: None,
            })
            .collect())
    }

    async fn export(&self, resources: &[Resource], out_dir: &Path) -> Result<(), AdapterError> {
        let manifests = manifests_for(resources, &self.namespace);
        for (index, (kind, manifest)) in manifests.iter().enumerate() {
            let path = out_dir.join(format!("{index:03}-{kind}.json"));
            write_canonical_json(self.name(), &path, manifest)?;
        }
        Ok(())
    }

    async fn status(&self) -> Result<Vec<ResourceStatus>, AdapterError> {
        Err(AdapterError::Unsupported {
            adapter: self.name().to_string(),
            operation: "status".to_string(),
        })
    }

    async fn logs(
        &self,
        _writer: &mut (dyn std::io::Write + Send),
        _opts: &LogOptions,
    ) -> Result<(), AdapterError> {
        Err(AdapterError::Unsupported {
            adapter: self.name().to_string(),
            operation: "logs".to_string(),
        })
    }

    async fn destroy(&self) -> Result<Vec<agentspec_core::ApplyResult>, AdapterError> {
        Ok(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentspec_core::{AttributeValue, ResourceKind};
    use std::collections::BTreeMap;

    fn agent_resource(name: &str) -> Resource {
        let mut attrs = BTreeMap::new();
        attrs.insert("image".to_string(), AttributeValue::String("agentspec/agent:latest".into()));
        attrs.insert("port".to_string(), AttributeValue::Number(8080.0));
        Resource::new("acme", ResourceKind::Agent, name, attrs)
    }

    #[test]
    fn manifests_follow_deterministic_order() {
        let resources = vec![agent_resource("bot")];
        let manifests = manifests_for(&resources, "acme");
        let kinds: Vec<&str> = manifests.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec!["namespace", "configmap", "deployment", "service"]);
    }

    #[test]
    fn autoscale_attribute_adds_hpa_manifest_last() {
        let mut resource = agent_resource("bot");
        let mut autoscale = BTreeMap::new();
        autoscale.insert("min".to_string(), AttributeValue::Number(1.0));
        autoscale.insert("max".to_string(), AttributeValue::Number(5.0));
        resource.attributes.insert("autoscale".to_string(), AttributeValue::Mapping(autoscale));

        let manifests = manifests_for(&[resource], "acme");
        let kinds: Vec<&str> = manifests.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec!["namespace", "configmap", "deployment", "service", "hpa"]);
    }

    #[tokio::test]
    async fn export_writes_one_manifest_file_per_kind() {
        let adapter = KubernetesAdapter::new("acme");
        let resources = vec![agent_resource("bot")];
        let dir = tempfile::tempdir().unwrap();
        adapter.export(&resources, dir.path()).await.unwrap();
        let mut entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        entries.sort();
        assert_eq!(entries.len(), 4);
    }

    #[tokio::test]
    async fn validate_requires_image() {
        let adapter = KubernetesAdapter::new("acme");
        let resource = Resource::new("acme", ResourceKind::Agent, "bot", BTreeMap::new());
        let err = adapter.validate(&[resource]).await.unwrap_err();
        assert!(matches!(err, AdapterError::ValidationFailed { .. }));
    }
}
