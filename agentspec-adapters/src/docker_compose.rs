//! Docker-compose adapter: emits a `docker-compose.yml`, a per-service
//! config directory, and an `.env` template. Export-only — `apply`
//! shells out to `docker compose up` against the emitted file.

use crate::adapter::{Adapter, LogOptions, ResourceStatus};
use agentspec_core::{Action, ActionType, AdapterError, Resource, ResultStatus};
use std::path::Path;
use tokio::process::Command;

fn attr_str<'a>(resource: &'a Resource, key: &str) -> Option<&'a str> {
    resource.attributes.get(key).and_then(|v| v.as_str())
}

fn attr_number(resource: &Resource, key: &str) -> Option<f64> {
    resource.attributes.get(key).and_then(|v| v.as_number())
}

fn compose_yaml(resources: &[Resource]) -> String {
    let mut sorted: Vec<&Resource> = resources.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut services = serde_yaml::Mapping::new();
    for resource in sorted {
        let image = attr_str(resource, "image").unwrap_or("agentspec/runtime:latest");
        let port = attr_number(resource, "port").unwrap_or(8080.0) as u64;

        let mut service = serde_yaml::Mapping::new();
        service.insert("image".into(), image.into());
        service.insert(
            "ports".into(),
            serde_yaml::Value::Sequence(vec![format!("{port}:{port}").into()]),
        );
        service.insert("env_file".into(), format!("./{}/.env", resource.name).into());

        services.insert(resource.name.clone().into(), serde_yaml::Value::Mapping(service));
    }

    let mut root = serde_yaml::Mapping::new();
    root.insert("services".into(), serde_yaml::Value::Mapping(services));
    serde_yaml::to_string(&root).expect("compose mapping always serializes")
}

fn env_template(resource: &Resource) -> String {
    match resource.attributes.get("env") {
        Some(agentspec_core::AttributeValue::Mapping(map)) => map
            .keys()
            .map(|k| format!("{k}=\n"))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

pub struct DockerComposeAdapter;

impl DockerComposeAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DockerComposeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Adapter for DockerComposeAdapter {
    fn name(&self) -> &str {
        "docker-compose"
    }

    async fn validate(&self, resources: &[Resource]) -> Result<(), AdapterError> {
        for resource in resources {
            if attr_number(resource, "port").is_none() {
                return Err(AdapterError::ValidationFailed {
                    adapter: self.name().to_string(),
                    reason: format!("{} is missing a 'port' attribute", resource.fqn),
                });
            }
        }
        Ok(())
    }

    async fn apply(&self, actions: &[Action]) -> Result<Vec<agentspec_core::ApplyResult>, AdapterError> {
        if actions.is_empty() {
            return Ok(vec![]);
        }
        let work_dir = tempfile::tempdir().map_err(|e| AdapterError::Io {
            adapter: self.name().to_string(),
            source: std::sync::Arc::new(e),
        })?;
        let resources: Vec<Resource> = actions.iter().filter_map(|a| a.resource.clone()).collect();
        self.export(&resources, work_dir.path()).await?;

        let output = Command::new("docker")
            .args(["compose", "-f"])
            .arg(work_dir.path().join("docker-compose.yml"))
            .arg("up")
            .arg("-d")
            .output()
            .await
            .map_err(|e| AdapterError::Io {
                adapter: self.name().to_string(),
                source: std::sync::Arc::new(e),
            })?;

        let (status, error) = if output.status.success() {
            (ResultStatus::Success, None)
        } else {
            (ResultStatus::Failed, Some(String::from_utf8_lossy(&output.stderr).to_string()))
        };

        Ok(actions
            .iter()
            .map(|action| agentspec_core::ApplyResult {
                fqn: action.fqn.clone(),
                action: action.action_type,
                status,
                error: error.clone(),
                artifact: None,
            })
            .collect())
    }

    async fn export(&self, resources: &[Resource], out_dir: &Path) -> Result<(), AdapterError> {
        std::fs::create_dir_all(out_dir).map_err(|e| AdapterError::Io {
            adapter: self.name().to_string(),
            source: std::sync::Arc::new(e),
        })?;
        std::fs::write(out_dir.join("docker-compose.yml"), compose_yaml(resources)).map_err(|e| AdapterError::Io {
            adapter: self.name().to_string(),
            source: std::sync::Arc::new(e),
        })?;

        for resource in resources {
            let service_dir = out_dir.join(&resource.name);
            std::fs::create_dir_all(&service_dir).map_err(|e| AdapterError::Io {
                adapter: self.name().to_string(),
                source: std::sync::Arc::new(e),
            })?;
            std::fs::write(service_dir.join(".env"), env_template(resource)).map_err(|e| AdapterError::Io {
                adapter: self.name().to_string(),
                source: std::sync::Arc::new(e),
            })?;
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

    fn server_resource(name: &str, port: f64) -> Resource {
        let mut attrs = BTreeMap::new();
        attrs.insert("port".to_string(), AttributeValue::Number(port));
        Resource::new("acme", ResourceKind::Server, name, attrs)
    }

    #[tokio::test]
    async fn export_writes_compose_file_sorted_by_service_name() {
        let adapter = DockerComposeAdapter::new();
        let resources = vec![server_resource("zeta", 9001.0), server_resource("alpha", 9000.0)];
        let dir = tempfile::tempdir().unwrap();
        adapter.export(&resources, dir.path()).await.unwrap();
        let compose = std::fs::read_to_string(dir.path().join("docker-compose.yml")).unwrap();
        assert!(compose.find("alpha").unwrap() < compose.find("zeta").unwrap());
        assert!(dir.path().join("alpha/.env").exists());
        assert!(dir.path().join("zeta/.env").exists());
    }

    #[tokio::test]
    async fn export_is_deterministic() {
        let adapter = DockerComposeAdapter::new();
        let resources = vec![server_resource("svc", 9000.0)];
        let dir = tempfile::tempdir().unwrap();
        adapter.export(&resources, dir.path()).await.unwrap();
        let first = std::fs::read_to_string(dir.path().join("docker-compose.yml")).unwrap();
        adapter.export(&resources, dir.path()).await.unwrap();
        let second = std::fs::read_to_string(dir.path().join("docker-compose.yml")).unwrap();
        assert_eq!(first, second);
    }
}
