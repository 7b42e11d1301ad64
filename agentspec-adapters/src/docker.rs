//! Docker adapter: generates a Dockerfile and runtime config, builds an
//! image, and runs a detached container with a port mapping.

use crate::adapter::{Adapter, LogOptions, ResourceStatus};
use crate::canonical::write_canonical_json;
use agentspec_core::{Action, ActionType, AdapterError, Resource, ResultStatus};
use std::path::Path;
use tokio::process::Command;

fn attr_str<'a>(resource: &'a Resource, key: &str) -> Option<&'a str> {
    resource.attributes.get(key).and_then(|v| v.as_str())
}

fn attr_number(resource: &Resource, key: &str) -> Option<f64> {
    resource.attributes.get(key).and_then(|v| v.as_number())
}

fn dockerfile_for(resource: &Resource) -> String {
    let image = attr_str(resource, "image").unwrap_or("node:20-slim");
    let command = attr_str(resource, "command").unwrap_or("agentspec-runtime");
    format!("FROM {image}\nWORKDIR /app\nCOPY . .\nCMD [\"{command}\"]\n")
}

async fn run(adapter: &str, program: &str, args: &[&str]) -> Result<(), AdapterError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| AdapterError::Io {
            adapter: adapter.to_string(),
            source: std::sync::Arc::new(e),
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        tracing::error!(adapter, program, status = %output.status, stderr, "subprocess failed");
        return Err(AdapterError::SubprocessFailed {
            command: format!("{program} {}", args.join(" ")),
            status: output.status.to_string(),
            stderr,
        });
    }
    Ok(())
}

pub struct DockerAdapter;

impl DockerAdapter {
    pub fn new() -> Self {
        Self
    }

    fn image_tag(resource: &Resource) -> String {
        format!("agentspec/{}:latest", resource.name)
    }

    async fn apply_one(&self, resource: &Resource) -> Result<String, String> {
        let port = attr_number(resource, "port").map(|p| p as u64).unwrap_or(8080);
        let tag = Self::image_tag(resource);

        let build_dir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let dockerfile_path = build_dir.path().join("Dockerfile");
        std::fs::write(&dockerfile_path, dockerfile_for(resource)).map_err(|e| e.to_string())?;

        run(self.name(), "docker", &["build", "-t", &tag, build_dir.path().to_str().unwrap()])
            .await
            .map_err(|e| e.to_string())?;

        let port_mapping = format!("{port}:{port}");
        run(
            self.name(),
            "docker",
            &["run", "-d", "--name", &resource.name, "-p", &port_mapping, &tag],
        )
        .await
        .map_err(|e| e.to_string())?;

        tracing::info!(fqn = %resource.fqn, tag, port, "container running");
        Ok(tag)
    }
}

impl Default for DockerAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Adapter for DockerAdapter {
    fn name(&self) -> &str {
        "docker"
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
        let mut results = Vec::with_capacity(actions.len());
        for action in actions {
            let outcome = match action.action_type {
                ActionType::Create | ActionType::Update => match &action.resource {
                    Some(resource) => self.apply_one(resource).await,
                    None => Err("create/update action missing its resource".to_string()),
                },
                ActionType::Delete => match action.fqn.parts() {
                    Ok((_, _, name)) => run(self.name(), "docker", &["rm", "-f", name])
                        .await
                        .map(|_| String::new())
                        .map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                },
                ActionType::Noop => Ok(String::new()),
            };

            results.push(match outcome {
                Ok(artifact) => agentspec_core::ApplyResult {
                    fqn: action.fqn.clone(),
                    action: action.action_type,
                    status: ResultStatus::Success,
                    error: None,
                    artifact: if artifact.is_empty() { None } else { Some(artifact) },
                },
                Err(reason) => agentspec_core::ApplyResult {
                    fqn: action.fqn.clone(),
                    action: action.action_type,
                    status: ResultStatus::Failed,
                    error: Some(reason),
                    artifact: None,
                },
            });
        }
        Ok(results)
    }

    async fn export(&self, resources: &[Resource], out_dir: &Path) -> Result<(), AdapterError> {
        for resource in resources {
            let dir = out_dir.join(&resource.name);
            std::fs::create_dir_all(&dir).map_err(|e| AdapterError::Io {
                adapter: self.name().to_string(),
                source: std::sync::Arc::new(e),
            })?;
            std::fs::write(dir.join("Dockerfile"), dockerfile_for(resource)).map_err(|e| AdapterError::Io {
                adapter: self.name().to_string(),
                source: std::sync::Arc::new(e),
            })?;

            let port = attr_number(resource, "port").unwrap_or(8080.0);
            let config = serde_json::json!({
                "image": Self::image_tag(resource),
                "name": resource.name,
                "port": port,
            });
            write_canonical_json(self.name(), &dir.join("runtime.json"), &config)?;
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
    async fn validate_requires_port() {
        let adapter = DockerAdapter::new();
        let resource = Resource::new("acme", ResourceKind::Server, "svc", BTreeMap::new());
        let err = adapter.validate(&[resource]).await.unwrap_err();
        assert!(matches!(err, AdapterError::ValidationFailed { .. }));
    }

    #[tokio::test]
    async fn export_writes_dockerfile_and_sorted_runtime_config() {
        let adapter = DockerAdapter::new();
        let resource = server_resource("svc", 9000.0);
        let dir = tempfile::tempdir().unwrap();
        adapter.export(&[resource], dir.path()).await.unwrap();

        let dockerfile = std::fs::read_to_string(dir.path().join("svc/Dockerfile")).unwrap();
        assert!(dockerfile.starts_with("FROM "));

        let config = std::fs::read_to_string(dir.path().join("svc/runtime.json")).unwrap();
        assert!(config.ends_with('\n'));
        assert!(config.find("\"image\"").unwrap() < config.find("\"port\"").unwrap());
    }

    #[tokio::test]
    async fn export_is_deterministic() {
        let adapter = DockerAdapter::new();
        let resource = server_resource("svc", 9000.0);
        let dir = tempfile::tempdir().unwrap();
        adapter.export(&[resource.clone()], dir.path()).await.unwrap();
        let first = std::fs::read_to_string(dir.path().join("svc/runtime.json")).unwrap();
        adapter.export(&[resource], dir.path()).await.unwrap();
        let second = std::fs::read_to_string(dir.path().join("svc/runtime.json")).unwrap();
        assert_eq!(first, second);
    }
}
