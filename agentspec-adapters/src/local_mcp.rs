//! Local-mcp adapter: the target `deploy target "process"` collapses to.
//! Splits resources by kind into `agents.json`, `mcp-servers.json`, and
//! `mcp-clients.json` rather than running anything itself.

use crate::adapter::{Adapter, LogOptions, ResourceStatus};
use crate::canonical::write_canonical_json;
use agentspec_core::{Action, ActionType, AdapterError, Resource, ResourceKind, ResultStatus};
use serde_json::{json, Value};
use std::path::Path;

fn resource_to_json(resource: &Resource) -> Value {
    let mut attrs = serde_json::Map::new();
    for (key, value) in &resource.attributes {
        if let Ok(v) = serde_json::to_value(value) {
            attrs.insert(key.clone(), v);
        }
    }
    json!({
        "name": resource.name,
        "fqn": resource.fqn.as_str(),
        "attributes": attrs,
    })
}

fn bucket(resources: &[Resource], kind: ResourceKind) -> Value {
    let mut entries: Vec<&Resource> = resources.iter().filter(|r| r.kind == kind).collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Value::Array(entries.into_iter().map(resource_to_json).collect())
}

pub struct LocalMcpAdapter;

impl LocalMcpAdapter {
    pub fn new() -> Self {
        Self
    }

    fn write_buckets(&self, resources: &[Resource], out_dir: &Path) -> Result<(), AdapterError> {
        std::fs::create_dir_all(out_dir).map_err(|e| AdapterError::Io {
            adapter: self.name().to_string(),
            source: std::sync::Arc::new(e),
        })?;
        write_canonical_json(self.name(), &out_dir.join("agents.json"), &bucket(resources, ResourceKind::Agent))?;
        write_canonical_json(self.name(), &out_dir.join("mcp-servers.json"), &bucket(resources, ResourceKind::Server))?;
        write_canonical_json(self.name(), &out_dir.join("mcp-clients.json"), &bucket(resources, ResourceKind::Client))?;
        Ok(())
    }
}

impl Default for LocalMcpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Adapter for LocalMcpAdapter {
    fn name(&self) -> &str {
        "local-mcp"
    }

    async fn validate(&self, _resources: &[Resource]) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn apply(&self, actions: &[Action]) -> Result<Vec<agentspec_core::ApplyResult>, AdapterError> {
        let live: Vec<Resource> = actions
            .iter()
            .filter(|a| a.action_type != ActionType::Delete)
            .filter_map(|a| a.resource.clone())
            .collect();

        let out_dir = std::env::current_dir()
            .map_err(|e| AdapterError::Io {
                adapter: self.name().to_string(),
                source: std::sync::Arc::new(e),
            })?
            .join(".agentspec-mcp");
        self.write_buckets(&live, &out_dir)?;

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
        self.write_buckets(resources, out_dir)
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
    use agentspec_core::AttributeValue;
    use std::collections::BTreeMap;

    fn resource(kind: ResourceKind, name: &str) -> Resource {
        let mut attrs = BTreeMap::new();
        attrs.insert("model".to_string(), AttributeValue::String("claude-sonnet".into()));
        Resource::new("acme", kind, name, attrs)
    }

    #[tokio::test]
    async fn export_splits_resources_into_three_buckets() {
        let adapter = LocalMcpAdapter::new();
        let resources = vec![
            resource(ResourceKind::Agent, "bot"),
            resource(ResourceKind::Server, "fs"),
            resource(ResourceKind::Client, "cli"),
            resource(ResourceKind::Prompt, "greeting"),
        ];
        let dir = tempfile::tempdir().unwrap();
        adapter.export(&resources, dir.path()).await.unwrap();

        let agents: Value = serde_json::from_str(&std::fs::read_to_string(dir.path().join("agents.json")).unwrap()).unwrap();
        assert_eq!(agents.as_array().unwrap().len(), 1);

        let servers: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("mcp-servers.json")).unwrap()).unwrap();
        assert_eq!(servers.as_array().unwrap().len(), 1);

        let clients: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("mcp-clients.json")).unwrap()).unwrap();
        assert_eq!(clients.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn export_is_deterministic() {
        let adapter = LocalMcpAdapter::new();
        let resources = vec![resource(ResourceKind::Agent, "bot")];
        let dir = tempfile::tempdir().unwrap();
        adapter.export(&resources, dir.path()).await.unwrap();
        let first = std::fs::read_to_string(dir.path().join("agents.json")).unwrap();
        adapter.export(&resources, dir.path()).await.unwrap();
        let second = std::fs::read_to_string(dir.path().join("agents.json")).unwrap();
        assert_eq!(first, second);
    }
}
