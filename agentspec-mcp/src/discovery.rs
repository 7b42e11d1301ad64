//! Tool discovery: ask every connected server what it offers and present
//! the result as a flat, LLM-ready tool list.

use crate::error::McpError;
use crate::pool::ConnectionPool;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawTool {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ListToolsResult {
    #[serde(default)]
    tools: Vec<RawTool>,
}

/// Calls `tools/list` on every connected server and prefixes each tool's
/// name with `<server>/` so a flattened list stays collision-free.
pub async fn discover_tools(pool: &ConnectionPool) -> Result<Vec<ToolDefinition>, McpError> {
    let mut discovered = Vec::new();
    for (server, transport) in pool.all().await {
        let result = transport.call("tools/list", json!({})).await?;
        let parsed: ListToolsResult = serde_json::from_value(result).map_err(|e| McpError::RequestFailed {
            name: server.clone(),
            reason: format!("malformed tools/list result: {e}"),
        })?;
        for tool in parsed.tools {
            discovered.push(ToolDefinition {
                name: format!("{server}/{}", tool.name),
                description: tool.description,
                input_schema: tool.input_schema,
            });
        }
    }
    Ok(discovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Transport;
    use serde_json::Value;
    use std::sync::Arc;

    struct FakeServer;

    #[async_trait::async_trait]
    impl Transport for FakeServer {
        async fn call(&self, method: &str, _params: Value) -> Result<Value, McpError> {
            assert_eq!(method, "tools/list");
            Ok(json!({"tools": [{"name": "read_file", "description": "reads a file", "inputSchema": {"type": "object"}}]}))
        }

        async fn close(&self) -> Result<(), McpError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn tool_names_are_prefixed_with_server_name() {
        let pool = ConnectionPool::new();
        pool.connect("filesystem", || async { Ok::<Arc<dyn Transport>, McpError>(Arc::new(FakeServer)) })
            .await
            .unwrap();

        let tools = discover_tools(&pool).await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "filesystem/read_file");
    }
}
