//! Transports speak MCP's JSON-RPC 2.0 framing to an external tool server.
//! The subprocess-pipe transport is the one every MCP client is expected to
//! support; others (e.g. a WebSocket transport) are configuration errors at
//! connect time until implemented.

use crate::error::McpError;
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<Value, McpError>;
    async fn close(&self) -> Result<(), McpError>;
}

struct Pipe {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Spawns `command` and speaks newline-delimited JSON-RPC 2.0 over its
/// stdin/stdout. Requests are serialized one at a time behind a mutex;
/// MCP servers are not required to support request pipelining.
pub struct SubprocessPipeTransport {
    name: String,
    child: Mutex<Child>,
    pipe: Mutex<Pipe>,
    next_id: AtomicU64,
}

impl SubprocessPipeTransport {
    pub async fn spawn(name: &str, command: &str, args: &[String]) -> Result<Self, McpError> {
        let mut child = tokio::process::Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| McpError::ConnectionFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| McpError::ConnectionFailed {
            name: name.to_string(),
            reason: "child process has no stdin".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| McpError::ConnectionFailed {
            name: name.to_string(),
            reason: "child process has no stdout".to_string(),
        })?;

        Ok(Self {
            name: name.to_string(),
            child: Mutex::new(child),
            pipe: Mutex::new(Pipe {
                stdin,
                stdout: BufReader::new(stdout),
            }),
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait::async_trait]
impl Transport for SubprocessPipeTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        let mut line = serde_json::to_string(&request).map_err(|e| McpError::RequestFailed {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;
        line.push('\n');

        let mut pipe = self.pipe.lock().await;
        pipe.stdin.write_all(line.as_bytes()).await.map_err(|e| McpError::RequestFailed {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;

        let mut response_line = String::new();
        pipe.stdout
            .read_line(&mut response_line)
            .await
            .map_err(|e| McpError::RequestFailed {
                name: self.name.clone(),
                reason: e.to_string(),
            })?;
        if response_line.is_empty() {
            return Err(McpError::RequestFailed {
                name: self.name.clone(),
                reason: "server closed its stdout".to_string(),
            });
        }

        let response: Value = serde_json::from_str(&response_line).map_err(|e| McpError::RequestFailed {
            name: self.name.clone(),
            reason: format!("malformed JSON-RPC response: {e}"),
        })?;
        if let Some(error) = response.get("error") {
            return Err(McpError::RequestFailed {
                name: self.name.clone(),
                reason: error.to_string(),
            });
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn close(&self) -> Result<(), McpError> {
        self.child.lock().await.kill().await.map_err(|e| McpError::RequestFailed {
            name: self.name.clone(),
            reason: e.to_string(),
        })
    }
}
