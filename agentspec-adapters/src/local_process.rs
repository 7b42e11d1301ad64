//! Local-process adapter: runs an `Agent`/`Server` resource as a plain
//! subprocess on the host, polling `/healthz` until it comes up.

use crate::adapter::{Adapter, HealthState, LogOptions, ResourceStatus};
use agentspec_core::{Action, ActionType, AdapterError, Fqn, Resource, ResultStatus};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::Mutex;

const HEALTH_PATH: &str = "/healthz";
const HEALTH_BACKOFF_CAP: Duration = Duration::from_secs(2);
const HEALTH_DEADLINE: Duration = Duration::from_secs(30);

fn attr_str<'a>(resource: &'a Resource, key: &str) -> Option<&'a str> {
    resource.attributes.get(key).and_then(|v| v.as_str())
}

fn attr_number(resource: &Resource, key: &str) -> Option<f64> {
    resource.attributes.get(key).and_then(|v| v.as_number())
}

struct Managed {
    child: Child,
}

pub struct LocalProcessAdapter {
    http: reqwest::Client,
    managed: Mutex<HashMap<Fqn, Managed>>,
}

impl LocalProcessAdapter {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            managed: Mutex::new(HashMap::new()),
        }
    }

    async fn wait_healthy(&self, port: u64) -> Result<(), String> {
        let url = format!("http://127.0.0.1:{port}{HEALTH_PATH}");
        let deadline = tokio::time::Instant::now() + HEALTH_DEADLINE;
        let mut backoff = Duration::from_millis(100);

        loop {
            match self.http.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => {}
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::error!(url, deadline = ?HEALTH_DEADLINE, "process never became healthy");
                return Err(format!("{url} did not become healthy within {HEALTH_DEADLINE:?}"));
            }
            tracing::warn!(url, next_check_in = ?backoff, "process not yet healthy, retrying");
            tokio::time::sleep(backoff).await;
            backoff = std::cmp::min(backoff * 2, HEALTH_BACKOFF_CAP);
        }
    }

    async fn spawn_one(&self, resource: &Resource) -> Result<(), String> {
        let command = attr_str(resource, "command").ok_or("missing 'command' attribute")?;
        let port = attr_number(resource, "port").ok_or("missing 'port' attribute")? as u64;

        let mut cmd = tokio::process::Command::new(command);
        if let Some(agentspec_core::AttributeValue::Sequence(args)) = resource.attributes.get("args") {
            for arg in args {
                if let Some(s) = arg.as_str() {
                    cmd.arg(s);
                }
            }
        }
        if let Some(agentspec_core::AttributeValue::Mapping(env)) = resource.attributes.get("env") {
            for (k, v) in env {
                if let Some(s) = v.as_str() {
                    cmd.env(k, s);
                }
            }
        }
        cmd.kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            tracing::error!(fqn = %resource.fqn, command, error = %e, "failed to spawn process");
            format!("failed to spawn '{command}': {e}")
        })?;
        self.wait_healthy(port).await?;

        tracing::info!(fqn = %resource.fqn, command, port, "process healthy");
        self.managed.lock().await.insert(resource.fqn.clone(), Managed { child });
        Ok(())
    }
}

impl Default for LocalProcessAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Adapter for LocalProcessAdapter {
    fn name(&self) -> &str {
        "local-process"
    }

    async fn validate(&self, resources: &[Resource]) -> Result<(), AdapterError> {
        for resource in resources {
            if attr_str(resource, "command").is_none() {
                return Err(AdapterError::ValidationFailed {
                    adapter: self.name().to_string(),
                    reason: format!("{} is missing a 'command' attribute", resource.fqn),
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
                    Some(resource) => self.spawn_one(resource).await,
                    None => Err("create/update action missing its resource".to_string()),
                },
                ActionType::Delete => {
                    if let Some(mut managed) = self.managed.lock().await.remove(&action.fqn) {
                        let _ = managed.child.kill().await;
                    }
                    Ok(())
                }
                ActionType::Noop => Ok(()),
            };

            results.push(match outcome {
                Ok(()) => agentspec_core::ApplyResult {
                    fqn: action.fqn.clone(),
                    action: action.action_type,
                    status: ResultStatus::Success,
                    error: None,
                    artifact: None,
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

    async fn export(&self, _resources: &[Resource], _out_dir: &Path) -> Result<(), AdapterError> {
        Err(AdapterError::Unsupported {
            adapter: self.name().to_string(),
            operation: "export".to_string(),
        })
    }

    async fn status(&self) -> Result<Vec<ResourceStatus>, AdapterError> {
        let managed = self.managed.lock().await;
        Ok(managed
            .keys()
            .map(|fqn| ResourceStatus {
                fqn: fqn.as_str().to_string(),
                health: HealthState::Healthy,
                detail: None,
            })
            .collect())
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
        let mut managed = self.managed.lock().await;
        let mut results = Vec::with_capacity(managed.len());
        for (fqn, mut proc) in managed.drain() {
            let (status, error) = match proc.child.kill().await {
                Ok(()) => (ResultStatus::Success, None),
                Err(e) => (ResultStatus::Failed, Some(e.to_string())),
            };
            results.push(agentspec_core::ApplyResult {
                fqn,
                action: ActionType::Delete,
                status,
                error,
                artifact: None,
            });
        }
        Ok(results)
    }
}
