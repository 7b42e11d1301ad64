//! The `Adapter` contract: one trait every deployment target implements,
//! plus the small value types its operations pass around.

use agentspec_core::{Action, AdapterError, ApplyResult, Resource};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Unhealthy,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct ResourceStatus {
    pub fqn: String,
    pub health: HealthState,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub follow: bool,
    pub tail: Option<usize>,
    pub since: Option<String>,
}

/// A deployment target. `validate` and `export` must not perform I/O with
/// side effects on external systems; `apply` and `destroy` are the only
/// operations allowed to mutate the outside world.
#[async_trait::async_trait]
pub trait Adapter: Send + Sync {
    fn name(&self) -> &str;

    async fn validate(&self, resources: &[Resource]) -> Result<(), AdapterError>;

    /// `actions` never includes noop actions; the caller filters those out
    /// before delegating. A single top-level `Err` here means the adapter
    /// could not even attempt the batch (distinct from a per-action
    /// failure, which is reported as an `Ok` entry with `ResultStatus::Failed`).
    async fn apply(&self, actions: &[Action]) -> Result<Vec<ApplyResult>, AdapterError>;

    /// Deterministic: identical `resources` must produce byte-identical
    /// files in `out_dir` across runs.
    async fn export(&self, resources: &[Resource], out_dir: &Path) -> Result<(), AdapterError>;

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

    async fn destroy(&self) -> Result<Vec<ApplyResult>, AdapterError>;
}
