//! Error types for AgentSpec operations.

use crate::identity::Fqn;
use thiserror::Error;

/// A single positional parse failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{file}:{line}:{column}: {message}")]
pub struct ParseError {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub hint: Option<String>,
}

/// Import resolution, cycle detection, version conflict, and lockfile
/// mismatch errors. All fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("import '{0}' could not be resolved from '{1}'")]
    ImportNotFound(String, String),

    #[error("circular dependencies detected: {0:?}")]
    CircularDependency(Vec<String>),

    #[error("version conflict for package '{package}': {chain}")]
    VersionConflict { package: String, chain: String },

    #[error("lockfile mismatch for '{origin}': expected hash {expected}, found {actual}")]
    LockfileHashMismatch {
        origin: String,
        expected: String,
        actual: String,
    },

    #[error("lockfile mismatch for '{origin}': expected version {expected}, found {actual}")]
    LockfileVersionMismatch {
        origin: String,
        expected: String,
        actual: String,
    },

    #[error("'.az' files are legacy; migrate '{0}' to '.ias'")]
    LegacyExtension(String),

    #[error("both '{0}.ias' and '{0}.az' exist for the same module")]
    ExtensionConflict(String),
}

/// Policy violations, missing references, and schema-shape errors. Fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown reference '{reference}' in {fqn}")]
    UnknownReference { fqn: Fqn, reference: String },

    #[error("skill '{0}' is missing a required input block")]
    MissingInput(String),

    #[error("skill '{0}' is missing a required output block")]
    MissingOutput(String),

    #[error("duplicate FQN '{0}' in document")]
    DuplicateFqn(String),

    #[error("policy '{policy}' denies '{action}' on '{resource}'")]
    PolicyDenied {
        policy: String,
        action: String,
        resource: String,
    },

    #[error("policy '{policy}' requires '{requirement}', which is absent")]
    PolicyRequirementMissing { policy: String, requirement: String },

    #[error("environment overlay target '{0}' does not exist")]
    OverlayTargetMissing(String),

    #[error("no binding")]
    NoBinding,
}

/// Errors surfaced while an adapter performs work. Per-action failures are
/// carried as `ApplyResult`s (mark-and-continue); this type is reserved for
/// a single top-level adapter failure that aborts the whole apply.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("adapter '{0}' is not registered")]
    NotRegistered(String),

    #[error("adapter '{adapter}' validation failed: {reason}")]
    ValidationFailed { adapter: String, reason: String },

    #[error("adapter '{adapter}' apply aborted: {reason}")]
    ApplyAborted { adapter: String, reason: String },

    #[error("adapter '{adapter}' does not support {operation}")]
    Unsupported { adapter: String, operation: String },

    #[error("subprocess '{command}' exited with {status}: {stderr}")]
    SubprocessFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("I/O error in adapter '{adapter}': {source}")]
    Io {
        adapter: String,
        #[source]
        source: std::sync::Arc<std::io::Error>,
    },
}

/// State-backend errors: corruption, locking, and I/O.
#[derive(Debug, Clone, Error)]
pub enum StateError {
    #[error("state file is corrupted and no valid backup was found")]
    Corrupted,

    #[error("state is locked by pid {holder_pid} on {holder_hostname} since {held_since}")]
    Locked {
        holder_pid: u32,
        holder_hostname: String,
        held_since: String,
    },

    #[error("timed out waiting for state lock held by pid {holder_pid} on {holder_hostname}")]
    LockTimeout {
        holder_pid: u32,
        holder_hostname: String,
    },

    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: std::sync::Arc<std::io::Error>,
    },

    #[error("failed to (de)serialize state: {0}")]
    Serde(String),
}

impl From<std::io::Error> for StateError {
    fn from(source: std::io::Error) -> Self {
        StateError::Io {
            source: std::sync::Arc::new(source),
        }
    }
}

/// Pipeline construction and execution errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("duplicate step name '{0}'")]
    DuplicateStep(String),

    #[error("step '{step}' depends on unknown step '{target}'")]
    UnknownDependency { step: String, target: String },

    #[error("step '{0}' depends on itself")]
    SelfDependency(String),

    #[error("cycle detected among steps: {0:?}")]
    Cycle(Vec<String>),

    #[error("step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },
}

/// Master error type unifying every AgentSpec error category.
#[derive(Debug, Error)]
pub enum AgentSpecError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Result type alias for AgentSpec operations.
pub type AgentSpecResult<T> = Result<T, AgentSpecError>;

/// Render a value for inclusion in an error message, redacting anything
/// tagged as a secret so secret values never leak into diagnostics.
pub fn redact_if_secret(is_secret: bool, value: &str) -> String {
    if is_secret {
        "<redacted>".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_secret_values() {
        assert_eq!(redact_if_secret(true, "sk-live-abc"), "<redacted>");
        assert_eq!(redact_if_secret(false, "claude-sonnet"), "claude-sonnet");
    }

    #[test]
    fn parse_error_display_carries_position() {
        let err = ParseError {
            file: "a.ias".into(),
            line: 3,
            column: 5,
            message: "expected identifier".into(),
            hint: None,
        };
        assert_eq!(err.to_string(), "a.ias:3:5: expected identifier");
    }
}
