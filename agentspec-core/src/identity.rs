//! Identity types for AgentSpec resources

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// RESOURCE KIND
// ============================================================================

/// The closed set of resource kinds the DSL can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Prompt,
    Skill,
    Agent,
    Server,
    Client,
    Secret,
    Environment,
    Policy,
    Plugin,
    DeployTarget,
    Type,
    Pipeline,
}

impl ResourceKind {
    /// All kinds, in a fixed order used for deterministic iteration.
    pub const ALL: &'static [ResourceKind] = &[
        ResourceKind::Prompt,
        ResourceKind::Skill,
        ResourceKind::Agent,
        ResourceKind::Server,
        ResourceKind::Client,
        ResourceKind::Secret,
        ResourceKind::Environment,
        ResourceKind::Policy,
        ResourceKind::Plugin,
        ResourceKind::DeployTarget,
        ResourceKind::Type,
        ResourceKind::Pipeline,
    ];

    /// The capitalized identifier used in FQNs (`<package>/<Kind>/<name>`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Prompt => "Prompt",
            ResourceKind::Skill => "Skill",
            ResourceKind::Agent => "Agent",
            ResourceKind::Server => "Server",
            ResourceKind::Client => "Client",
            ResourceKind::Secret => "Secret",
            ResourceKind::Environment => "Environment",
            ResourceKind::Policy => "Policy",
            ResourceKind::Plugin => "Plugin",
            ResourceKind::DeployTarget => "DeployTarget",
            ResourceKind::Type => "Type",
            ResourceKind::Pipeline => "Pipeline",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownResourceKind(pub String);

impl fmt::Display for UnknownResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown resource kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownResourceKind {}

impl FromStr for ResourceKind {
    type Err = UnknownResourceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Prompt" => Ok(ResourceKind::Prompt),
            "Skill" => Ok(ResourceKind::Skill),
            "Agent" => Ok(ResourceKind::Agent),
            "Server" => Ok(ResourceKind::Server),
            "Client" => Ok(ResourceKind::Client),
            "Secret" => Ok(ResourceKind::Secret),
            "Environment" => Ok(ResourceKind::Environment),
            "Policy" => Ok(ResourceKind::Policy),
            "Plugin" => Ok(ResourceKind::Plugin),
            "DeployTarget" => Ok(ResourceKind::DeployTarget),
            "Type" => Ok(ResourceKind::Type),
            "Pipeline" => Ok(ResourceKind::Pipeline),
            other => Err(UnknownResourceKind(other.to_string())),
        }
    }
}

// ============================================================================
// FULLY-QUALIFIED NAME
// ============================================================================

/// A canonical `<package>/<Kind>/<name>` identifier, the primary key used in
/// plans and persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fqn(String);

impl Fqn {
    pub fn new(package: &str, kind: ResourceKind, name: &str) -> Self {
        Self(format!("{}/{}/{}", package, kind.as_str(), name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split back into `(package, kind, name)`.
    pub fn parts(&self) -> Result<(&str, ResourceKind, &str), FqnParseError> {
        let mut segments = self.0.splitn(3, '/');
        let package = segments.next().ok_or_else(|| FqnParseError(self.0.clone()))?;
        let kind = segments.next().ok_or_else(|| FqnParseError(self.0.clone()))?;
        let name = segments.next().ok_or_else(|| FqnParseError(self.0.clone()))?;
        let kind = ResourceKind::from_str(kind).map_err(|_| FqnParseError(self.0.clone()))?;
        Ok((package, kind, name))
    }
}

impl fmt::Display for Fqn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when a string cannot be parsed as an FQN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FqnParseError(pub String);

impl fmt::Display for FqnParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid <package>/<Kind>/<name> FQN", self.0)
    }
}

impl std::error::Error for FqnParseError {}

impl FromStr for Fqn {
    type Err = FqnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fqn = Fqn(s.to_string());
        fqn.parts().map_err(|_| FqnParseError(s.to_string()))?;
        Ok(fqn)
    }
}

// ============================================================================
// CONTENT HASH
// ============================================================================

/// A BLAKE3 content hash over a resource's canonicalized attribute tree,
/// hex-encoded. Stable under re-serialization, independent of source
/// formatting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hash(String);

impl Hash {
    /// Compute the content hash of already-canonicalized bytes.
    pub fn of(canonical_bytes: &[u8]) -> Self {
        let digest = blake3::hash(canonical_bytes);
        Self(hex::encode(digest.as_bytes()))
    }

    /// The empty hash, used as a sentinel for failed resources in state.
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Hash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ============================================================================
// OTHER IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone, matching the teacher's convention.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
