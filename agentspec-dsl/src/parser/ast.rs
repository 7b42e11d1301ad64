//! Abstract Syntax Tree types for the AgentSpec DSL.

use serde::{Deserialize, Serialize};

/// The root AST node for one `.ias` source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub package: PackageHeader,
    pub imports: Vec<ImportStmt>,
    pub resources: Vec<ResourceBlock>,
}

/// `package "name" version "x.y.z" (lang "..")?`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageHeader {
    pub name: String,
    pub version: String,
    pub lang: Option<String>,
}

/// `import "path"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportStmt {
    pub path: String,
    pub line: usize,
    pub column: usize,
}

/// The closed set of block keywords that introduce a `ResourceBlock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
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

impl BlockKind {
    pub fn as_resource_kind(&self) -> agentspec_core::ResourceKind {
        use agentspec_core::ResourceKind as RK;
        match self {
            BlockKind::Prompt => RK::Prompt,
            BlockKind::Skill => RK::Skill,
            BlockKind::Agent => RK::Agent,
            BlockKind::Server => RK::Server,
            BlockKind::Client => RK::Client,
            BlockKind::Secret => RK::Secret,
            BlockKind::Environment => RK::Environment,
            BlockKind::Policy => RK::Policy,
            BlockKind::Plugin => RK::Plugin,
            BlockKind::DeployTarget => RK::DeployTarget,
            BlockKind::Type => RK::Type,
            BlockKind::Pipeline => RK::Pipeline,
        }
    }
}

/// `KIND "name" { Attribute* }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceBlock {
    pub kind: BlockKind,
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub line: usize,
    pub column: usize,
}

/// `IDENT Value` or a nested block taking the attribute name as its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: Value,
    pub line: usize,
    pub column: usize,
}

/// The value side of an `Attribute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Str(String),
    Num(f64),
    Bool(bool),
    List(Vec<Value>),
    Block(Vec<Attribute>),
    /// `IDENT String "{" Attribute* "}"`, e.g. `step "one" { depends_on [] }`.
    /// The string is the block's own name, distinct from the attribute name
    /// it's stored under (which is usually plural or repeated, e.g. `step`).
    NamedBlock(String, Vec<Attribute>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}
