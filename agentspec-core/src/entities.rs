//! AgentSpec data model — the atoms that flow through parse -> lower ->
//! overlay -> diff -> apply.

use crate::identity::{Fqn, Hash, ResourceKind, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// ATTRIBUTE VALUE TREE
// ============================================================================

/// A canonical attribute value. Mappings use `BTreeMap` so iteration is
/// already key-sorted, which is exactly what canonical hashing needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Number(f64),
    Bool(bool),
    Sequence(Vec<AttributeValue>),
    Mapping(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Serialize into the canonical byte encoding used for hashing: a
    /// depth-first walk with key-sorted mappings (free via `BTreeMap`),
    /// declaration-order sequences, and uniformly escaped strings.
    pub fn write_canonical(&self, out: &mut String) {
        match self {
            AttributeValue::String(s) => {
                out.push('"');
                for c in s.chars() {
                    match c {
                        '\\' => out.push_str("\\\\"),
                        '"' => out.push_str("\\\""),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        '\r' => out.push_str("\\r"),
                        c => out.push(c),
                    }
                }
                out.push('"');
            }
            AttributeValue::Number(n) => {
                out.push_str(&canonical_number(*n));
            }
            AttributeValue::Bool(b) => {
                out.push_str(if *b { "true" } else { "false" });
            }
            AttributeValue::Sequence(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out);
                }
                out.push(']');
            }
            AttributeValue::Mapping(map) => {
                out.push('{');
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    AttributeValue::String(key.clone()).write_canonical(out);
                    out.push(':');
                    value.write_canonical(out);
                }
                out.push('}');
            }
        }
    }
}

/// Render a float the same way regardless of how it was parsed, so
/// `1` and `1.0` in source never produce different hashes than intended.
fn canonical_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// An ordered attribute mapping. Backed by `BTreeMap` so both runtime
/// lookups and canonical serialization share one key-sorted representation.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

// ============================================================================
// RESOURCE
// ============================================================================

/// The atom of the IR: one declared `kind name { ... }` block, lowered and
/// content-hashed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub name: String,
    pub fqn: Fqn,
    pub attributes: AttributeMap,
    pub hash: Hash,
}

impl Resource {
    /// Build a resource and compute its content hash from `attributes`.
    pub fn new(package: &str, kind: ResourceKind, name: &str, attributes: AttributeMap) -> Self {
        let fqn = Fqn::new(package, kind, name);
        let hash = hash_attributes(&attributes);
        Self {
            kind,
            name: name.to_string(),
            fqn,
            attributes,
            hash,
        }
    }

    /// Return a clone with one attribute replaced and the hash recomputed.
    /// Used by the environment overlay, which must never mutate its input.
    pub fn with_attribute(&self, key: &str, value: AttributeValue) -> Self {
        let mut attributes = self.attributes.clone();
        attributes.insert(key.to_string(), value);
        let hash = hash_attributes(&attributes);
        Self {
            attributes,
            hash,
            ..self.clone()
        }
    }
}

/// Compute the content hash of an attribute map via the canonical encoding.
pub fn hash_attributes(attributes: &AttributeMap) -> Hash {
    let mut buf = String::new();
    AttributeValue::Mapping(attributes.clone()).write_canonical(&mut buf);
    Hash::of(buf.as_bytes())
}

// ============================================================================
// DOCUMENT
// ============================================================================

/// Package-level metadata carried alongside a `Document`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
    pub lang: Option<String>,
}

/// A named binding from a deploy-target or adapter name to a default flag,
/// used for binding resolution (spec.md 4.5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    pub adapter: String,
    pub default: bool,
}

/// The lowered IR: resources deduplicated by FQN, plus deploy targets and
/// bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    pub package: Option<PackageMetadata>,
    pub resources: Vec<Resource>,
    pub deploy_targets: Vec<Resource>,
    pub bindings: Vec<Binding>,
}

impl Document {
    pub fn find(&self, fqn: &Fqn) -> Option<&Resource> {
        self.resources.iter().find(|r| &r.fqn == fqn)
    }

    pub fn resources_of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }
}

// ============================================================================
// STATE
// ============================================================================

/// Status of a resource's last apply attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStatus {
    Applied,
    Failed,
}

/// One persisted record of an applied resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub fqn: Fqn,
    pub hash: Hash,
    pub status: ApplyStatus,
    pub last_applied: Timestamp,
    pub adapter: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

// ============================================================================
// ACTIONS & RESULTS
// ============================================================================

/// The kind of change the diff engine computed for one FQN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    Update,
    Delete,
    Noop,
}

impl ActionType {
    /// The glyph used in the plan text renderer (spec.md 6).
    pub fn glyph(&self) -> &'static str {
        match self {
            ActionType::Create => "+",
            ActionType::Update => "~",
            ActionType::Delete => "-",
            ActionType::Noop => " ",
        }
    }
}

/// One entry in the sorted action list the diff engine emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub fqn: Fqn,
    #[serde(rename = "action")]
    pub action_type: ActionType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resource: Option<Resource>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
}

/// Outcome of an adapter applying one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Failed,
}

/// What an adapter reports back for one applied action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub fqn: Fqn,
    pub action: ActionType,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub artifact: Option<String>,
}

// ============================================================================
// IMPORTS
// ============================================================================

/// Whether an import resolves to a file on disk or a versioned package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Local,
    Package,
}

/// A resolved import, ready to be parsed or already parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedImport {
    pub source: String,
    pub kind: ImportKind,
    pub alias: Option<String>,
    pub version: Option<String>,
    pub path: String,
    pub content_hash: Hash,
}

// ============================================================================
// PIPELINE STEPS
// ============================================================================

/// One step of a `Pipeline` resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub name: String,
    pub agent_ref: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, AttributeValue)]) -> AttributeMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn canonical_hash_is_independent_of_insertion_order() {
        let a = attrs(&[
            ("content", AttributeValue::String("hello".into())),
            ("model", AttributeValue::String("claude".into())),
        ]);
        let b = attrs(&[
            ("model", AttributeValue::String("claude".into())),
            ("content", AttributeValue::String("hello".into())),
        ]);
        assert_eq!(hash_attributes(&a), hash_attributes(&b));
    }

    #[test]
    fn canonical_hash_changes_with_content() {
        let a = attrs(&[("content", AttributeValue::String("hello".into()))]);
        let b = attrs(&[("content", AttributeValue::String("hellp".into()))]);
        assert_ne!(hash_attributes(&a), hash_attributes(&b));
    }

    #[test]
    fn with_attribute_does_not_mutate_original() {
        let original = Resource::new(
            "acme",
            ResourceKind::Agent,
            "a",
            attrs(&[("model", AttributeValue::String("sonnet".into()))]),
        );
        let overridden = original.with_attribute("model", AttributeValue::String("haiku".into()));
        assert_eq!(
            original.attributes.get("model").unwrap().as_str(),
            Some("sonnet")
        );
        assert_eq!(
            overridden.attributes.get("model").unwrap().as_str(),
            Some("haiku")
        );
        assert_ne!(original.hash, overridden.hash);
    }

    #[test]
    fn action_glyphs_match_plan_output_contract() {
        assert_eq!(ActionType::Create.glyph(), "+");
        assert_eq!(ActionType::Update.glyph(), "~");
        assert_eq!(ActionType::Delete.glyph(), "-");
    }
}
