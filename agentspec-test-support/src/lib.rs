//! AgentSpec Test Utilities
//!
//! Centralized test infrastructure shared across the workspace:
//! - Proptest generators for core entity types
//! - Fixture builders for common resources, documents, and plans
//! - Custom assertions for AgentSpec-specific invariants

pub use agentspec_core::{
    Action, ActionType, AdapterError, AgentSpecError, ApplyResult, AttributeMap, AttributeValue,
    Binding, Document, Fqn, Hash, PackageMetadata, PipelineStep, Resource, ResourceKind,
    ResultStatus, StateEntry,
};

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating AgentSpec entity types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a DNS-label-shaped identifier: lowercase letters, digits,
    /// and hyphens, never starting or ending with a hyphen.
    pub fn arb_identifier() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,15}[a-z0-9]".prop_map(|s| s.to_string())
    }

    pub fn arb_resource_kind() -> impl Strategy<Value = ResourceKind> {
        prop_oneof![
            Just(ResourceKind::Prompt),
            Just(ResourceKind::Skill),
            Just(ResourceKind::Agent),
            Just(ResourceKind::Server),
            Just(ResourceKind::Client),
            Just(ResourceKind::Secret),
            Just(ResourceKind::Environment),
            Just(ResourceKind::Policy),
            Just(ResourceKind::Plugin),
            Just(ResourceKind::Type),
            Just(ResourceKind::Pipeline),
        ]
    }

    pub fn arb_attribute_value() -> impl Strategy<Value = AttributeValue> {
        let leaf = prop_oneof![
            ".{0,24}".prop_map(AttributeValue::String),
            any::<f64>().prop_filter("finite", |n| n.is_finite()).prop_map(AttributeValue::Number),
            any::<bool>().prop_map(AttributeValue::Bool),
        ];
        leaf.prop_recursive(2, 8, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(AttributeValue::Sequence),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..4).prop_map(AttributeValue::Mapping),
            ]
        })
    }

    pub fn arb_attribute_map() -> impl Strategy<Value = AttributeMap> {
        prop::collection::btree_map(arb_identifier(), arb_attribute_value(), 0..5)
    }

    /// Generate a fully-formed `Resource` in package `acme`.
    pub fn arb_resource() -> impl Strategy<Value = Resource> {
        (arb_resource_kind(), arb_identifier(), arb_attribute_map())
            .prop_map(|(kind, name, attrs)| Resource::new("acme", kind, &name, attrs))
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use std::collections::BTreeMap;

    /// A small, fluent helper for building `Resource`s in tests without
    /// spelling out a `BTreeMap` literal at every call site.
    pub struct ResourceBuilder {
        package: String,
        kind: ResourceKind,
        name: String,
        attributes: AttributeMap,
    }

    impl ResourceBuilder {
        pub fn new(kind: ResourceKind, name: &str) -> Self {
            Self {
                package: "acme".to_string(),
                kind,
                name: name.to_string(),
                attributes: BTreeMap::new(),
            }
        }

        pub fn package(mut self, package: &str) -> Self {
            self.package = package.to_string();
            self
        }

        pub fn attr(mut self, key: &str, value: AttributeValue) -> Self {
            self.attributes.insert(key.to_string(), value);
            self
        }

        pub fn str_attr(self, key: &str, value: &str) -> Self {
            self.attr(key, AttributeValue::String(value.to_string()))
        }

        pub fn num_attr(self, key: &str, value: f64) -> Self {
            self.attr(key, AttributeValue::Number(value))
        }

        pub fn build(self) -> Resource {
            Resource::new(&self.package, self.kind, &self.name, self.attributes)
        }
    }

    /// A minimal `Prompt` resource with a `content` attribute.
    pub fn prompt_resource(name: &str, content: &str) -> Resource {
        ResourceBuilder::new(ResourceKind::Prompt, name).str_attr("content", content).build()
    }

    /// An `Agent` resource referencing `prompt_ref` via `uses`.
    pub fn agent_resource(name: &str, model: &str, prompt_ref: &str) -> Resource {
        ResourceBuilder::new(ResourceKind::Agent, name)
            .str_attr("model", model)
            .str_attr("uses", prompt_ref)
            .build()
    }

    /// A `Document` with one prompt and one agent referencing it, ready to
    /// pass through IR validation, overlays, or diffing.
    pub fn fixture_document() -> Document {
        let prompt = prompt_resource("greeting", "You are a helpful assistant.");
        let agent = agent_resource("support-bot", "claude-sonnet-4-20250514", "Prompt/greeting");
        Document {
            package: Some(PackageMetadata {
                name: "acme".to_string(),
                version: "0.1.0".to_string(),
                lang: None,
            }),
            resources: vec![prompt, agent],
            deploy_targets: vec![],
            bindings: vec![],
        }
    }

    /// A `StateEntry` recording a successful apply of `resource`.
    pub fn applied_state_entry(resource: &Resource, adapter: &str) -> StateEntry {
        StateEntry {
            fqn: resource.fqn.clone(),
            hash: resource.hash.clone(),
            status: agentspec_core::ApplyStatus::Applied,
            last_applied: chrono::Utc::now(),
            adapter: adapter.to_string(),
            error: None,
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertions for AgentSpec-specific invariants.

    use super::*;

    /// Asserts `actions` is sorted by FQN, the ordering the diff engine and
    /// plan renderer both rely on.
    pub fn assert_sorted_by_fqn(actions: &[Action]) {
        let fqns: Vec<&str> = actions.iter().map(|a| a.fqn.as_str()).collect();
        let mut sorted = fqns.clone();
        sorted.sort();
        assert_eq!(fqns, sorted, "actions are not sorted by FQN");
    }

    /// Asserts every action in `actions` carries the given `action_type`.
    pub fn assert_all_action_type(actions: &[Action], action_type: ActionType) {
        for action in actions {
            assert_eq!(
                action.action_type, action_type,
                "expected {:?} for {}, found {:?}",
                action_type, action.fqn, action.action_type
            );
        }
    }

    /// Asserts `document` contains no resource of kind `Environment`, the
    /// contract an overlay's output must satisfy.
    pub fn assert_no_environment_resources(document: &Document) {
        assert!(
            document.resources.iter().all(|r| r.kind != ResourceKind::Environment),
            "overlay output must not carry Environment resources"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fixture_document_has_no_dangling_reference() {
        let document = fixtures::fixture_document();
        assert_eq!(document.resources.len(), 2);
        let agent = document.resources.iter().find(|r| r.kind == ResourceKind::Agent).unwrap();
        let target = agent.attributes.get("uses").and_then(|v| v.as_str()).unwrap();
        let fqn = Fqn::new("acme", ResourceKind::Prompt, "greeting");
        assert_eq!(target, "Prompt/greeting");
        assert!(document.find(&fqn).is_some());
    }

    #[test]
    fn resource_builder_produces_a_stable_hash_for_equal_attributes() {
        let a = fixtures::ResourceBuilder::new(ResourceKind::Agent, "bot").str_attr("model", "x").build();
        let b = fixtures::ResourceBuilder::new(ResourceKind::Agent, "bot").str_attr("model", "x").build();
        assert_eq!(a.hash, b.hash);
    }

    proptest! {
        #[test]
        fn arb_resource_always_has_a_well_formed_fqn(resource in generators::arb_resource()) {
            let parts = resource.fqn.parts();
            prop_assert!(parts.is_ok());
        }
    }
}
