//! Environment overlay application.
//!
//! An `Environment` resource carries `override` blocks keyed by the target
//! resource's FQN suffix (`Kind/name`), each a block of attribute
//! replacements. Applying an overlay never mutates the input `Document`: it
//! clones, patches the clone, and drops every `Environment` resource from
//! the output, since overlays are a build-time concern and have no adapter.

use agentspec_core::{AttributeValue, Document, Fqn, Resource, ResourceKind, ValidationError};

/// Apply the named environment's overrides to `document`, returning a new
/// `Document` with `Environment` resources stripped out.
pub fn apply_environment(
    document: &Document,
    package: &str,
    environment_name: &str,
) -> Result<Document, ValidationError> {
    let env_fqn = Fqn::new(package, ResourceKind::Environment, environment_name);
    let environment = document
        .find(&env_fqn)
        .ok_or_else(|| ValidationError::OverlayTargetMissing(environment_name.to_string()))?;

    let overrides = match environment.attributes.get("override") {
        Some(AttributeValue::Mapping(m)) => vec![m.clone()],
        Some(AttributeValue::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| match v {
                AttributeValue::Mapping(m) => Some(m.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let mut resources: Vec<Resource> = document
        .resources
        .iter()
        .filter(|r| r.kind != ResourceKind::Environment)
        .cloned()
        .collect();

    for block in &overrides {
        let Some(target) = block.get("target").and_then(|v| v.as_str()) else {
            continue;
        };
        let Some((kind_str, name)) = target.split_once('/') else {
            continue;
        };
        let Ok(kind) = kind_str.parse::<ResourceKind>() else {
            continue;
        };
        let target_fqn = Fqn::new(package, kind, name);
        let position = resources
            .iter()
            .position(|r| r.fqn == target_fqn)
            .ok_or_else(|| ValidationError::OverlayTargetMissing(target.to_string()))?;

        let mut patched = resources[position].clone();
        for (key, value) in block {
            if key == "target" {
                continue;
            }
            patched = patched.with_attribute(key, value.clone());
        }
        resources[position] = patched;
    }

    Ok(Document {
        package: document.package.clone(),
        resources,
        deploy_targets: document.deploy_targets.clone(),
        bindings: document.bindings.clone(),
    })
}
