//! Desired-state diff engine.
//!
//! Compares a lowered `Document` against persisted `StateEntry` records and
//! classifies every resource as a create, update, delete, or no-op, in
//! FQN-sorted order so the plan is stable run over run.

use agentspec_core::{Action, ActionType, ApplyStatus, Binding, Document, Fqn, Resource, StateEntry, ValidationError};
use std::collections::HashMap;

/// Compute the set of actions needed to bring `state` to `desired`.
///
/// Resources present in `desired` but absent from `state` are creates;
/// present in both with a differing content hash are updates (reason:
/// resource hash changed); present in both with a matching hash but a
/// `Failed` last-apply status are also updates, so a failed resource is
/// retried rather than silently skipped (reason: retry failed); present in
/// both with a matching hash and `Applied` status are no-ops; present in
/// `state` but absent from `desired` are deletes.
pub fn diff(desired: &Document, state: &HashMap<Fqn, StateEntry>) -> Vec<Action> {
    let mut actions = Vec::with_capacity(desired.resources.len() + state.len());
    let desired_by_fqn: HashMap<&Fqn, &Resource> =
        desired.resources.iter().map(|r| (&r.fqn, r)).collect();

    for resource in &desired.resources {
        let (action_type, reason) = match state.get(&resource.fqn) {
            None => (ActionType::Create, None),
            Some(entry) if entry.hash != resource.hash => {
                (ActionType::Update, Some("resource hash changed".to_string()))
            }
            Some(entry) if entry.status == ApplyStatus::Failed => {
                (ActionType::Update, Some("retry failed".to_string()))
            }
            Some(_) => (ActionType::Noop, None),
        };
        actions.push(Action {
            fqn: resource.fqn.clone(),
            action_type,
            resource: Some(resource.clone()),
            reason,
        });
    }

    for fqn in state.keys() {
        if !desired_by_fqn.contains_key(fqn) {
            actions.push(Action {
                fqn: fqn.clone(),
                action_type: ActionType::Delete,
                resource: None,
                reason: None,
            });
        }
    }

    actions.sort_by(|a, b| a.fqn.as_str().cmp(b.fqn.as_str()));
    actions
}

/// Actions that actually change something (excludes no-ops), in the order
/// the apply engine should execute them: creates and updates before
/// deletes, so a renamed resource never races a stale delete of the same
/// underlying adapter target.
pub fn pending_actions(actions: &[Action]) -> Vec<Action> {
    let mut creates_updates: Vec<Action> = actions
        .iter()
        .filter(|a| matches!(a.action_type, ActionType::Create | ActionType::Update))
        .cloned()
        .collect();
    let deletes: Vec<Action> = actions
        .iter()
        .filter(|a| a.action_type == ActionType::Delete)
        .cloned()
        .collect();
    creates_updates.extend(deletes);
    creates_updates
}

/// Resolve which binding governs a plan/apply run: if `target_name` matches
/// a binding by name, that binding wins outright; else the binding marked
/// `default = true`; else, if exactly one binding is declared, that one;
/// else `ValidationError::NoBinding`.
pub fn resolve_binding<'a>(bindings: &'a [Binding], target_name: Option<&str>) -> Result<&'a Binding, ValidationError> {
    if let Some(name) = target_name {
        if let Some(binding) = bindings.iter().find(|b| b.name == name) {
            return Ok(binding);
        }
    }
    if let Some(default) = bindings.iter().find(|b| b.default) {
        return Ok(default);
    }
    if let [only] = bindings {
        return Ok(only);
    }
    Err(ValidationError::NoBinding)
}

/// The same resolution rule applied to deploy-target resources instead of
/// bindings: matched by resource name, defaulted by a truthy `default`
/// attribute, falling back to the sole target when there's only one.
pub fn resolve_deploy_target<'a>(
    deploy_targets: &'a [Resource],
    target_name: Option<&str>,
) -> Result<&'a Resource, ValidationError> {
    if let Some(name) = target_name {
        if let Some(target) = deploy_targets.iter().find(|r| r.name == name) {
            return Ok(target);
        }
    }
    if let Some(default) = deploy_targets
        .iter()
        .find(|r| r.attributes.get("default").and_then(|v| v.as_bool()).unwrap_or(false))
    {
        return Ok(default);
    }
    if let [only] = deploy_targets {
        return Ok(only);
    }
    Err(ValidationError::NoBinding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentspec_core::{ApplyStatus, Resource, ResourceKind};
    use std::collections::BTreeMap;

    fn resource(name: &str) -> Resource {
        Resource::new("acme", ResourceKind::Agent, name, BTreeMap::new())
    }

    fn state_entry(resource: &Resource) -> StateEntry {
        StateEntry {
            fqn: resource.fqn.clone(),
            hash: resource.hash.clone(),
            status: ApplyStatus::Applied,
            last_applied: chrono::Utc::now(),
            adapter: "local-mcp".to_string(),
            error: None,
        }
    }

    #[test]
    fn new_resource_is_a_create() {
        let doc = Document {
            resources: vec![resource("a")],
            ..Default::default()
        };
        let actions = diff(&doc, &HashMap::new());
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, ActionType::Create);
    }

    #[test]
    fn unchanged_hash_is_a_noop() {
        let r = resource("a");
        let mut state = HashMap::new();
        state.insert(r.fqn.clone(), state_entry(&r));
        let doc = Document {
            resources: vec![r],
            ..Default::default()
        };
        let actions = diff(&doc, &state);
        assert_eq!(actions[0].action_type, ActionType::Noop);
    }

    #[test]
    fn changed_hash_is_an_update_with_reason() {
        let mut r = resource("a");
        let mut state = HashMap::new();
        state.insert(r.fqn.clone(), state_entry(&r));
        r = r.with_attribute("model", agentspec_core::AttributeValue::String("sonnet".into()));
        let doc = Document {
            resources: vec![r],
            ..Default::default()
        };
        let actions = diff(&doc, &state);
        assert_eq!(actions[0].action_type, ActionType::Update);
        assert_eq!(actions[0].reason.as_deref(), Some("resource hash changed"));
    }

    #[test]
    fn unchanged_hash_with_failed_status_is_retried_as_an_update() {
        let r = resource("a");
        let mut entry = state_entry(&r);
        entry.status = ApplyStatus::Failed;
        let mut state = HashMap::new();
        state.insert(r.fqn.clone(), entry);
        let doc = Document {
            resources: vec![r],
            ..Default::default()
        };
        let actions = diff(&doc, &state);
        assert_eq!(actions[0].action_type, ActionType::Update);
        assert_eq!(actions[0].reason.as_deref(), Some("retry failed"));
    }

    #[test]
    fn resource_missing_from_desired_is_a_delete() {
        let r = resource("a");
        let mut state = HashMap::new();
        state.insert(r.fqn.clone(), state_entry(&r));
        let doc = Document::default();
        let actions = diff(&doc, &state);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, ActionType::Delete);
    }

    #[test]
    fn actions_are_sorted_by_fqn() {
        let doc = Document {
            resources: vec![resource("z"), resource("a")],
            ..Default::default()
        };
        let actions = diff(&doc, &HashMap::new());
        assert!(actions[0].fqn.as_str() < actions[1].fqn.as_str());
    }

    #[test]
    fn pending_actions_orders_deletes_last() {
        let r = resource("gone");
        let mut state = HashMap::new();
        state.insert(r.fqn.clone(), state_entry(&r));
        let doc = Document {
            resources: vec![resource("new")],
            ..Default::default()
        };
        let actions = diff(&doc, &state);
        let pending = pending_actions(&actions);
        assert_eq!(pending.last().unwrap().action_type, ActionType::Delete);
    }

    fn binding(name: &str, default: bool) -> Binding {
        Binding {
            name: name.to_string(),
            adapter: "local-mcp".to_string(),
            default,
        }
    }

    #[test]
    fn resolve_binding_prefers_a_matching_name_over_default() {
        let bindings = vec![binding("staging", false), binding("prod", true)];
        let resolved = resolve_binding(&bindings, Some("staging")).unwrap();
        assert_eq!(resolved.name, "staging");
    }

    #[test]
    fn resolve_binding_falls_back_to_default() {
        let bindings = vec![binding("staging", false), binding("prod", true)];
        let resolved = resolve_binding(&bindings, None).unwrap();
        assert_eq!(resolved.name, "prod");
    }

    #[test]
    fn resolve_binding_falls_back_to_sole_binding() {
        let bindings = vec![binding("only", false)];
        let resolved = resolve_binding(&bindings, None).unwrap();
        assert_eq!(resolved.name, "only");
    }

    #[test]
    fn resolve_binding_is_ambiguous_with_no_name_no_default_multiple_bindings() {
        let bindings = vec![binding("a", false), binding("b", false)];
        let err = resolve_binding(&bindings, None).unwrap_err();
        assert!(matches!(err, ValidationError::NoBinding));
    }

    #[test]
    fn resolve_deploy_target_follows_the_same_rule() {
        let mut a = resource("a");
        a.attributes.insert("default".to_string(), agentspec_core::AttributeValue::Bool(true));
        let b = resource("b");
        let targets = vec![a, b];
        let resolved = resolve_deploy_target(&targets, None).unwrap();
        assert_eq!(resolved.name, "a");
    }
}
