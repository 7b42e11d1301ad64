//! Rendering of a diff's action list as the `agentspec plan` output: plain
//! text for the terminal, structured JSON for scripting.

use crate::diff::resolve_binding;
use agentspec_core::{Action, ActionType, Binding};
use serde::Serialize;

/// One adapter binding reference, printed as the plan's trailing `Target:`
/// line when a deploy target is in scope.
#[derive(Debug, Clone)]
pub struct TargetInfo {
    pub adapter: String,
    pub binding_name: String,
}

impl TargetInfo {
    /// Resolve the binding that governs this plan/apply run via
    /// `resolve_binding`'s name/default/sole-binding rule. An empty binding
    /// set means no deploy target is in scope at all, which is not an
    /// error: the plan simply omits its trailing `Target:` line. An
    /// unresolvable ambiguity among a nonempty set (`ValidationError::
    /// NoBinding`) propagates so the caller can decide whether that's fatal
    /// for the run at hand.
    pub fn resolve(
        bindings: &[Binding],
        target_name: Option<&str>,
    ) -> Result<Option<Self>, agentspec_core::ValidationError> {
        if bindings.is_empty() {
            return Ok(None);
        }
        let binding = resolve_binding(bindings, target_name)?;
        Ok(Some(Self {
            adapter: binding.adapter.clone(),
            binding_name: binding.name.clone(),
        }))
    }
}

#[derive(Debug, Serialize)]
struct PlanActionJson<'a> {
    fqn: &'a str,
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct PlanJson<'a> {
    has_changes: bool,
    actions: Vec<PlanActionJson<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
}

fn action_label(action_type: ActionType) -> &'static str {
    match action_type {
        ActionType::Create => "create",
        ActionType::Update => "update",
        ActionType::Delete => "delete",
        ActionType::Noop => "noop",
    }
}

fn has_changes(actions: &[Action]) -> bool {
    actions.iter().any(|a| a.action_type != ActionType::Noop)
}

/// Render the plan's human-readable text form.
pub fn render_text(actions: &[Action], target: Option<&TargetInfo>) -> String {
    if !has_changes(actions) {
        return "No changes. Infrastructure is up-to-date.".to_string();
    }

    let creates = actions.iter().filter(|a| a.action_type == ActionType::Create).count();
    let updates = actions.iter().filter(|a| a.action_type == ActionType::Update).count();
    let deletes = actions.iter().filter(|a| a.action_type == ActionType::Delete).count();

    let mut out = format!("Plan: {creates} to create, {updates} to update, {deletes} to delete");
    for action in actions {
        if action.action_type == ActionType::Noop {
            continue;
        }
        out.push('\n');
        out.push_str(&format!("  {} {}", action.action_type.glyph(), action.fqn));
    }
    if let Some(target) = target {
        out.push('\n');
        out.push_str(&format!("Target: {} (binding \"{}\")", target.adapter, target.binding_name));
    }
    out
}

/// Render the plan's structured JSON form.
pub fn render_json(actions: &[Action], target: Option<&TargetInfo>) -> String {
    let json_actions: Vec<PlanActionJson> = actions
        .iter()
        .filter(|a| a.action_type != ActionType::Noop)
        .map(|a| PlanActionJson {
            fqn: a.fqn.as_str(),
            action: action_label(a.action_type),
            reason: a.reason.as_deref(),
        })
        .collect();

    let plan = PlanJson {
        has_changes: has_changes(actions),
        target: target.map(|t| format!("{} ({})", t.adapter, t.binding_name)),
        actions: json_actions,
    };
    serde_json::to_string(&plan).expect("plan always serializes")
}

/// The exit code for `agentspec plan`: `0` no changes, `2` changes
/// detected. Errors are a caller concern, not represented here.
pub fn exit_code(actions: &[Action]) -> i32 {
    if has_changes(actions) {
        2
    } else {
        0
    }
}
