//! Lowers a parsed `File` AST into canonical, content-hashed `Resource`s.
//!
//! Mirrors the teacher's validate-then-build pipeline shape: a sequence of
//! `validate_*` passes runs before any `build_*` lowering pass, so structural
//! errors (duplicate FQNs, dangling references) are reported before any
//! `Resource` is built.

use agentspec_core::{
    AttributeMap, AttributeValue, Binding, Document, Fqn, PackageMetadata, PipelineStep,
    Resource, ResourceKind, ValidationError,
};
use std::collections::{BTreeMap, HashSet};

use crate::parser::ast::{self, BlockKind, Value};

/// Deploy-target kind names map to a fixed adapter name. `process` always
/// collapses to `local-mcp`; anything outside the closed set falls through
/// to its own literal name.
pub fn deploy_target_adapter_name(target_type: &str) -> String {
    match target_type {
        "process" => "local-mcp".to_string(),
        "docker-compose" => "docker-compose".to_string(),
        "docker" => "docker".to_string(),
        "kubernetes" => "kubernetes".to_string(),
        other => other.to_string(),
    }
}

/// Lower a single parsed file into a `Document`. Imported files are expected
/// to have already been merged into `files` by the caller (the import
/// resolver owns load order).
pub fn lower(files: &[ast::File]) -> Result<Document, ValidationError> {
    let package = files.first().map(|f| PackageMetadata {
        name: f.package.name.clone(),
        version: f.package.version.clone(),
        lang: f.package.lang.clone(),
    });
    let package_name = package.as_ref().map(|p| p.name.as_str()).unwrap_or("");

    validate_no_duplicate_fqns(files, package_name)?;

    let mut resources = Vec::new();
    let mut deploy_targets = Vec::new();
    let mut bindings = Vec::new();

    for file in files {
        for block in &file.resources {
            let attributes = build_attribute_map(&block.attributes);
            let resource = Resource::new(
                package_name,
                block.kind.as_resource_kind(),
                &block.name,
                attributes,
            );
            if block.kind == BlockKind::DeployTarget {
                let adapter = resource
                    .attributes
                    .get("type")
                    .and_then(|v| v.as_str())
                    .map(deploy_target_adapter_name)
                    .unwrap_or_else(|| "local-mcp".to_string());
                let default = resource
                    .attributes
                    .get("default")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                bindings.push(Binding {
                    name: block.name.clone(),
                    adapter,
                    default,
                });
                deploy_targets.push(resource);
            } else {
                resources.push(resource);
            }
        }
    }

    validate_references(&resources, package_name)?;

    Ok(Document {
        package,
        resources,
        deploy_targets,
        bindings,
    })
}

fn validate_no_duplicate_fqns(files: &[ast::File], package_name: &str) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for file in files {
        for block in &file.resources {
            let fqn = Fqn::new(package_name, block.kind.as_resource_kind(), &block.name);
            if !seen.insert(fqn.clone()) {
                return Err(ValidationError::DuplicateFqn(fqn.to_string()));
            }
        }
    }
    Ok(())
}

/// `uses`/`connects`/`exposes`/`delegate` attributes carry a bare
/// `"<Kind>/<name>"` string; verify every one names a resource that exists
/// in this document.
fn validate_references(resources: &[Resource], package_name: &str) -> Result<(), ValidationError> {
    let known: HashSet<&Fqn> = resources.iter().map(|r| &r.fqn).collect();
    for resource in resources {
        for key in ["uses", "connects", "exposes", "delegate"] {
            if let Some(AttributeValue::String(reference)) = resource.attributes.get(key) {
                if let Some((kind_str, name)) = reference.split_once('/') {
                    if let Ok(kind) = kind_str.parse::<ResourceKind>() {
                        let target = Fqn::new(package_name, kind, name);
                        if !known.contains(&target) {
                            return Err(ValidationError::UnknownReference {
                                fqn: resource.fqn.clone(),
                                reference: reference.clone(),
                            });
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Fold a flat attribute list into a canonical `AttributeMap`. Attribute
/// names that repeat (e.g. a pipeline's `step` blocks) collect into a
/// `Sequence` in declaration order; names that appear once keep their bare
/// value.
fn build_attribute_map(attrs: &[ast::Attribute]) -> AttributeMap {
    let mut grouped: BTreeMap<String, Vec<AttributeValue>> = BTreeMap::new();
    for attr in attrs {
        grouped
            .entry(attr.name.clone())
            .or_default()
            .push(value_to_attribute(&attr.value));
    }

    grouped
        .into_iter()
        .map(|(name, mut values)| {
            if values.len() == 1 {
                (name, values.pop().unwrap())
            } else {
                (name, AttributeValue::Sequence(values))
            }
        })
        .collect()
}

fn value_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Str(s) => AttributeValue::String(s.clone()),
        Value::Num(n) => AttributeValue::Number(*n),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::List(items) => AttributeValue::Sequence(items.iter().map(value_to_attribute).collect()),
        Value::Block(attrs) => AttributeValue::Mapping(build_attribute_map(attrs)),
        Value::NamedBlock(label, attrs) => {
            let mut map = build_attribute_map(attrs);
            map.insert("name".to_string(), AttributeValue::String(label.clone()));
            AttributeValue::Mapping(map)
        }
    }
}

/// Extract the ordered `step` blocks of a `Pipeline` resource into typed
/// `PipelineStep`s, for the pipeline executor to consume directly instead of
/// re-walking the generic attribute tree.
pub fn pipeline_steps(resource: &Resource) -> Vec<PipelineStep> {
    let Some(steps_value) = resource.attributes.get("step") else {
        return Vec::new();
    };
    let entries: Vec<&AttributeMap> = match steps_value {
        AttributeValue::Mapping(m) => vec![m],
        AttributeValue::Sequence(seq) => seq
            .iter()
            .filter_map(|v| match v {
                AttributeValue::Mapping(m) => Some(m),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(i, attrs)| {
            let name = attrs
                .get("name")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("step-{i}"));
            let agent_ref = attrs
                .get("uses")
                .or_else(|| attrs.get("delegate"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_default();
            let input = attrs.get("input").and_then(|v| v.as_str()).map(str::to_string);
            let output = attrs.get("output").and_then(|v| v.as_str()).map(str::to_string);
            let depends_on = match attrs.get("depends_on") {
                Some(AttributeValue::Sequence(seq)) => seq
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
                Some(AttributeValue::String(s)) => vec![s.clone()],
                _ => Vec::new(),
            };
            PipelineStep {
                name,
                agent_ref,
                input,
                output,
                depends_on,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn lower_source(source: &str) -> Document {
        let tokens = Lexer::new(source).tokenize();
        let (file, errors) = Parser::new(tokens, "test.ias").parse();
        assert!(errors.is_empty(), "{:?}", errors);
        lower(&[file]).unwrap()
    }

    #[test]
    fn lowers_prompt_and_agent_with_matching_reference() {
        let doc = lower_source(
            r#"
            package "acme" version "1.0.0"
            prompt "p" { content "hi" }
            agent "a" { uses prompt "p" }
            "#,
        );
        assert_eq!(doc.resources.len(), 2);
        let agent = doc.find(&Fqn::new("acme", ResourceKind::Agent, "a")).unwrap();
        assert_eq!(agent.attributes.get("uses").unwrap().as_str(), Some("Prompt/p"));
    }

    #[test]
    fn dangling_reference_is_rejected() {
        let tokens = Lexer::new(
            r#"
            package "acme" version "1.0.0"
            agent "a" { uses prompt "missing" }
            "#,
        )
        .tokenize();
        let (file, errors) = Parser::new(tokens, "test.ias").parse();
        assert!(errors.is_empty());
        let err = lower(&[file]).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownReference { .. }));
    }

    #[test]
    fn duplicate_fqn_across_files_is_rejected() {
        let tokens_a = Lexer::new(r#"package "acme" version "1.0.0" prompt "p" { content "a" }"#).tokenize();
        let (file_a, _) = Parser::new(tokens_a, "a.ias").parse();
        let tokens_b = Lexer::new(r#"package "acme" version "1.0.0" prompt "p" { content "b" }"#).tokenize();
        let (file_b, _) = Parser::new(tokens_b, "b.ias").parse();
        let err = lower(&[file_a, file_b]).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateFqn(_)));
    }

    #[test]
    fn deploy_target_process_collapses_to_local_mcp() {
        assert_eq!(deploy_target_adapter_name("process"), "local-mcp");
        assert_eq!(deploy_target_adapter_name("kubernetes"), "kubernetes");
        assert_eq!(deploy_target_adapter_name("custom-cloud"), "custom-cloud");
    }

    #[test]
    fn pipeline_steps_collect_in_declaration_order() {
        let doc = lower_source(
            r#"
            package "acme" version "1.0.0"
            pipeline "p" {
                step "one" { }
                step "two" { depends_on ["one"] }
            }
            "#,
        );
        let pipeline = doc.find(&Fqn::new("acme", ResourceKind::Pipeline, "p")).unwrap();
        let steps = pipeline_steps(pipeline);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].name, "one");
        assert_eq!(steps[1].depends_on, vec!["one".to_string()]);
    }
}
