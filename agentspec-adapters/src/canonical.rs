//! Deterministic JSON export shared by every adapter whose `export`
//! operation writes manifests to disk. `serde_json::Value`'s object map is
//! a `BTreeMap` in this workspace (the `preserve_order` feature is never
//! enabled), so keys are already sorted; this just adds the trailing
//! newline golden-file tests expect and owns the write.

use agentspec_core::AdapterError;
use std::path::Path;

pub fn write_canonical_json(
    adapter: &str,
    path: &Path,
    value: &serde_json::Value,
) -> Result<(), AdapterError> {
    let mut rendered = serde_json::to_string_pretty(value).map_err(|e| AdapterError::ValidationFailed {
        adapter: adapter.to_string(),
        reason: format!("failed to render {}: {e}", path.display()),
    })?;
    rendered.push('\n');
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AdapterError::Io {
            adapter: adapter.to_string(),
            source: std::sync::Arc::new(e),
        })?;
    }
    std::fs::write(path, rendered).map_err(|e| AdapterError::Io {
        adapter: adapter.to_string(),
        source: std::sync::Arc::new(e),
    })
}
