//! `.agentspec.lock` read/write and validation.
//!
//! The lockfile pins every resolved import's content hash and version so a
//! later `plan`/`apply` run fails loudly on drift instead of silently
//! picking up a different package revision. Absence is not an error: a
//! first run simply has nothing to validate against.

use agentspec_core::{ImportKind, ResolutionError, ResolvedImport};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const LOCKFILE_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockfileEntry {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub version: Option<String>,
    pub hash: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lockfile {
    pub version: String,
    pub dependencies: Vec<LockfileEntry>,
}

impl Lockfile {
    pub fn from_resolved(resolved: &[ResolvedImport]) -> Self {
        let mut dependencies: Vec<LockfileEntry> = resolved
            .iter()
            .map(|r| LockfileEntry {
                source: r.source.clone(),
                version: r.version.clone(),
                hash: r.content_hash.as_str().to_string(),
                path: r.path.clone(),
            })
            .collect();
        dependencies.sort_by(|a, b| a.source.cmp(&b.source));
        Self {
            version: LOCKFILE_VERSION.to_string(),
            dependencies,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("Lockfile always serializes")
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Load from disk. Returns `Ok(None)` if the file does not exist — a
    /// missing lockfile is not a resolution failure.
    pub fn load(path: &Path) -> Result<Option<Self>, ResolutionError> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ResolutionError::ImportNotFound(path.display().to_string(), e.to_string()))?;
        Self::from_json(&text)
            .map(Some)
            .map_err(|e| ResolutionError::ImportNotFound(path.display().to_string(), e.to_string()))
    }

    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_json())
    }

    /// Verify a freshly resolved import against what the lockfile pinned
    /// for its source, if any. Package imports with a version mismatch or
    /// any import with a hash mismatch are fatal; unseen sources pass
    /// (they are new dependencies, added to the lockfile on next write).
    pub fn validate(&self, resolved: &ResolvedImport) -> Result<(), ResolutionError> {
        let Some(entry) = self.dependencies.iter().find(|e| e.source == resolved.source) else {
            return Ok(());
        };

        if resolved.kind == ImportKind::Package {
            if let (Some(expected), Some(actual)) = (&entry.version, &resolved.version) {
                if expected != actual {
                    return Err(ResolutionError::LockfileVersionMismatch {
                        origin: resolved.source.clone(),
                        expected: expected.clone(),
                        actual: actual.clone(),
                    });
                }
            }
        }

        let actual_hash = resolved.content_hash.as_str();
        if entry.hash != actual_hash {
            return Err(ResolutionError::LockfileHashMismatch {
                origin: resolved.source.clone(),
                expected: entry.hash.clone(),
                actual: actual_hash.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentspec_core::Hash;
    use tempfile::tempdir;

    fn import(source: &str, hash: &str) -> ResolvedImport {
        ResolvedImport {
            source: source.to_string(),
            kind: ImportKind::Package,
            alias: None,
            version: Some("1.0.0".to_string()),
            path: "/tmp/x.ias".to_string(),
            content_hash: Hash::from(hash.to_string()),
        }
    }

    #[test]
    fn round_trips_through_json() {
        let lockfile = Lockfile::from_resolved(&[import("acme/toolkit", "abc123")]);
        let json = lockfile.to_json();
        let parsed = Lockfile::from_json(&json).unwrap();
        assert_eq!(parsed.dependencies.len(), 1);
        assert_eq!(parsed.dependencies[0].source, "acme/toolkit");
    }

    #[test]
    fn entries_are_sorted_by_source() {
        let lockfile = Lockfile::from_resolved(&[import("z/pkg", "h1"), import("a/pkg", "h2")]);
        assert_eq!(lockfile.dependencies[0].source, "a/pkg");
        assert_eq!(lockfile.dependencies[1].source, "z/pkg");
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".agentspec.lock");
        assert!(Lockfile::load(&path).unwrap().is_none());
    }

    #[test]
    fn hash_mismatch_is_rejected() {
        let lockfile = Lockfile::from_resolved(&[import("acme/toolkit", "abc123")]);
        let drifted = import("acme/toolkit", "def456");
        let err = lockfile.validate(&drifted).unwrap_err();
        assert!(matches!(err, ResolutionError::LockfileHashMismatch { .. }));
    }

    #[test]
    fn unseen_source_passes_validation() {
        let lockfile = Lockfile::from_resolved(&[import("acme/toolkit", "abc123")]);
        let new_dep = import("acme/other", "zzz");
        assert!(lockfile.validate(&new_dep).is_ok());
    }

    #[test]
    fn write_then_load_round_trips_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".agentspec.lock");
        let lockfile = Lockfile::from_resolved(&[import("acme/toolkit", "abc123")]);
        lockfile.write(&path).unwrap();
        let loaded = Lockfile::load(&path).unwrap().unwrap();
        assert_eq!(loaded.dependencies[0].source, "acme/toolkit");
    }
}
