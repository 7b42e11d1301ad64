//! The on-disk state backend: atomic reads/writes of the state file, a
//! `.lock` sibling guarding concurrent `apply`/`reconcile` runs, and
//! `.bak`-backed recovery from a truncated or corrupted state file.

use agentspec_core::{Fqn, LockRecord, StateEntry, StateError};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The persisted shape of a state file: a flat list of entries, keyed by
/// FQN on load for O(1) diff lookups.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct StateFile {
    entries: Vec<StateEntry>,
}

/// File-backed state store. One instance per state file path; callers are
/// expected to hold the advisory lock for the duration of a plan/apply.
pub struct StateBackend {
    path: PathBuf,
}

impl StateBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn lock_path(&self) -> PathBuf {
        let mut p = self.path.clone();
        let name = format!(
            "{}.lock",
            p.file_name().and_then(|n| n.to_str()).unwrap_or("agentspec.state")
        );
        p.set_file_name(name);
        p
    }

    fn backup_path(&self) -> PathBuf {
        let mut p = self.path.clone();
        let name = format!(
            "{}.bak",
            p.file_name().and_then(|n| n.to_str()).unwrap_or("agentspec.state")
        );
        p.set_file_name(name);
        p
    }

    /// Read all state entries. A missing file is an empty state, not an
    /// error (first run). A corrupted primary file falls back to `.bak`;
    /// if that is also unreadable, returns `StateError::Corrupted`.
    pub fn load(&self) -> Result<HashMap<Fqn, StateEntry>, StateError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        match self.read_file(&self.path) {
            Ok(entries) => Ok(entries),
            Err(primary_err) => {
                if self.backup_path().exists() {
                    tracing::error!(
                        path = %self.path.display(),
                        error = %primary_err,
                        "state file corrupted, falling back to backup"
                    );
                    self.read_file(&self.backup_path()).map_err(|backup_err| {
                        tracing::error!(
                            path = %self.backup_path().display(),
                            error = %backup_err,
                            "backup state file is also unreadable"
                        );
                        StateError::Corrupted
                    })
                } else {
                    tracing::error!(
                        path = %self.path.display(),
                        error = %primary_err,
                        "state file corrupted and no backup exists"
                    );
                    Err(StateError::Corrupted)
                }
            }
        }
    }

    fn read_file(&self, path: &Path) -> Result<HashMap<Fqn, StateEntry>, StateError> {
        let text = fs::read_to_string(path)?;
        let file: StateFile = serde_json::from_str(&text).map_err(|e| StateError::Serde(e.to_string()))?;
        Ok(file.entries.into_iter().map(|e| (e.fqn.clone(), e)).collect())
    }

    /// Write `entries` atomically: serialize to a sibling temp file, fsync
    /// it, copy the previous primary file to `.bak` if one exists, then
    /// rename the temp file into place. A crash between any two steps
    /// leaves either the old or the new state intact, never a half-written
    /// file.
    pub fn save(&self, entries: &HashMap<Fqn, StateEntry>) -> Result<(), StateError> {
        let mut values: Vec<StateEntry> = entries.values().cloned().collect();
        values.sort_by(|a, b| a.fqn.as_str().cmp(b.fqn.as_str()));
        let file = StateFile { entries: values };
        let json = serde_json::to_string_pretty(&file).map_err(|e| StateError::Serde(e.to_string()))?;

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = fs::File::create(&tmp_path)?;
            tmp.write_all(json.as_bytes())?;
            tmp.sync_all()?;
        }

        if self.path.exists() {
            fs::copy(&self.path, self.backup_path())?;
        }

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Acquire the lock, breaking a stale one left by a crashed process:
    /// either older than `timeout`, or held by a pid that no longer exists.
    /// Returns `StateError::Locked` if a fresh lock held by a live process
    /// is already in place.
    pub fn acquire_lock(&self, holder_pid: u32, holder_hostname: &str, timeout: Duration) -> Result<(), StateError> {
        let lock_path = self.lock_path();
        if lock_path.exists() {
            if let Ok(text) = fs::read_to_string(&lock_path) {
                if let Ok(existing) = serde_json::from_str::<LockRecord>(&text) {
                    let now = chrono::Utc::now();
                    let aged_out = existing.is_stale(now, timeout);
                    let orphaned = local_hostname().as_deref() == Some(existing.holder_hostname.as_str())
                        && !pid_is_alive(existing.holder_pid);
                    if !aged_out && !orphaned {
                        return Err(StateError::Locked {
                            holder_pid: existing.holder_pid,
                            holder_hostname: existing.holder_hostname,
                            held_since: existing.acquired_at.to_rfc3339(),
                        });
                    }
                    tracing::warn!(
                        stale_pid = existing.holder_pid,
                        stale_age_secs = (now - existing.acquired_at).num_seconds(),
                        orphaned,
                        "breaking stale state-file lock"
                    );
                }
            }
        }

        let record = LockRecord::new(holder_pid, holder_hostname.to_string(), chrono::Utc::now());
        let json = serde_json::to_string(&record).map_err(|e| StateError::Serde(e.to_string()))?;
        fs::write(&lock_path, json)?;
        tracing::info!(holder_pid, holder_hostname, "acquired state-file lock");
        Ok(())
    }

    pub fn release_lock(&self) -> Result<(), StateError> {
        let lock_path = self.lock_path();
        if lock_path.exists() {
            fs::remove_file(lock_path)?;
        }
        tracing::info!("released state-file lock");
        Ok(())
    }
}

/// Probe whether `pid` is still a live process. Only `/proc` gives a
/// portable, dependency-free liveness check; outside Linux there's no such
/// probe available, so a lock there can only be broken by its age timeout.
#[cfg(target_os = "linux")]
fn pid_is_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
fn pid_is_alive(_pid: u32) -> bool {
    true
}

/// The local machine's hostname, read straight from the kernel rather than
/// pulling in a dependency for it. A pid is only meaningful to probe when
/// the lock's recorded hostname is this host; otherwise the pid namespace
/// isn't even the same.
#[cfg(target_os = "linux")]
fn local_hostname() -> Option<String> {
    fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .map(|s| s.trim().to_string())
}

#[cfg(not(target_os = "linux"))]
fn local_hostname() -> Option<String> {
    None
}

/// Append-only audit log of applied actions, independent of the mutable
/// state snapshot. An adapter or the apply engine calls `append` once per
/// completed action so `agentspec apply` output can be reconstructed from
/// disk even after the state file itself has moved on.
pub trait AppendLog: Send + Sync {
    fn append(&self, line: &str) -> Result<(), StateError>;
}

pub struct FileAppendLog {
    path: PathBuf,
}

impl FileAppendLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AppendLog for FileAppendLog {
    fn append(&self, line: &str) -> Result<(), StateError> {
        let mut file = fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}").map_err(StateError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentspec_core::{ApplyStatus, Hash, ResourceKind};
    use tempfile::tempdir;

    fn entry(name: &str) -> StateEntry {
        StateEntry {
            fqn: Fqn::new("acme", ResourceKind::Agent, name),
            hash: Hash::of(name.as_bytes()),
            status: ApplyStatus::Applied,
            last_applied: chrono::Utc::now(),
            adapter: "local-mcp".to_string(),
            error: None,
        }
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempdir().unwrap();
        let backend = StateBackend::new(dir.path().join("state.json"));
        assert!(backend.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let backend = StateBackend::new(dir.path().join("state.json"));
        let e = entry("bot");
        let mut entries = HashMap::new();
        entries.insert(e.fqn.clone(), e.clone());
        backend.save(&entries).unwrap();

        let loaded = backend.load().unwrap();
        assert_eq!(loaded.get(&e.fqn).unwrap().adapter, "local-mcp");
    }

    #[test]
    fn save_writes_backup_of_previous_version() {
        let dir = tempdir().unwrap();
        let backend = StateBackend::new(dir.path().join("state.json"));
        let e1 = entry("bot");
        let mut entries = HashMap::new();
        entries.insert(e1.fqn.clone(), e1);
        backend.save(&entries).unwrap();
        backend.save(&entries).unwrap();

        assert!(dir.path().join("state.json.bak").exists());
    }

    #[test]
    fn corrupted_primary_falls_back_to_backup() {
        let dir = tempdir().unwrap();
        let backend = StateBackend::new(dir.path().join("state.json"));
        let e = entry("bot");
        let mut entries = HashMap::new();
        entries.insert(e.fqn.clone(), e);
        backend.save(&entries).unwrap();
        backend.save(&entries).unwrap();

        fs::write(dir.path().join("state.json"), b"not json").unwrap();
        let loaded = backend.load().unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn lock_acquire_and_release_round_trips() {
        let dir = tempdir().unwrap();
        let backend = StateBackend::new(dir.path().join("state.json"));
        backend.acquire_lock(123, "host-a", Duration::from_secs(60)).unwrap();
        backend.release_lock().unwrap();
        backend.acquire_lock(456, "host-b", Duration::from_secs(60)).unwrap();
    }

    #[test]
    fn fresh_lock_blocks_second_acquirer() {
        let dir = tempdir().unwrap();
        let backend = StateBackend::new(dir.path().join("state.json"));
        backend.acquire_lock(123, "host-a", Duration::from_secs(60)).unwrap();
        let err = backend.acquire_lock(456, "host-b", Duration::from_secs(60)).unwrap_err();
        assert!(matches!(err, StateError::Locked { .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn fresh_lock_held_by_a_dead_pid_on_this_host_is_broken() {
        let dir = tempdir().unwrap();
        let backend = StateBackend::new(dir.path().join("state.json"));
        let this_host = local_hostname().unwrap();
        let dead_pid = 999_999_999u32;
        let record = LockRecord::new(dead_pid, this_host, chrono::Utc::now());
        fs::write(backend.lock_path(), serde_json::to_string(&record).unwrap()).unwrap();

        backend.acquire_lock(123, "host-a", Duration::from_secs(600)).unwrap();
    }

    #[test]
    fn pid_is_alive_reports_the_current_process_as_alive() {
        assert!(pid_is_alive(std::process::id()));
    }
}
