//! The state-file lock record. Acquiring the state file for apply/reconcile
//! writes a `.lock` sibling holding this record; a stale lock (older than the
//! configured timeout) can be broken by a later acquirer.

use crate::identity::Timestamp;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Who holds the state-file lock and since when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockRecord {
    pub holder_pid: u32,
    pub holder_hostname: String,
    pub acquired_at: Timestamp,
}

impl LockRecord {
    pub fn new(holder_pid: u32, holder_hostname: String, acquired_at: Timestamp) -> Self {
        Self {
            holder_pid,
            holder_hostname,
            acquired_at,
        }
    }

    /// A lock is stale once it has outlived `timeout`. The state backend
    /// additionally probes the pid when the hostname matches the local host,
    /// breaking the lock early if that process is gone.
    pub fn is_stale(&self, now: Timestamp, timeout: Duration) -> bool {
        match (now - self.acquired_at).to_std() {
            Ok(age) => age >= timeout,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn fresh_lock_is_not_stale() {
        let now = chrono::Utc::now();
        let record = LockRecord::new(123, "host-a".to_string(), now);
        assert!(!record.is_stale(now, Duration::from_secs(300)));
    }

    #[test]
    fn lock_older_than_timeout_is_stale() {
        let acquired = chrono::Utc::now() - ChronoDuration::seconds(600);
        let record = LockRecord::new(123, "host-a".to_string(), acquired);
        assert!(record.is_stale(chrono::Utc::now(), Duration::from_secs(300)));
    }
}
