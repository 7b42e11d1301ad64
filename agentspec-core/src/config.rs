//! Ambient configuration shared by the state backend, adapters, and
//! resolver. Loaded from TOML with `serde(default)` so a bare `{}` document
//! still produces a usable configuration.

use crate::error::{AgentSpecError, ResolutionError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_lock_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_health_check_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_health_check_deadline() -> Duration {
    Duration::from_secs(30)
}

fn default_search_paths() -> Vec<String> {
    Vec::new()
}

/// Master configuration for the resolver, state backend, and adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How long a state-file lock can be held before it is considered stale
    /// and forcibly broken.
    #[serde(with = "duration_secs")]
    pub lock_timeout: Duration,
    /// Interval between health-check polls for the local-process adapter.
    #[serde(with = "duration_secs")]
    pub health_check_interval: Duration,
    /// Overall deadline for a local-process adapter to become healthy.
    #[serde(with = "duration_secs")]
    pub health_check_deadline: Duration,
    /// Additional search paths consulted when resolving package imports,
    /// after the pluggable registry resolver.
    pub import_search_paths: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_timeout: default_lock_timeout(),
            health_check_interval: default_health_check_interval(),
            health_check_deadline: default_health_check_deadline(),
            import_search_paths: default_search_paths(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML string, falling back to defaults for
    /// any field left unspecified.
    pub fn from_toml(source: &str) -> Result<Self, AgentSpecError> {
        toml::from_str(source).map_err(|e| {
            AgentSpecError::Resolution(ResolutionError::ImportNotFound(
                "<config>".to_string(),
                e.to_string(),
            ))
        })
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_timeouts() {
        let config = Config::default();
        assert_eq!(config.lock_timeout, Duration::from_secs(300));
        assert_eq!(config.health_check_deadline, Duration::from_secs(30));
    }

    #[test]
    fn partial_toml_fills_remaining_fields_from_defaults() {
        let config = Config::from_toml("lock_timeout = 60\n").unwrap();
        assert_eq!(config.lock_timeout, Duration::from_secs(60));
        assert_eq!(
            config.health_check_deadline,
            Config::default().health_check_deadline
        );
    }
}
