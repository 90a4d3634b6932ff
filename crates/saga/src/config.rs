//! Saga tuning loaded from environment variables.

use std::time::Duration;

const DEFAULT_STATUS_WAIT_TIMEOUT_MS: u64 = 1000;
const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Saga configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `SAGA_STATUS_WAIT_TIMEOUT_MS` — upper bound on waiting for a status commit (default: `1000`)
/// - `SAGA_MAX_CONFLICT_RETRIES` — re-runs of a read-evaluate-write cycle after a version conflict (default: `3`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaConfig {
    pub status_wait_timeout: Duration,
    pub max_conflict_retries: u32,
}

impl SagaConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let status_wait_timeout_ms = lookup("SAGA_STATUS_WAIT_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_STATUS_WAIT_TIMEOUT_MS);
        let max_conflict_retries = lookup("SAGA_MAX_CONFLICT_RETRIES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_CONFLICT_RETRIES);

        Self {
            status_wait_timeout: Duration::from_millis(status_wait_timeout_ms),
            max_conflict_retries,
        }
    }

    /// Sets the status wait timeout.
    pub fn with_status_wait_timeout(mut self, timeout: Duration) -> Self {
        self.status_wait_timeout = timeout;
        self
    }
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            status_wait_timeout: Duration::from_millis(DEFAULT_STATUS_WAIT_TIMEOUT_MS),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_values() {
        let config = SagaConfig::default();
        assert_eq!(config.status_wait_timeout, Duration::from_secs(1));
        assert_eq!(config.max_conflict_retries, 3);
    }

    #[test]
    fn test_lookup_overrides() {
        let vars = HashMap::from([
            ("SAGA_STATUS_WAIT_TIMEOUT_MS", "250"),
            ("SAGA_MAX_CONFLICT_RETRIES", "7"),
        ]);
        let config = SagaConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.status_wait_timeout, Duration::from_millis(250));
        assert_eq!(config.max_conflict_retries, 7);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = SagaConfig::from_lookup(|_| Some("soon".to_string()));
        assert_eq!(config, SagaConfig::default());
    }
}
