//! Worker configuration loaded from environment variables.

use saga::SagaConfig;

/// Worker configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `json` for JSON log lines, anything else for text
/// - `DATABASE_URL` — PostgreSQL connection string; in-memory storage when unset
/// - `DEMO_SERVICES` — run in-process validation and allocation services (default: `true`)
///
/// Saga tuning is read by [`SagaConfig::from_lookup`].
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub json_logs: bool,
    pub database_url: Option<String>,
    pub demo_services: bool,
    pub saga: SagaConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            json_logs: lookup("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            demo_services: lookup("DEMO_SERVICES")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.demo_services),
            saga: SagaConfig::from_lookup(&lookup),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            json_logs: false,
            database_url: None,
            demo_services: true,
            saga: SagaConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    fn from_vars(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<_, _> = vars.iter().copied().collect();
        Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.demo_services);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_empty_lookup_gives_defaults() {
        let config = from_vars(&[]);
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert!(!config.json_logs);
        assert_eq!(config.saga, SagaConfig::default());
    }

    #[test]
    fn test_lookup_overrides() {
        let config = from_vars(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/orders"),
            ("DEMO_SERVICES", "off"),
            ("SAGA_STATUS_WAIT_TIMEOUT_MS", "50"),
        ]);

        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert!(config.json_logs);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/orders")
        );
        assert!(!config.demo_services);
        assert_eq!(config.saga.status_wait_timeout, Duration::from_millis(50));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = from_vars(&[("PORT", "eighty"), ("DEMO_SERVICES", "maybe"), ("DATABASE_URL", "")]);
        assert_eq!(config.port, 3000);
        assert!(config.demo_services);
        assert!(config.database_url.is_none());
    }
}
