//! Layered configuration, loaded lowest-to-highest priority from built-in
//! defaults, an optional `application.yaml`, an optional `.env` file, then
//! process environment variables. Eight named options; no profiles, no
//! secret resolver.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// The eight recognized configuration options, all with defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub http_host: String,
    pub http_port: u16,
    pub scan_root: String,
    pub event_workers: usize,
    pub event_queue_capacity: usize,
    pub event_drain_deadline_ms: u64,
    pub cors_enabled: bool,
    pub health_endpoint: bool,
}

impl AppConfig {
    /// `httpHost:httpPort` as a socket address string.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            scan_root: String::new(),
            event_workers: 10,
            event_queue_capacity: 1024,
            event_drain_deadline_ms: 5000,
            cors_enabled: true,
            health_endpoint: true,
        }
    }
}

/// Mirrors `application.yaml`'s shape; every field optional so a partial
/// file only overrides what it names.
#[derive(Debug, Deserialize, Default)]
struct YamlOverrides {
    #[serde(rename = "httpHost")]
    http_host: Option<String>,
    #[serde(rename = "httpPort")]
    http_port: Option<u16>,
    #[serde(rename = "scanRoot")]
    scan_root: Option<String>,
    #[serde(rename = "eventWorkers")]
    event_workers: Option<usize>,
    #[serde(rename = "eventQueueCapacity")]
    event_queue_capacity: Option<usize>,
    #[serde(rename = "eventDrainDeadlineMs")]
    event_drain_deadline_ms: Option<u64>,
    #[serde(rename = "corsEnabled")]
    cors_enabled: Option<bool>,
    #[serde(rename = "healthEndpoint")]
    health_endpoint: Option<bool>,
}

/// Load configuration: defaults, overlaid by `application.yaml` in the
/// current working directory (if present), overlaid by a `.env` file (if
/// present) and then `KERNEL_*` process environment variables.
pub fn load(scan_root_default: &str) -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_from(Path::new("application.yaml"), scan_root_default, &std::env::vars().collect())
}

/// Testable variant of [`load`] that takes an explicit YAML path and
/// environment map instead of touching the real filesystem/process
/// environment.
pub fn load_from(
    yaml_path: &Path,
    scan_root_default: &str,
    env: &HashMap<String, String>,
) -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig { scan_root: scan_root_default.to_string(), ..AppConfig::default() };

    if yaml_path.exists() {
        let contents = std::fs::read_to_string(yaml_path)?;
        let overrides: YamlOverrides =
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::InvalidYaml { message: e.to_string() })?;
        apply_yaml(&mut config, overrides);
    }

    apply_env(&mut config, env)?;
    Ok(config)
}

fn apply_yaml(config: &mut AppConfig, overrides: YamlOverrides) {
    if let Some(v) = overrides.http_host {
        config.http_host = v;
    }
    if let Some(v) = overrides.http_port {
        config.http_port = v;
    }
    if let Some(v) = overrides.scan_root {
        config.scan_root = v;
    }
    if let Some(v) = overrides.event_workers {
        config.event_workers = v;
    }
    if let Some(v) = overrides.event_queue_capacity {
        config.event_queue_capacity = v;
    }
    if let Some(v) = overrides.event_drain_deadline_ms {
        config.event_drain_deadline_ms = v;
    }
    if let Some(v) = overrides.cors_enabled {
        config.cors_enabled = v;
    }
    if let Some(v) = overrides.health_endpoint {
        config.health_endpoint = v;
    }
}

fn apply_env(config: &mut AppConfig, env: &HashMap<String, String>) -> Result<(), ConfigError> {
    macro_rules! parse_env {
        ($key:literal, $field:expr) => {
            if let Some(raw) = env.get($key) {
                $field = raw.parse().map_err(|_| ConfigError::InvalidValue {
                    key: $key.to_string(),
                    message: format!("could not parse '{raw}'"),
                })?;
            }
        };
    }

    if let Some(v) = env.get("KERNEL_HTTP_HOST") {
        config.http_host = v.clone();
    }
    parse_env!("KERNEL_HTTP_PORT", config.http_port);
    if let Some(v) = env.get("KERNEL_SCAN_ROOT") {
        config.scan_root = v.clone();
    }
    parse_env!("KERNEL_EVENT_WORKERS", config.event_workers);
    parse_env!("KERNEL_EVENT_QUEUE_CAPACITY", config.event_queue_capacity);
    parse_env!("KERNEL_EVENT_DRAIN_DEADLINE_MS", config.event_drain_deadline_ms);
    parse_env!("KERNEL_CORS_ENABLED", config.cors_enabled);
    parse_env!("KERNEL_HEALTH_ENDPOINT", config.health_endpoint);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_apply_with_no_yaml_and_no_env() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from(&dir.path().join("application.yaml"), "my_app", &env(&[])).unwrap();
        assert_eq!(config.http_host, "0.0.0.0");
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.scan_root, "my_app");
        assert_eq!(config.event_workers, 10);
        assert!(config.cors_enabled);
        assert!(config.health_endpoint);
    }

    #[test]
    fn yaml_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.yaml");
        std::fs::write(&path, "httpPort: 9090\ncorsEnabled: false\n").unwrap();
        let config = load_from(&path, "my_app", &env(&[])).unwrap();
        assert_eq!(config.http_port, 9090);
        assert!(!config.cors_enabled);
        assert_eq!(config.http_host, "0.0.0.0");
    }

    #[test]
    fn env_overrides_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.yaml");
        std::fs::write(&path, "httpPort: 9090\n").unwrap();
        let config = load_from(&path, "my_app", &env(&[("KERNEL_HTTP_PORT", "7070")])).unwrap();
        assert_eq!(config.http_port, 7070);
    }

    #[test]
    fn invalid_yaml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.yaml");
        std::fs::write(&path, "httpPort: [this is not a port\n").unwrap();
        let err = load_from(&path, "my_app", &env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidYaml { .. }));
    }

    #[test]
    fn invalid_env_value_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from(&dir.path().join("application.yaml"), "my_app", &env(&[("KERNEL_HTTP_PORT", "not-a-port")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
