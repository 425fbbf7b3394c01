//! Simulated host configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A manager module known to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub name: String,

    /// Disabled modules are listed as available but cannot be called
    #[serde(default)]
    pub enabled: bool,

    /// Methods other modules may invoke
    #[serde(default)]
    pub methods: Vec<String>,
}

impl ModuleConfig {
    pub fn new(name: &str, enabled: bool, methods: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            enabled,
            methods: methods.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Configuration for `MemoryHost`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Name of the module the host serves (namespaces config keys)
    pub module: String,

    /// Identity of the manager daemon (scopes localized config)
    #[serde(rename = "mgr-id")]
    pub mgr_id: String,

    /// Hostnames that carry OSDs
    pub hosts: Vec<String>,

    /// Number of OSDs in the simulated cluster
    #[serde(rename = "osd-count")]
    pub osd_count: u32,

    /// Delay before a submitted command completes
    #[serde(rename = "command-latency-ms")]
    pub command_latency_ms: u64,

    /// Fraction of commands that fail with EAGAIN (0.0 - 1.0)
    #[serde(rename = "command-error-rate")]
    pub command_error_rate: f64,

    /// Module table for cross-module calls
    pub modules: Vec<ModuleConfig>,

    /// Where the key/value store is persisted (in memory when unset)
    #[serde(rename = "store-path")]
    pub store_path: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            module: "selftest".to_string(),
            mgr_id: "x".to_string(),
            hosts: vec!["node-a".to_string(), "node-b".to_string()],
            osd_count: 3,
            command_latency_ms: 5,
            command_error_rate: 0.0,
            modules: vec![
                ModuleConfig::new("selftest", true, &["handle_command", "self_test"]),
                ModuleConfig::new("influx", true, &["handle_command", "self_test"]),
                ModuleConfig::new("dashboard", false, &["handle_command"]),
                ModuleConfig::new("balancer", false, &["handle_command"]),
            ],
            store_path: None,
        }
    }
}

impl HostConfig {
    pub fn command_latency(&self) -> Duration {
        Duration::from_millis(self.command_latency_ms)
    }

    /// Default location for a persisted store
    pub fn default_store_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("selftest")
            .join("store.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HostConfig::default();
        assert_eq!(config.mgr_id, "x");
        assert_eq!(config.osd_count, 3);
        assert_eq!(config.command_latency(), Duration::from_millis(5));
        assert!(config.modules.iter().any(|m| !m.enabled));
        assert!(config.store_path.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
osd-count: 8
command-error-rate: 0.25
modules:
  - name: influx
    enabled: true
    methods: [handle_command]
"#;
        let config: HostConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.osd_count, 8);
        assert_eq!(config.command_error_rate, 0.25);
        assert_eq!(config.modules.len(), 1);
        assert_eq!(config.mgr_id, "x");
    }

    #[test]
    fn test_default_store_path() {
        assert!(HostConfig::default_store_path().ends_with("selftest/store.json"));
    }
}
