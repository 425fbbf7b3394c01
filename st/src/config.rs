//! Self-test configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use mgrhost::HostConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::control::ControlConfig;
use crate::ipc::get_socket_path;
use crate::workload::WorkloadConfig;

/// Project-local config file name
const LOCAL_CONFIG: &str = ".selftest.yml";

/// Main self-test configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level used when `--log-level` is not given
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    pub ipc: IpcConfig,

    pub workload: WorkloadConfig,

    pub control: ControlConfig,

    /// Simulated manager host
    pub host: HostConfig,
}

/// Control socket configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Override for the daemon's socket path
    #[serde(rename = "socket-path")]
    pub socket_path: Option<PathBuf>,
}

impl IpcConfig {
    pub fn socket_path(&self) -> PathBuf {
        self.socket_path.clone().unwrap_or_else(get_socket_path)
    }
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// An explicit path must load. Otherwise `./.selftest.yml`, then
    /// `<config dir>/selftest/selftest.yml`, then defaults; unreadable
    /// fallback files are skipped with a warning.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::fallback_paths() {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => return Ok(config),
                Err(e) => warn!("Failed to load config from {}: {}", candidate.display(), e),
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only `log-level`, before logging is set up
    ///
    /// Follows the same chain as `load` but never fails.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::fallback_paths(),
        };
        candidates
            .into_iter()
            .find(|p| p.exists())
            .and_then(|p| fs::read_to_string(p).ok())
            .and_then(|content| serde_yaml::from_str::<LogLevelOnly>(&content).ok())
            .and_then(|c| c.log_level)
    }

    fn fallback_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("selftest").join("selftest.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        info!("Loaded config from: {}", path.as_ref().display());
        debug!(?config, "Config::load_from_file: parsed");
        Ok(config)
    }
}

#[derive(Deserialize)]
struct LogLevelOnly {
    #[serde(rename = "log-level")]
    log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.log_level.is_none());
        assert_eq!(config.workload.command_target, "mon");
        assert_eq!(config.control.peer_module, "influx");
        assert_eq!(config.host.mgr_id, "x");
        assert!(config.ipc.socket_path().ends_with("selftest/daemon.sock"));
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug
ipc:
  socket-path: /tmp/st-test.sock
workload:
  error-backoff-ms: 10
control:
  peer-module: dashboard
host:
  mgr-id: y
  osd-count: 5
  command-latency-ms: 0
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.ipc.socket_path(), PathBuf::from("/tmp/st-test.sock"));
        assert_eq!(config.workload.error_backoff_ms, 10);
        assert_eq!(config.workload.shutdown_timeout_secs, 30);
        assert_eq!(config.control.peer_module, "dashboard");
        assert_eq!(config.control.test_uri, "http://this.is.a.test.com");
        assert_eq!(config.host.mgr_id, "y");
        assert_eq!(config.host.osd_count, 5);
    }

    #[test]
    fn test_explicit_path_must_load() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_explicit_file_and_log_level() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("selftest.yml");
        fs::write(&path, "log-level: warn\nworkload:\n  command-target: osd\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.workload.command_target, "osd");
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("warn"));
    }

    #[test]
    fn test_log_level_ignores_broken_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.yml");
        fs::write(&path, "log-level: [unterminated").unwrap();
        assert!(Config::load_log_level(Some(&path)).is_none());
    }
}
