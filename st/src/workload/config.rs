//! Workload coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Workload coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Daemon type that spam commands are submitted to
    #[serde(rename = "command-target", default = "default_command_target")]
    pub command_target: String,

    /// Pause after a failed spam iteration
    #[serde(rename = "error-backoff-ms", default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,

    /// How long daemon shutdown waits for the coordinator to exit
    #[serde(rename = "shutdown-timeout-secs", default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_command_target() -> String {
    debug!("default_command_target: called");
    "mon".to_string()
}

fn default_error_backoff_ms() -> u64 {
    debug!("default_error_backoff_ms: called");
    100
}

fn default_shutdown_timeout_secs() -> u64 {
    debug!("default_shutdown_timeout_secs: called");
    30
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        debug!("WorkloadConfig::default: called");
        Self {
            command_target: default_command_target(),
            error_backoff_ms: default_error_backoff_ms(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl WorkloadConfig {
    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkloadConfig::default();
        assert_eq!(config.command_target, "mon");
        assert_eq!(config.error_backoff(), Duration::from_millis(100));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_yaml() {
        let config: WorkloadConfig = serde_yaml::from_str("error-backoff-ms: 5").unwrap();
        assert_eq!(config.error_backoff_ms, 5);
        assert_eq!(config.command_target, "mon");
    }
}
