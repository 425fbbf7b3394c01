//! Control surface configuration

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Control surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Enabled module used for the valid cross-module call
    #[serde(rename = "peer-module", default = "default_peer_module")]
    pub peer_module: String,

    /// URI advertised during the self-test
    #[serde(rename = "test-uri", default = "default_test_uri")]
    pub test_uri: String,
}

fn default_peer_module() -> String {
    debug!("default_peer_module: called");
    "influx".to_string()
}

fn default_test_uri() -> String {
    debug!("default_test_uri: called");
    "http://this.is.a.test.com".to_string()
}

impl Default for ControlConfig {
    fn default() -> Self {
        debug!("ControlConfig::default: called");
        Self {
            peer_module: default_peer_module(),
            test_uri: default_test_uri(),
        }
    }
}
