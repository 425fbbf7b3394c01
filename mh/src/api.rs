//! MgrHost trait definition

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use super::cluster::OsdMap;
use super::command::CommandResult;
use super::error::HostError;

/// The manager host's API, as seen from one module
///
/// Every call is independent: implementations own all state and callers
/// borrow the host per call.
#[async_trait]
pub trait MgrHost: Send + Sync {
    /// Version string of the host daemon
    fn version(&self) -> String;

    /// Identity of the manager daemon the module runs in
    fn mgr_id(&self) -> String;

    /// Fetch a named cluster object (`osd_map`, `mgr_map`, `health`, ...)
    async fn get(&self, data_name: &str) -> Result<Value, HostError>;

    async fn list_servers(&self) -> Result<Vec<Value>, HostError>;

    async fn get_server(&self, hostname: &str) -> Result<Option<Value>, HostError>;

    async fn get_metadata(&self, svc_type: &str, svc_id: &str) -> Result<Option<Value>, HostError>;

    async fn get_daemon_status(&self, svc_type: &str, svc_id: &str) -> Result<Option<Value>, HostError>;

    /// Snapshot of the current OSD map
    async fn get_osdmap(&self) -> Result<OsdMap, HostError>;

    async fn get_config(&self, key: &str) -> Result<Option<String>, HostError>;

    async fn set_config(&self, key: &str, value: &str) -> Result<(), HostError>;

    /// Config scoped to this manager instance, falling back to the module-wide value
    async fn get_localized_config(&self, key: &str) -> Result<Option<String>, HostError>;

    async fn set_localized_config(&self, key: &str, value: &str) -> Result<(), HostError>;

    async fn get_store(&self, key: &str) -> Result<Option<String>, HostError>;

    /// Set a store key; `None` removes it
    async fn set_store(&self, key: &str, value: Option<&str>) -> Result<(), HostError>;

    async fn get_store_prefix(&self, prefix: &str) -> Result<BTreeMap<String, String>, HostError>;

    async fn get_store_json(&self, key: &str) -> Result<Option<Value>, HostError> {
        match self.get_store(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set_store_json(&self, key: &str, value: &Value) -> Result<(), HostError> {
        let raw = serde_json::to_string(value)?;
        self.set_store(key, Some(&raw)).await
    }

    async fn get_perf_schema(&self, svc_type: &str, svc_id: &str) -> Result<Value, HostError>;

    async fn get_counter(&self, svc_type: &str, svc_id: &str, path: &str) -> Result<Value, HostError>;

    /// Advertise the URI the module serves on
    async fn set_uri(&self, uri: &str) -> Result<(), HostError>;

    /// Replace the module's health checks
    async fn set_health_checks(&self, checks: Value) -> Result<(), HostError>;

    /// Submit a command to a daemon; the result completes asynchronously
    async fn send_command(&self, target: &str, command: Value) -> Result<CommandResult, HostError>;

    /// Invoke a method exposed by another module
    ///
    /// Fails with `ModuleUnavailable` if the module is missing or disabled and
    /// with `MethodNotFound` if it does not expose `method`.
    async fn remote(&self, module: &str, method: &str, args: Value) -> Result<Value, HostError>;
}
