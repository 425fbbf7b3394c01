//! MemoryHost - in-process simulated manager host
//!
//! Holds a small simulated cluster, the module's config and key/value store,
//! and executes submitted commands on spawned tasks after a configurable delay.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nix::errno::Errno;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::api::MgrHost;
use super::cluster::OsdMap;
use super::command::{CommandOutput, CommandResult};
use super::config::{HostConfig, ModuleConfig};
use super::error::HostError;
use super::store::KvStore;

/// Version the simulated host reports
pub const HOST_VERSION: &str = concat!("mgrhost ", env!("CARGO_PKG_VERSION"));

struct HostState {
    config: HostConfig,
    osdmap: RwLock<OsdMap>,
    config_store: RwLock<BTreeMap<String, String>>,
    store: KvStore,
    health_checks: RwLock<Value>,
    uri: RwLock<Option<String>>,
    commands_received: AtomicU64,
    commands_executed: AtomicU64,
    started_at: DateTime<Utc>,
}

/// Simulated host; clones share state
#[derive(Clone)]
pub struct MemoryHost {
    state: Arc<HostState>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::with_store(HostConfig::default(), KvStore::in_memory())
    }
}

impl MemoryHost {
    /// Create a host, opening the persisted store if the config names one
    pub fn new(config: HostConfig) -> Result<Self, HostError> {
        let store = match &config.store_path {
            Some(path) => KvStore::open(path)?,
            None => KvStore::in_memory(),
        };
        Ok(Self::with_store(config, store))
    }

    /// Create a host around an existing store
    pub fn with_store(config: HostConfig, store: KvStore) -> Self {
        debug!(osd_count = config.osd_count, mgr_id = %config.mgr_id, "MemoryHost::with_store: called");
        let osdmap = OsdMap::simulated(config.osd_count, &config.hosts);
        info!(
            osds = osdmap.osds().len(),
            modules = config.modules.len(),
            "Simulated host initialized"
        );
        Self {
            state: Arc::new(HostState {
                config,
                osdmap: RwLock::new(osdmap),
                config_store: RwLock::new(BTreeMap::new()),
                store,
                health_checks: RwLock::new(json!({})),
                uri: RwLock::new(None),
                commands_received: AtomicU64::new(0),
                commands_executed: AtomicU64::new(0),
                started_at: Utc::now(),
            }),
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.state.config
    }

    /// Number of commands submitted so far
    pub fn commands_received(&self) -> u64 {
        self.state.commands_received.load(Ordering::SeqCst)
    }

    /// Number of submitted commands that ran to completion
    pub fn commands_executed(&self) -> u64 {
        self.state.commands_executed.load(Ordering::SeqCst)
    }

    pub async fn uri(&self) -> Option<String> {
        self.state.uri.read().await.clone()
    }

    pub async fn health_checks(&self) -> Value {
        self.state.health_checks.read().await.clone()
    }

    fn module(&self, name: &str) -> Option<&ModuleConfig> {
        self.state.config.modules.iter().find(|m| m.name == name)
    }

    fn config_key(&self, key: &str) -> String {
        format!("mgr/{}/{}", self.state.config.module, key)
    }

    fn localized_key(&self, key: &str) -> String {
        format!("mgr/{}/{}/{}", self.state.config.module, self.state.config.mgr_id, key)
    }

    fn mgr_map(&self) -> Value {
        let modules = &self.state.config.modules;
        json!({
            "active_name": self.state.config.mgr_id,
            "available": true,
            "available_modules": modules
                .iter()
                .map(|m| json!({"name": m.name, "can_run": true}))
                .collect::<Vec<_>>(),
            "modules": modules
                .iter()
                .filter(|m| m.enabled)
                .map(|m| m.name.clone())
                .collect::<Vec<_>>(),
        })
    }

    async fn health(&self) -> Value {
        let checks = self.health_checks().await;
        let empty = checks.as_object().is_none_or(|c| c.is_empty());
        json!({
            "status": if empty { "HEALTH_OK" } else { "HEALTH_WARN" },
            "checks": checks,
        })
    }

    fn osd_metadata(&self, osdmap: &OsdMap, osd: i32) -> Value {
        json!({
            "id": osd,
            "hostname": osdmap.host_of(osd).unwrap_or("unknown"),
            "osd_objectstore": "bluestore",
            "ceph_version": self.version(),
        })
    }

    fn parse_osd_id(svc_id: &str) -> Option<i32> {
        svc_id.parse().ok()
    }

    async fn execute(&self, target: &str, command: &Value) -> CommandOutput {
        debug!(%target, %command, "MemoryHost::execute: called");
        if target != "mon" {
            return CommandOutput::error(
                -(Errno::EINVAL as i32),
                format!("unsupported command target '{}'", target),
            );
        }

        let rate = self.state.config.command_error_rate;
        if rate > 0.0 && rand::random::<f64>() < rate {
            return CommandOutput::error(-(Errno::EAGAIN as i32), "simulated command failure");
        }

        let prefix = command.get("prefix").and_then(Value::as_str).unwrap_or_default();
        match prefix {
            "osd reweight" => {
                let id = command.get("id").and_then(Value::as_i64);
                let weight = command.get("weight").and_then(Value::as_f64);
                match (id, weight) {
                    (Some(id), Some(weight)) if (0.0..=1.0).contains(&weight) => {
                        let mut osdmap = self.state.osdmap.write().await;
                        if osdmap.set_weight(id as i32, weight) {
                            osdmap.epoch += 1;
                            CommandOutput::ok(
                                "",
                                format!("reweighted osd.{} to {} (epoch {})", id, weight, osdmap.epoch),
                            )
                        } else {
                            CommandOutput::error(-(Errno::ENOENT as i32), format!("osd.{} does not exist", id))
                        }
                    }
                    _ => CommandOutput::error(-(Errno::EINVAL as i32), "invalid reweight arguments"),
                }
            }
            "osd dump" => {
                let osdmap = self.state.osdmap.read().await;
                CommandOutput::ok(osdmap.dump().to_string(), "")
            }
            other => CommandOutput::error(-(Errno::EINVAL as i32), format!("unknown command '{}'", other)),
        }
    }
}

#[async_trait]
impl MgrHost for MemoryHost {
    fn version(&self) -> String {
        HOST_VERSION.to_string()
    }

    fn mgr_id(&self) -> String {
        self.state.config.mgr_id.clone()
    }

    async fn get(&self, data_name: &str) -> Result<Value, HostError> {
        debug!(%data_name, "MemoryHost::get: called");
        let osdmap = self.state.osdmap.read().await.clone();
        let value = match data_name {
            "osd_map" => osdmap.dump(),
            "osdmap_crush_map_text" => Value::String(osdmap.crush().to_text()),
            "osd_metadata" => {
                let mut all = serde_json::Map::new();
                for info in osdmap.osds() {
                    all.insert(info.osd.to_string(), self.osd_metadata(&osdmap, info.osd));
                }
                Value::Object(all)
            }
            "osd_stats" => json!({
                "osd_stats": osdmap
                    .osds()
                    .iter()
                    .map(|o| json!({"osd": o.osd, "up": o.up, "kb": 0, "kb_used": 0}))
                    .collect::<Vec<_>>(),
            }),
            "config" => serde_json::to_value(&*self.state.config_store.read().await)?,
            "mgr_map" => self.mgr_map(),
            "health" => self.health().await,
            "fs_map" => json!({"epoch": 1, "filesystems": []}),
            "mon_map" => json!({"epoch": 1, "mons": [{"name": "a", "rank": 0}]}),
            "mon_status" => json!({"name": "a", "rank": 0, "state": "leader", "quorum": [0]}),
            "service_map" => json!({"epoch": 1, "services": {}}),
            "pg_summary" => json!({"by_osd": {}, "by_pool": {}, "all": {}}),
            "pg_status" => json!({"num_pgs": 0}),
            "pg_dump" => json!({"pg_stats": []}),
            "df" => json!({"stats": {"total_bytes": 0, "total_used_bytes": 0}, "pools": []}),
            other => return Err(HostError::NotFound(format!("cluster object '{}'", other))),
        };
        Ok(value)
    }

    async fn list_servers(&self) -> Result<Vec<Value>, HostError> {
        debug!("MemoryHost::list_servers: called");
        let osdmap = self.state.osdmap.read().await;
        let servers = self
            .state
            .config
            .hosts
            .iter()
            .map(|host| {
                let services: Vec<Value> = osdmap
                    .osds()
                    .iter()
                    .filter(|o| osdmap.host_of(o.osd) == Some(host.as_str()))
                    .map(|o| json!({"type": "osd", "id": o.osd.to_string()}))
                    .collect();
                json!({"hostname": host, "services": services})
            })
            .collect();
        Ok(servers)
    }

    async fn get_server(&self, hostname: &str) -> Result<Option<Value>, HostError> {
        debug!(%hostname, "MemoryHost::get_server: called");
        let servers = self.list_servers().await?;
        Ok(servers.into_iter().find(|s| s["hostname"] == hostname))
    }

    async fn get_metadata(&self, svc_type: &str, svc_id: &str) -> Result<Option<Value>, HostError> {
        debug!(%svc_type, %svc_id, "MemoryHost::get_metadata: called");
        match svc_type {
            "osd" => {
                let osdmap = self.state.osdmap.read().await.clone();
                match Self::parse_osd_id(svc_id).filter(|id| osdmap.osds().iter().any(|o| o.osd == *id)) {
                    Some(id) => Ok(Some(self.osd_metadata(&osdmap, id))),
                    None => Ok(None),
                }
            }
            "mgr" if svc_id == self.state.config.mgr_id => Ok(Some(json!({
                "id": svc_id,
                "ceph_version": self.version(),
            }))),
            _ => Ok(None),
        }
    }

    async fn get_daemon_status(&self, svc_type: &str, svc_id: &str) -> Result<Option<Value>, HostError> {
        debug!(%svc_type, %svc_id, "MemoryHost::get_daemon_status: called");
        if svc_type != "osd" {
            return Ok(None);
        }
        let osdmap = self.state.osdmap.read().await;
        Ok(Self::parse_osd_id(svc_id)
            .and_then(|id| osdmap.osds().iter().find(|o| o.osd == id))
            .map(|o| json!({"state": if o.up { "up" } else { "down" }})))
    }

    async fn get_osdmap(&self) -> Result<OsdMap, HostError> {
        Ok(self.state.osdmap.read().await.clone())
    }

    async fn get_config(&self, key: &str) -> Result<Option<String>, HostError> {
        Ok(self.state.config_store.read().await.get(&self.config_key(key)).cloned())
    }

    async fn set_config(&self, key: &str, value: &str) -> Result<(), HostError> {
        debug!(%key, "MemoryHost::set_config: called");
        self.state
            .config_store
            .write()
            .await
            .insert(self.config_key(key), value.to_string());
        Ok(())
    }

    async fn get_localized_config(&self, key: &str) -> Result<Option<String>, HostError> {
        let store = self.state.config_store.read().await;
        Ok(store
            .get(&self.localized_key(key))
            .or_else(|| store.get(&self.config_key(key)))
            .cloned())
    }

    async fn set_localized_config(&self, key: &str, value: &str) -> Result<(), HostError> {
        debug!(%key, "MemoryHost::set_localized_config: called");
        self.state
            .config_store
            .write()
            .await
            .insert(self.localized_key(key), value.to_string());
        Ok(())
    }

    async fn get_store(&self, key: &str) -> Result<Option<String>, HostError> {
        Ok(self.state.store.get(key).await)
    }

    async fn set_store(&self, key: &str, value: Option<&str>) -> Result<(), HostError> {
        self.state.store.set(key, value).await
    }

    async fn get_store_prefix(&self, prefix: &str) -> Result<BTreeMap<String, String>, HostError> {
        Ok(self.state.store.prefix(prefix).await)
    }

    async fn get_perf_schema(&self, svc_type: &str, svc_id: &str) -> Result<Value, HostError> {
        debug!(%svc_type, %svc_id, "MemoryHost::get_perf_schema: called");
        if self.get_metadata(svc_type, svc_id).await?.is_none() {
            return Err(HostError::NotFound(format!("daemon {}.{}", svc_type, svc_id)));
        }
        let daemon = format!("{}.{}", svc_type, svc_id);
        Ok(json!({
            daemon: {
                "osd.op": {"type": 10, "description": "Client operations", "nick": "ops", "priority": 5},
                "osd.op_r": {"type": 10, "description": "Client read operations", "nick": "rd", "priority": 5},
                "osd.op_w": {"type": 10, "description": "Client write operations", "nick": "wr", "priority": 5},
            }
        }))
    }

    async fn get_counter(&self, svc_type: &str, svc_id: &str, path: &str) -> Result<Value, HostError> {
        debug!(%svc_type, %svc_id, %path, "MemoryHost::get_counter: called");
        let schema = self.get_perf_schema(svc_type, svc_id).await?;
        let daemon = format!("{}.{}", svc_type, svc_id);
        let samples = if schema[&daemon].get(path).is_some() {
            let uptime = (Utc::now() - self.state.started_at).num_seconds();
            json!([[Utc::now().timestamp(), uptime.max(0) as u64 + self.commands_executed()]])
        } else {
            json!([])
        };
        Ok(json!({ path: samples }))
    }

    async fn set_uri(&self, uri: &str) -> Result<(), HostError> {
        debug!(%uri, "MemoryHost::set_uri: called");
        *self.state.uri.write().await = Some(uri.to_string());
        Ok(())
    }

    async fn set_health_checks(&self, checks: Value) -> Result<(), HostError> {
        debug!(%checks, "MemoryHost::set_health_checks: called");
        if !checks.is_object() {
            return Err(HostError::Invalid("health checks must be an object".to_string()));
        }
        *self.state.health_checks.write().await = checks;
        Ok(())
    }

    async fn send_command(&self, target: &str, command: Value) -> Result<CommandResult, HostError> {
        let tag = Uuid::now_v7().to_string();
        debug!(%tag, %target, %command, "MemoryHost::send_command: called");
        self.state.commands_received.fetch_add(1, Ordering::SeqCst);

        let (tx, result) = CommandResult::channel(tag.clone());
        let host = self.clone();
        let target = target.to_string();
        let latency = self.state.config.command_latency();

        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            let output = host.execute(&target, &command).await;
            host.state.commands_executed.fetch_add(1, Ordering::SeqCst);
            if !output.is_success() {
                warn!(%tag, code = output.code, outs = %output.outs, "Command failed");
            }
            if tx.send(output).is_err() {
                debug!(%tag, "send_command: result handle dropped before completion");
            }
        });

        Ok(result)
    }

    async fn remote(&self, module: &str, method: &str, args: Value) -> Result<Value, HostError> {
        debug!(%module, %method, "MemoryHost::remote: called");
        let target = self
            .module(module)
            .filter(|m| m.enabled)
            .ok_or_else(|| HostError::ModuleUnavailable(module.to_string()))?;

        if !target.methods.iter().any(|m| m == method) {
            return Err(HostError::MethodNotFound {
                module: module.to_string(),
                method: method.to_string(),
            });
        }

        Ok(json!({
            "module": module,
            "method": method,
            "args": args,
            "result": 0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast_host() -> MemoryHost {
        MemoryHost::with_store(
            HostConfig {
                command_latency_ms: 1,
                ..Default::default()
            },
            KvStore::in_memory(),
        )
    }

    #[tokio::test]
    async fn test_reweight_command_updates_map() {
        let host = fast_host();
        let before = host.get_osdmap().await.unwrap();

        let result = host
            .send_command("mon", json!({"prefix": "osd reweight", "id": 1, "weight": 0.25}))
            .await
            .unwrap();
        let output = result.wait().await.unwrap();
        assert!(output.is_success(), "unexpected failure: {}", output.outs);

        let after = host.get_osdmap().await.unwrap();
        assert_eq!(after.epoch(), before.epoch() + 1);
        assert_eq!(after.osds()[1].weight, 0.25);
        assert_eq!(host.commands_received(), 1);
        assert_eq!(host.commands_executed(), 1);
    }

    #[tokio::test]
    async fn test_reweight_unknown_osd_fails() {
        let host = fast_host();
        let output = host
            .send_command("mon", json!({"prefix": "osd reweight", "id": 42, "weight": 0.5}))
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(output.code, -2);
    }

    #[tokio::test]
    async fn test_unknown_command_is_einval() {
        let host = fast_host();
        let output = host
            .send_command("mon", json!({"prefix": "osd frobnicate"}))
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(output.code, -22);
        assert!(output.outs.contains("osd frobnicate"));
    }

    #[tokio::test]
    async fn test_error_rate_one_fails_every_command() {
        let host = MemoryHost::with_store(
            HostConfig {
                command_latency_ms: 0,
                command_error_rate: 1.0,
                ..Default::default()
            },
            KvStore::in_memory(),
        );
        for _ in 0..3 {
            let output = host
                .send_command("mon", json!({"prefix": "osd reweight", "id": 0, "weight": 0.5}))
                .await
                .unwrap()
                .wait()
                .await
                .unwrap();
            assert_eq!(output.code, -11);
        }
        assert_eq!(host.get_osdmap().await.unwrap().epoch(), 1);
    }

    #[tokio::test]
    async fn test_remote_call_semantics() {
        let host = fast_host();

        let reply = host.remote("influx", "handle_command", json!({"prefix": "x"})).await.unwrap();
        assert_eq!(reply["module"], "influx");

        let err = host.remote("dashboard", "handle_command", json!({})).await.unwrap_err();
        assert!(err.is_module_unavailable());

        let err = host.remote("idontexist", "handle_command", json!({})).await.unwrap_err();
        assert!(err.is_module_unavailable());

        let err = host.remote("influx", "idontexist", json!({})).await.unwrap_err();
        assert!(err.is_method_not_found());
    }

    #[tokio::test]
    async fn test_localized_config_falls_back_to_module_value() {
        let host = fast_host();
        host.set_config("testkey", "plain").await.unwrap();
        assert_eq!(host.get_localized_config("testkey").await.unwrap(), Some("plain".to_string()));

        host.set_localized_config("testkey", "local").await.unwrap();
        assert_eq!(host.get_localized_config("testkey").await.unwrap(), Some("local".to_string()));
        assert_eq!(host.get_config("testkey").await.unwrap(), Some("plain".to_string()));
        assert_eq!(host.get_config("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_json_roundtrip_and_prefix() {
        let host = fast_host();
        host.set_store("testpre", Some("existing")).await.unwrap();

        host.set_store("testkey", Some("testvalue")).await.unwrap();
        assert_eq!(host.get_store("testkey").await.unwrap(), Some("testvalue".to_string()));

        let blob = json!({"testblob": 2, "nested": {"list": [1, 2, 3]}});
        host.set_store_json("testjsonkey", &blob).await.unwrap();
        assert_eq!(host.get_store_json("testjsonkey").await.unwrap(), Some(blob));

        let keys: Vec<String> = host.get_store_prefix("test").await.unwrap().into_keys().collect();
        assert_eq!(keys, vec!["testjsonkey", "testkey", "testpre"]);
    }

    #[tokio::test]
    async fn test_named_objects() {
        let host = fast_host();
        for name in ["osd_map", "mgr_map", "health", "pg_dump", "osdmap_crush_map_text"] {
            assert!(host.get(name).await.is_ok(), "{} should exist", name);
        }
        assert!(matches!(host.get("nope").await, Err(HostError::NotFound(_))));

        let mgr_map = host.get("mgr_map").await.unwrap();
        let enabled: Vec<&str> = mgr_map["modules"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(enabled.contains(&"influx"));
        assert!(!enabled.contains(&"dashboard"));
    }

    #[tokio::test]
    async fn test_servers_and_metadata() {
        let host = fast_host();
        let servers = host.list_servers().await.unwrap();
        assert_eq!(servers.len(), 2);

        let server = host.get_server("node-a").await.unwrap().unwrap();
        assert_eq!(server["services"].as_array().unwrap().len(), 2);
        assert!(host.get_server("node-z").await.unwrap().is_none());

        let meta = host.get_metadata("osd", "1").await.unwrap().unwrap();
        assert_eq!(meta["hostname"], "node-b");
        assert!(host.get_metadata("osd", "99").await.unwrap().is_none());

        let status = host.get_daemon_status("osd", "0").await.unwrap().unwrap();
        assert_eq!(status["state"], "up");
    }

    #[tokio::test]
    async fn test_health_checks_drive_status() {
        let host = fast_host();
        assert_eq!(host.get("health").await.unwrap()["status"], "HEALTH_OK");

        host.set_health_checks(json!({"MGR_MODULE_ERROR": {"severity": "warning"}}))
            .await
            .unwrap();
        assert_eq!(host.get("health").await.unwrap()["status"], "HEALTH_WARN");

        assert!(host.set_health_checks(json!([])).await.is_err());
    }

    #[tokio::test]
    async fn test_perf_counters() {
        let host = fast_host();
        let schema = host.get_perf_schema("osd", "0").await.unwrap();
        assert!(schema["osd.0"].get("osd.op").is_some());

        let counter = host.get_counter("osd", "0", "osd.op").await.unwrap();
        assert_eq!(counter["osd.op"].as_array().unwrap().len(), 1);

        let missing = host.get_counter("osd", "0", "osd.nope").await.unwrap();
        assert!(missing["osd.nope"].as_array().unwrap().is_empty());

        assert!(host.get_perf_schema("osd", "17").await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_result_does_not_panic_host() {
        let host = fast_host();
        let result = host
            .send_command("mon", json!({"prefix": "osd reweight", "id": 0, "weight": 0.1}))
            .await
            .unwrap();
        drop(result);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(host.commands_executed(), 1);
    }
}
