//! One-shot verification of the host API surface

use std::collections::BTreeSet;

use mgrhost::MgrHost;
use serde_json::json;
use tracing::{debug, info};

use super::error::ControlError;

/// Options this module declares to the host
pub const MODULE_OPTIONS: [&str; 3] = ["testkey", "testlkey", "testnewline"];

/// Cluster objects the getters step fetches by name
pub const CLUSTER_OBJECTS: [&str; 15] = [
    "fs_map",
    "osdmap_crush_map_text",
    "osd_map",
    "config",
    "mon_map",
    "service_map",
    "osd_metadata",
    "pg_summary",
    "pg_status",
    "pg_dump",
    "df",
    "osd_stats",
    "health",
    "mon_status",
    "mgr_map",
];

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), ControlError> {
    if condition {
        Ok(())
    } else {
        Err(ControlError::assertion(message()))
    }
}

/// The self-test procedure run against one host
pub struct SelfTest<'a> {
    host: &'a dyn MgrHost,
    test_uri: &'a str,
}

impl<'a> SelfTest<'a> {
    pub fn new(host: &'a dyn MgrHost, test_uri: &'a str) -> Self {
        Self { host, test_uri }
    }

    /// Run every step in order, stopping at the first failure
    pub async fn run(&self) -> Result<(), ControlError> {
        info!("Running self-test procedure...");
        self.check_osdmap().await?;
        self.check_getters().await?;
        self.check_config().await?;
        self.check_store().await?;
        self.check_misc().await?;
        self.check_perf_counters().await?;
        info!("Finished self-test procedure.");
        Ok(())
    }

    async fn check_osdmap(&self) -> Result<(), ControlError> {
        debug!("SelfTest::check_osdmap: called");
        let osdmap = self.host.get_osdmap().await?;
        debug!(epoch = osdmap.epoch(), crush_version = osdmap.crush_version(), "check_osdmap: snapshot");
        osdmap.dump();

        let inc = osdmap.new_incremental();
        let next = osdmap.apply_incremental(&inc)?;
        ensure(next.epoch() == inc.epoch(), || {
            format!(
                "Applied incremental epoch {} but map is at epoch {}",
                inc.epoch(),
                next.epoch()
            )
        })?;
        inc.dump();

        let crush = osdmap.crush();
        crush.dump();
        let root = crush.item_name(-1);
        let root_weight = crush.item_weight(-1);
        let takes = crush.find_takes();
        let weights = crush.take_weight_osd_map(-1);
        debug!(?root, ?root_weight, ?takes, osds = weights.len(), "check_osdmap: crush");
        ensure(weights.values().all(|w| (0.0..=1.0).contains(w)), || {
            format!("Take weight map of -1 has weights outside [0, 1]: {:?}", weights)
        })?;
        Ok(())
    }

    async fn check_getters(&self) -> Result<(), ControlError> {
        debug!("SelfTest::check_getters: called");
        debug!(version = %self.host.version(), mgr_id = %self.host.mgr_id(), "check_getters: identity");

        for name in CLUSTER_OBJECTS {
            self.host.get(name).await?;
        }

        for server in self.host.list_servers().await? {
            let Some(hostname) = server.get("hostname").and_then(|h| h.as_str()) else {
                return Err(ControlError::assertion(format!("Server entry without hostname: {}", server)));
            };
            self.host.get_server(hostname).await?;
        }

        let osdmap = self.host.get("osd_map").await?;
        let osds = osdmap
            .get("osds")
            .and_then(|o| o.as_array())
            .ok_or_else(|| ControlError::assertion("osd_map has no osds list"))?;
        for osd in osds {
            let id = osd
                .get("osd")
                .and_then(|id| id.as_i64())
                .ok_or_else(|| ControlError::assertion(format!("osd_map entry without id: {}", osd)))?;
            self.host.get_metadata("osd", &id.to_string()).await?;
        }

        self.host.get_daemon_status("osd", "0").await?;
        Ok(())
    }

    async fn check_config(&self) -> Result<(), ControlError> {
        debug!("SelfTest::check_config: called");
        for option in MODULE_OPTIONS {
            self.host.get_config(option).await?;
        }

        self.host.set_config("testkey", "testvalue").await?;
        let value = self.host.get_config("testkey").await?;
        ensure(value.as_deref() == Some("testvalue"), || {
            format!("get_config(testkey) returned {:?}", value)
        })?;

        self.host.set_localized_config("testkey", "testvalue").await?;
        let value = self.host.get_localized_config("testkey").await?;
        ensure(value.as_deref() == Some("testvalue"), || {
            format!("get_localized_config(testkey) returned {:?}", value)
        })?;
        Ok(())
    }

    async fn check_store(&self) -> Result<(), ControlError> {
        debug!("SelfTest::check_store: called");
        let existing: BTreeSet<String> = self.host.get_store_prefix("test").await?.into_keys().collect();

        self.host.set_store("testkey", Some("testvalue")).await?;
        let value = self.host.get_store("testkey").await?;
        ensure(value.as_deref() == Some("testvalue"), || {
            format!("get_store(testkey) returned {:?}", value)
        })?;

        let blob = json!({"testblob": 2});
        self.host.set_store_json("testjsonkey", &blob).await?;
        let value = self.host.get_store_json("testjsonkey").await?;
        ensure(value.as_ref() == Some(&blob), || {
            format!("get_store_json(testjsonkey) returned {:?}", value)
        })?;

        let mut expected = existing;
        expected.insert("testkey".to_string());
        expected.insert("testjsonkey".to_string());
        let actual: BTreeSet<String> = self.host.get_store_prefix("test").await?.into_keys().collect();
        ensure(actual == expected, || {
            format!("Store prefix 'test' holds {:?}, expected {:?}", actual, expected)
        })?;
        Ok(())
    }

    async fn check_misc(&self) -> Result<(), ControlError> {
        debug!("SelfTest::check_misc: called");
        self.host.set_uri(self.test_uri).await?;
        self.host.set_health_checks(json!({})).await?;
        Ok(())
    }

    async fn check_perf_counters(&self) -> Result<(), ControlError> {
        debug!("SelfTest::check_perf_counters: called");
        self.host.get_perf_schema("osd", "0").await?;
        self.host.get_counter("osd", "0", "osd.op").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mgrhost::{HostConfig, KvStore, MemoryHost};

    fn host() -> MemoryHost {
        MemoryHost::with_store(HostConfig::default(), KvStore::in_memory())
    }

    #[tokio::test]
    async fn test_self_test_passes_on_memory_host() {
        let host = host();
        SelfTest::new(&host, "http://this.is.a.test.com").run().await.unwrap();

        assert_eq!(host.uri().await.as_deref(), Some("http://this.is.a.test.com"));
        assert_eq!(host.get_store("testkey").await.unwrap().as_deref(), Some("testvalue"));
    }

    #[tokio::test]
    async fn test_store_check_keeps_existing_keys() {
        let host = host();
        host.set_store("test_existing", Some("1")).await.unwrap();
        host.set_store("other", Some("2")).await.unwrap();

        SelfTest::new(&host, "http://x").check_store().await.unwrap();

        let keys: Vec<String> = host.get_store_prefix("test").await.unwrap().into_keys().collect();
        assert_eq!(keys, vec!["test_existing", "testjsonkey", "testkey"]);
    }

    #[tokio::test]
    async fn test_self_test_is_repeatable() {
        let host = host();
        let test = SelfTest::new(&host, "http://x");
        test.run().await.unwrap();
        test.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_perf_counters_fail_without_osd_zero() {
        let host = MemoryHost::with_store(
            HostConfig {
                osd_count: 0,
                ..Default::default()
            },
            KvStore::in_memory(),
        );
        let err = SelfTest::new(&host, "http://x").check_perf_counters().await.unwrap_err();
        assert!(matches!(err, ControlError::Host(_)));
    }

    #[test]
    fn test_declared_options() {
        assert!(MODULE_OPTIONS.contains(&"testkey"));
        assert!(MODULE_OPTIONS.contains(&"testlkey"));
        assert!(MODULE_OPTIONS.contains(&"testnewline"));
    }
}
