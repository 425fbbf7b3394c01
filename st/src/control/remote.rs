//! Cross-module call checks

use std::collections::BTreeSet;

use mgrhost::{HostError, MgrHost};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::error::ControlError;

/// Name of a module that no host registers
const NONEXISTENT_MODULE: &str = "idontexist";
const NONEXISTENT_METHOD: &str = "idontexist";
const PEER_METHOD: &str = "handle_command";

/// Exercise the valid call and every expected failure of `remote`
///
/// Any expected failure that does not occur, or occurs with the wrong kind,
/// is reported as an assertion failure.
pub async fn test_remote_calls(host: &dyn MgrHost, peer: &str) -> Result<(), ControlError> {
    debug!(%peer, "test_remote_calls: called");
    let args = json!({"prefix": format!("{} self-test", peer)});

    host.remote(peer, PEER_METHOD, args.clone()).await?;

    let disabled = first_disabled_module(host).await?;
    expect_module_unavailable(host.remote(&disabled, PEER_METHOD, args.clone()).await, "disabled", &disabled)?;
    expect_module_unavailable(
        host.remote(NONEXISTENT_MODULE, PEER_METHOD, args.clone()).await,
        "nonexistent",
        NONEXISTENT_MODULE,
    )?;

    match host.remote(peer, NONEXISTENT_METHOD, args).await {
        Err(e) if e.is_method_not_found() => {}
        Err(e) => {
            return Err(ControlError::assertion(format!(
                "Calling missing method on '{}' failed with the wrong error: {}",
                peer, e
            )));
        }
        Ok(_) => {
            return Err(ControlError::assertion(format!(
                "Method not found error not raised for '{}.{}'",
                peer, NONEXISTENT_METHOD
            )));
        }
    }

    info!(%peer, %disabled, "Remote call checks passed");
    Ok(())
}

/// First module the manager map lists as available but not enabled
async fn first_disabled_module(host: &dyn MgrHost) -> Result<String, ControlError> {
    let mgr_map = host.get("mgr_map").await?;
    let enabled: BTreeSet<&str> = names(&mgr_map["modules"], |m| m.as_str()).collect();
    let disabled = names(&mgr_map["available_modules"], |m| m.get("name").and_then(Value::as_str))
        .find(|name| !enabled.contains(name))
        .map(str::to_string);
    disabled.ok_or_else(|| ControlError::assertion("No disabled module available to test against"))
}

fn names<'v>(list: &'v Value, name: impl Fn(&'v Value) -> Option<&'v str>) -> impl Iterator<Item = &'v str> {
    list.as_array().into_iter().flatten().filter_map(name)
}

fn expect_module_unavailable(result: Result<Value, HostError>, kind: &str, module: &str) -> Result<(), ControlError> {
    match result {
        Err(e) if e.is_module_unavailable() => Ok(()),
        Err(e) => Err(ControlError::assertion(format!(
            "Calling {} module '{}' failed with the wrong error: {}",
            kind, module, e
        ))),
        Ok(_) => Err(ControlError::assertion(format!(
            "Module unavailable error not raised for {} module '{}'",
            kind, module
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mgrhost::{HostConfig, KvStore, MemoryHost, ModuleConfig};

    fn host_with_modules(modules: Vec<ModuleConfig>) -> MemoryHost {
        MemoryHost::with_store(
            HostConfig {
                modules,
                ..Default::default()
            },
            KvStore::in_memory(),
        )
    }

    #[tokio::test]
    async fn test_default_host_passes() {
        let host = MemoryHost::with_store(HostConfig::default(), KvStore::in_memory());
        test_remote_calls(&host, "influx").await.unwrap();
    }

    #[tokio::test]
    async fn test_no_disabled_module_is_assertion() {
        let host = host_with_modules(vec![
            ModuleConfig::new("selftest", true, &[]),
            ModuleConfig::new("influx", true, &["handle_command"]),
        ]);
        let err = test_remote_calls(&host, "influx").await.unwrap_err();
        assert!(matches!(err, ControlError::AssertionFailure(_)));
    }

    #[tokio::test]
    async fn test_peer_without_method_fails_valid_call() {
        let host = host_with_modules(vec![
            ModuleConfig::new("influx", true, &[]),
            ModuleConfig::new("dashboard", false, &["handle_command"]),
        ]);
        let err = test_remote_calls(&host, "influx").await.unwrap_err();
        match err {
            ControlError::Host(e) => assert!(e.is_method_not_found()),
            other => panic!("expected host error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disabled_peer_is_module_unavailable() {
        let host = host_with_modules(vec![ModuleConfig::new("influx", false, &["handle_command"])]);
        let err = test_remote_calls(&host, "influx").await.unwrap_err();
        match err {
            ControlError::Host(e) => assert!(e.is_module_unavailable()),
            other => panic!("expected host error, got {:?}", other),
        }
    }

    #[test]
    fn test_expect_module_unavailable_kinds() {
        assert!(expect_module_unavailable(Err(HostError::ModuleUnavailable("m".into())), "disabled", "m").is_ok());
        assert!(expect_module_unavailable(Ok(json!({})), "disabled", "m").is_err());
        let wrong = HostError::MethodNotFound {
            module: "m".into(),
            method: "x".into(),
        };
        assert!(expect_module_unavailable(Err(wrong), "disabled", "m").is_err());
    }
}
