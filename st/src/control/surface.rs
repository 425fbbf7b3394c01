//! Dispatch of administrative commands

use std::sync::Arc;

use mgrhost::MgrHost;
use nix::errno::Errno;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::command::{CommandReply, ControlCommand};
use super::config::ControlConfig;
use super::error::ControlError;
use super::remote::test_remote_calls;
use super::selftest::SelfTest;
use crate::workload::WorkloadHandle;

/// Entry point for administrative commands
///
/// Self-test, config and remote commands run to completion on the caller's
/// task. Workload commands only rewrite the coordinator's desired workload
/// and return immediately.
#[derive(Clone)]
pub struct ControlSurface {
    host: Arc<dyn MgrHost>,
    workloads: WorkloadHandle,
    config: ControlConfig,
}

impl ControlSurface {
    pub fn new(host: Arc<dyn MgrHost>, workloads: WorkloadHandle, config: ControlConfig) -> Self {
        debug!(?config, "ControlSurface::new: called");
        Self {
            host,
            workloads,
            config,
        }
    }

    pub fn workloads(&self) -> &WorkloadHandle {
        &self.workloads
    }

    /// Run a command and turn its outcome into a reply
    pub async fn handle(&self, command: ControlCommand) -> CommandReply {
        let prefix = command.prefix();
        debug!(%prefix, "ControlSurface::handle: called");
        let result = match command {
            ControlCommand::SelfTestRun => self
                .run_self_test()
                .await
                .map(|()| CommandReply::ok("", "Self-test succeeded")),
            ControlCommand::BackgroundStart { workload } => {
                self.start_background(&workload).map(|msg| CommandReply::ok("", msg))
            }
            ControlCommand::BackgroundStop => Ok(CommandReply::ok("", self.stop_background())),
            ControlCommand::ConfigGet { key } => self.get_config(&key).await.map(|v| CommandReply::ok(v, "")),
            ControlCommand::ConfigGetLocalized { key } => {
                self.get_localized_config(&key).await.map(|v| CommandReply::ok(v, ""))
            }
            ControlCommand::Remote => self
                .test_remote_call()
                .await
                .map(|()| CommandReply::ok("", "Successfully called")),
        };

        result.unwrap_or_else(|e| {
            warn!(%prefix, error = %e, "Command failed");
            CommandReply::error(e.errno(), e.to_string())
        })
    }

    /// Decode a raw command object and run it
    ///
    /// Unknown prefixes and malformed arguments become `-EINVAL` replies.
    pub async fn handle_json(&self, command: Value) -> CommandReply {
        let prefix = command
            .get("prefix")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match serde_json::from_value::<ControlCommand>(command) {
            Ok(command) => self.handle(command).await,
            Err(e) if ControlCommand::is_known_prefix(&prefix) => {
                debug!(%prefix, error = %e, "ControlSurface::handle_json: bad arguments");
                CommandReply::error(-(Errno::EINVAL as i32), format!("Invalid arguments for '{}': {}", prefix, e))
            }
            Err(e) => {
                debug!(%prefix, error = %e, "ControlSurface::handle_json: rejected");
                CommandReply::error(-(Errno::EINVAL as i32), format!("Command not found '{}'", prefix))
            }
        }
    }

    pub async fn run_self_test(&self) -> Result<(), ControlError> {
        debug!("ControlSurface::run_self_test: called");
        SelfTest::new(self.host.as_ref(), &self.config.test_uri).run().await
    }

    /// Request a workload by name, returning the confirmation message
    pub fn start_background(&self, name: &str) -> Result<String, ControlError> {
        debug!(%name, "ControlSurface::start_background: called");
        let workload = self
            .workloads
            .start_by_name(name)
            .map_err(|e| ControlError::InvalidArgument(e.to_string()))?;
        info!(%workload, "Background workload requested");
        Ok(format!("Running `{}` in background", workload))
    }

    /// Clear the desired workload; never fails
    pub fn stop_background(&self) -> String {
        debug!("ControlSurface::stop_background: called");
        match self.workloads.stop() {
            Some(workload) => {
                info!(%workload, "Background workload stop requested");
                format!("Stopping background workload `{}`", workload)
            }
            None => "No background workload was running".to_string(),
        }
    }

    /// Module config value as text; empty when unset
    pub async fn get_config(&self, key: &str) -> Result<String, ControlError> {
        debug!(%key, "ControlSurface::get_config: called");
        Ok(self.host.get_config(key).await?.unwrap_or_default())
    }

    pub async fn get_localized_config(&self, key: &str) -> Result<String, ControlError> {
        debug!(%key, "ControlSurface::get_localized_config: called");
        Ok(self.host.get_localized_config(key).await?.unwrap_or_default())
    }

    pub async fn test_remote_call(&self) -> Result<(), ControlError> {
        debug!("ControlSurface::test_remote_call: called");
        test_remote_calls(self.host.as_ref(), &self.config.peer_module).await
    }

    /// Ask the coordinator to exit; returns without waiting for it
    pub fn shutdown(&self) {
        info!("Requesting workload coordinator shutdown");
        self.workloads.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::{DesiredWorkload, WorkloadConfig, WorkloadCoordinator};
    use mgrhost::{HostConfig, KvStore, MemoryHost};
    use serde_json::json;

    fn surface() -> (ControlSurface, MemoryHost) {
        let host = MemoryHost::with_store(
            HostConfig {
                command_latency_ms: 1,
                ..Default::default()
            },
            KvStore::in_memory(),
        );
        let shared: Arc<dyn MgrHost> = Arc::new(host.clone());
        let (_coordinator, handle) = WorkloadCoordinator::new(WorkloadConfig::default(), shared.clone());
        (ControlSurface::new(shared, handle, ControlConfig::default()), host)
    }

    #[tokio::test]
    async fn test_start_unknown_workload() {
        let (surface, _host) = surface();
        let reply = surface
            .handle(ControlCommand::BackgroundStart {
                workload: "bogus".to_string(),
            })
            .await;
        assert_eq!(reply.code, -22);
        assert_eq!(reply.stderr, "Workload not found 'bogus'");
        assert_eq!(surface.workloads().desired(), DesiredWorkload::None);

        let err = surface.start_background("bogus").unwrap_err();
        assert!(matches!(err, ControlError::InvalidArgument(_)), "got {:?}", err);
        assert_eq!(surface.workloads().desired(), DesiredWorkload::None);
    }

    #[tokio::test]
    async fn test_start_and_stop_messages() {
        let (surface, _host) = surface();
        let reply = surface
            .handle(ControlCommand::BackgroundStart {
                workload: "command_spam".to_string(),
            })
            .await;
        assert_eq!(reply, CommandReply::ok("", "Running `command_spam` in background"));
        assert_eq!(surface.workloads().desired(), DesiredWorkload::CommandSpam);

        let reply = surface.handle(ControlCommand::BackgroundStop).await;
        assert_eq!(reply, CommandReply::ok("", "Stopping background workload `command_spam`"));

        let reply = surface.handle(ControlCommand::BackgroundStop).await;
        assert_eq!(reply, CommandReply::ok("", "No background workload was running"));
    }

    #[tokio::test]
    async fn test_config_get_variants() {
        let (surface, host) = surface();
        host.set_config("testkey", "plain").await.unwrap();
        host.set_localized_config("testlkey", "local").await.unwrap();

        let reply = surface.handle(ControlCommand::ConfigGet { key: "testkey".into() }).await;
        assert_eq!(reply.stdout, "plain");

        let reply = surface
            .handle(ControlCommand::ConfigGetLocalized { key: "testlkey".into() })
            .await;
        assert_eq!(reply.stdout, "local");

        let reply = surface
            .handle(ControlCommand::ConfigGetLocalized { key: "testkey".into() })
            .await;
        assert_eq!(reply.stdout, "plain");

        let reply = surface.handle(ControlCommand::ConfigGet { key: "unset".into() }).await;
        assert!(reply.is_success());
        assert_eq!(reply.stdout, "");
    }

    #[tokio::test]
    async fn test_self_test_and_remote_replies() {
        let (surface, _host) = surface();
        let reply = surface.handle(ControlCommand::SelfTestRun).await;
        assert_eq!(reply, CommandReply::ok("", "Self-test succeeded"));

        let reply = surface.handle(ControlCommand::Remote).await;
        assert_eq!(reply, CommandReply::ok("", "Successfully called"));
    }

    #[tokio::test]
    async fn test_handle_json_unknown_prefix() {
        let (surface, _host) = surface();
        let reply = surface.handle_json(json!({"prefix": "self-test fly"})).await;
        assert_eq!(reply.code, -22);
        assert_eq!(reply.stderr, "Command not found 'self-test fly'");

        let reply = surface
            .handle_json(json!({"prefix": "self-test config get", "key": "testkey"}))
            .await;
        assert!(reply.is_success());
    }

    #[tokio::test]
    async fn test_handle_json_missing_argument() {
        let (surface, _host) = surface();
        let reply = surface
            .handle_json(json!({"prefix": "self-test background start"}))
            .await;
        assert_eq!(reply.code, -22);
        assert!(reply.stderr.starts_with("Invalid arguments for 'self-test background start'"));
        assert!(reply.stderr.contains("workload"), "stderr: {}", reply.stderr);
        assert_eq!(surface.workloads().desired(), DesiredWorkload::None);

        let reply = surface
            .handle_json(json!({"prefix": "self-test config get", "key": 7}))
            .await;
        assert_eq!(reply.code, -22);
        assert!(reply.stderr.starts_with("Invalid arguments for 'self-test config get'"));
    }

    #[tokio::test]
    async fn test_shutdown_overrides_workload() {
        let (surface, _host) = surface();
        surface.start_background("command_spam").unwrap();
        surface.shutdown();
        assert_eq!(surface.workloads().desired(), DesiredWorkload::Shutdown);
        assert_eq!(surface.stop_background(), "No background workload was running");
    }
}
