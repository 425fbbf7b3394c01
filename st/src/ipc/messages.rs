//! IPC message types
//!
//! Each message is a single line of JSON followed by `\n`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::control::CommandReply;
use crate::workload::{CoordinatorState, DesiredWorkload, MetricsSnapshot};

/// Requests from the CLI to the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum DaemonMessage {
    /// An administrative command object, `{"prefix": ..., ...}`
    Command { command: Value },

    /// Coordinator state and workload counters
    Status,

    /// Ping to check if daemon is alive
    Ping,

    /// Request daemon to stop gracefully
    Shutdown,
}

/// Responses from the daemon to the CLI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum DaemonResponse {
    /// Acknowledgment
    Ok,

    /// Pong response to ping
    Pong { version: String },

    /// Outcome of a `Command`
    Reply(CommandReply),

    Status(StatusReport),

    /// The request itself could not be processed
    Error { message: String },
}

/// Snapshot of the daemon's workload side
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusReport {
    pub version: String,
    pub state: CoordinatorState,
    pub desired: DesiredWorkload,
    #[serde(rename = "coordinator-alive")]
    pub coordinator_alive: bool,
    /// Why the coordinator stopped, if it failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
    pub metrics: MetricsSnapshot,
}
