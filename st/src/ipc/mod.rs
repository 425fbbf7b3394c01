//! Control channel between the `st` CLI and the self-test daemon
//!
//! Unix Domain Socket carrying one JSON request line and one JSON response
//! line per connection.

use std::path::PathBuf;
use std::time::Duration;

pub mod client;
pub mod listener;
pub mod messages;

pub use client::DaemonClient;
pub use messages::{DaemonMessage, DaemonResponse, StatusReport};

/// Largest request or response line accepted on the socket
pub(crate) const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// How long the daemon waits for a connected client to send its request
pub const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Default socket path for daemon IPC
///
/// Uses the same base directory as the PID and version files.
pub fn get_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("selftest")
        .join("daemon.sock")
}
