//! IPC client used by the CLI

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result, eyre};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use super::messages::{DaemonMessage, DaemonResponse, StatusReport};
use super::{MAX_MESSAGE_SIZE, get_socket_path};
use crate::control::{CommandReply, ControlCommand};

/// Default timeout for connecting and writing
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Replies wait this long; `self-test run` walks the whole host API
const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for communicating with the daemon via IPC
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
    reply_timeout: Duration,
}

impl Default for DaemonClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DaemonClient {
    /// Create a new client with the default socket path
    pub fn new() -> Self {
        Self::with_socket_path(get_socket_path())
    }

    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    /// Set a custom timeout for connect, write and read
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.reply_timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Check if the daemon socket exists
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Run an administrative command in the daemon
    pub async fn command(&self, command: &ControlCommand) -> Result<CommandReply> {
        debug!(prefix = command.prefix(), "DaemonClient: sending command");
        let command = serde_json::to_value(command).context("Failed to serialize command")?;
        match self.send_message(DaemonMessage::Command { command }).await? {
            DaemonResponse::Reply(reply) => Ok(reply),
            DaemonResponse::Error { message } => Err(eyre!("Daemon error: {}", message)),
            other => Err(eyre!("Unexpected response: {:?}", other)),
        }
    }

    /// Fetch coordinator state and workload counters
    pub async fn status(&self) -> Result<StatusReport> {
        debug!("DaemonClient: requesting status");
        match self.send_message(DaemonMessage::Status).await? {
            DaemonResponse::Status(report) => Ok(report),
            DaemonResponse::Error { message } => Err(eyre!("Daemon error: {}", message)),
            other => Err(eyre!("Unexpected response: {:?}", other)),
        }
    }

    /// Check if daemon is alive and get its version
    pub async fn ping(&self) -> Result<String> {
        debug!("DaemonClient: pinging daemon");
        match self.send_message(DaemonMessage::Ping).await? {
            DaemonResponse::Pong { version } => Ok(version),
            DaemonResponse::Error { message } => Err(eyre!("Daemon error: {}", message)),
            other => Err(eyre!("Unexpected response: {:?}", other)),
        }
    }

    /// Request daemon to shutdown gracefully
    pub async fn shutdown(&self) -> Result<()> {
        debug!("DaemonClient: requesting daemon shutdown");
        match self.send_message(DaemonMessage::Shutdown).await? {
            DaemonResponse::Ok => Ok(()),
            DaemonResponse::Error { message } => Err(eyre!("Daemon error: {}", message)),
            other => Err(eyre!("Unexpected response: {:?}", other)),
        }
    }

    /// Send a message to the daemon and wait for response
    async fn send_message(&self, msg: DaemonMessage) -> Result<DaemonResponse> {
        debug!(?self.socket_path, ?msg, "DaemonClient: sending message");

        let stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to daemon socket")?;

        self.send_on_stream(stream, msg).await
    }

    async fn send_on_stream(&self, mut stream: UnixStream, msg: DaemonMessage) -> Result<DaemonResponse> {
        let msg_json = serde_json::to_string(&msg).context("Failed to serialize message")?;
        if msg_json.len() > MAX_MESSAGE_SIZE {
            return Err(eyre!("Message too large: {} bytes", msg_json.len()));
        }

        tokio::time::timeout(self.timeout, async {
            stream
                .write_all(msg_json.as_bytes())
                .await
                .context("Failed to write message")?;
            stream.write_all(b"\n").await.context("Failed to write newline")?;
            stream.flush().await.context("Failed to flush stream")?;
            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Write timeout")??;

        let mut reader = BufReader::new(&mut stream);
        let mut response_line = String::new();

        tokio::time::timeout(self.reply_timeout, async {
            let bytes_read = reader
                .read_line(&mut response_line)
                .await
                .context("Failed to read response")?;

            if bytes_read > MAX_MESSAGE_SIZE {
                return Err(eyre!("Response too large: {} bytes", bytes_read));
            }
            if bytes_read == 0 {
                return Err(eyre!("Daemon closed the connection without replying"));
            }

            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Read timeout")??;

        let response: DaemonResponse =
            serde_json::from_str(response_line.trim()).context("Failed to parse daemon response")?;

        debug!(?response, "DaemonClient: received response");
        Ok(response)
    }
}
