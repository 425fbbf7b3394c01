//! Asynchronous command submission results

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::debug;

use super::error::HostError;

/// Completed command: return code, output buffer and status string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub code: i32,
    pub outb: String,
    pub outs: String,
}

impl CommandOutput {
    /// Successful completion
    pub fn ok(outb: impl Into<String>, outs: impl Into<String>) -> Self {
        Self {
            code: 0,
            outb: outb.into(),
            outs: outs.into(),
        }
    }

    /// Failed completion with a negative errno
    pub fn error(code: i32, outs: impl Into<String>) -> Self {
        Self {
            code,
            outb: String::new(),
            outs: outs.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Turn a non-zero return code into a `CommandFailed` error
    pub fn into_result(self) -> Result<Self, HostError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(HostError::CommandFailed {
                code: self.code,
                message: self.outs,
            })
        }
    }
}

/// Handle to a submitted command
///
/// The command runs on the host; `wait` suspends until it completes.
#[derive(Debug)]
pub struct CommandResult {
    tag: String,
    rx: oneshot::Receiver<CommandOutput>,
}

impl CommandResult {
    /// Create a result handle and the sender the host completes it with
    pub fn channel(tag: impl Into<String>) -> (oneshot::Sender<CommandOutput>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { tag: tag.into(), rx })
    }

    /// Tag the host assigned to the submission
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Wait for the command to complete
    pub async fn wait(self) -> Result<CommandOutput, HostError> {
        debug!(tag = %self.tag, "CommandResult::wait: called");
        let output = self.rx.await.map_err(|_| HostError::CommandDropped)?;
        debug!(tag = %self.tag, code = output.code, "CommandResult::wait: completed");
        Ok(output)
    }
}
