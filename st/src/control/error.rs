//! Control surface errors

use mgrhost::HostError;
use nix::errno::Errno;
use thiserror::Error;

use crate::workload::WorkloadError;

/// Failure of a control command, reported back to the caller as a reply code
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("{0}")]
    InvalidArgument(String),

    /// A self-test check did not hold
    #[error("{0}")]
    AssertionFailure(String),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Workload(#[from] WorkloadError),
}

impl ControlError {
    pub(crate) fn assertion(message: impl Into<String>) -> Self {
        ControlError::AssertionFailure(message.into())
    }

    /// Negative errno reported as the command reply code
    pub fn errno(&self) -> i32 {
        match self {
            ControlError::InvalidArgument(_) => -(Errno::EINVAL as i32),
            ControlError::AssertionFailure(_) => -(Errno::EIO as i32),
            ControlError::Host(e) => e.errno(),
            ControlError::Workload(WorkloadError::UnknownWorkload(_)) => -(Errno::EINVAL as i32),
            ControlError::Workload(_) => -(Errno::EIO as i32),
        }
    }
}
