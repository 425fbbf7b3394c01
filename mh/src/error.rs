//! Host API error types

use nix::errno::Errno;
use thiserror::Error;

/// Errors surfaced by the manager host API
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Module '{0}' is not available")]
    ModuleUnavailable(String),

    #[error("Method '{method}' not found on module '{module}'")]
    MethodNotFound { module: String, method: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Command failed ({code}): {message}")]
    CommandFailed { code: i32, message: String },

    #[error("Command result dropped before completion")]
    CommandDropped,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HostError {
    /// Check if this is the "module unavailable" failure of a cross-module call
    pub fn is_module_unavailable(&self) -> bool {
        matches!(self, HostError::ModuleUnavailable(_))
    }

    /// Check if this is the "method not found" failure of a cross-module call
    pub fn is_method_not_found(&self) -> bool {
        matches!(self, HostError::MethodNotFound { .. })
    }

    /// Negative errno used when this error becomes a command status code
    pub fn errno(&self) -> i32 {
        match self {
            HostError::ModuleUnavailable(_) => -(Errno::ENOENT as i32),
            HostError::MethodNotFound { .. } => -(Errno::ENOSYS as i32),
            HostError::NotFound(_) => -(Errno::ENOENT as i32),
            HostError::Invalid(_) => -(Errno::EINVAL as i32),
            HostError::CommandFailed { code, .. } => *code,
            HostError::CommandDropped => -(Errno::EPIPE as i32),
            HostError::Io(_) => -(Errno::EIO as i32),
            HostError::Json(_) => -(Errno::EINVAL as i32),
        }
    }
}
