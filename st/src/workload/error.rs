//! Workload coordinator errors

use thiserror::Error;

/// Errors from the workload coordinator and its handle
#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("Workload not found '{0}'")]
    UnknownWorkload(String),

    /// Deliberate, unrecoverable failure of the coordinator task
    #[error("Fatal fault in workload coordinator: {0}")]
    FatalFault(String),

    #[error("Workload coordinator is no longer running")]
    CoordinatorGone,
}

impl WorkloadError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkloadError::FatalFault(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_fatal_fault_is_fatal() {
        assert!(WorkloadError::FatalFault("boom".into()).is_fatal());
        assert!(!WorkloadError::CoordinatorGone.is_fatal());
        assert!(!WorkloadError::UnknownWorkload("bogus".into()).is_fatal());
    }
}
