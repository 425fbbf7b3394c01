//! Background workload coordination
//!
//! A single [`WorkloadCoordinator`] task runs whichever workload is currently
//! desired. Control code holds a [`WorkloadHandle`] and rewrites the desired
//! workload; the coordinator picks the change up at its next check.

mod config;
mod coordinator;
mod error;
mod handle;
mod metrics;
mod registry;
mod spam;

pub use config::WorkloadConfig;
pub use coordinator::{CoordinatorState, WorkloadCoordinator};
pub use error::WorkloadError;
pub use handle::WorkloadHandle;
pub use metrics::{MetricsSnapshot, WorkloadMetrics};
pub use registry::{DesiredWorkload, WORKLOADS, Workload};
pub use spam::{StopSignal, command_spam};
