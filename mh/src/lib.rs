//! MgrHost - the manager host API a module runs against
//!
//! A module inside the manager daemon only ever sees the host through the
//! [`MgrHost`] trait: named cluster objects, config, a small key/value store,
//! perf counters, command submission and calls into other modules.
//!
//! [`MemoryHost`] implements the trait in-process over a simulated cluster so
//! modules can be exercised without a running cluster.
//!
//! # Modules
//!
//! - [`api`] - the `MgrHost` trait
//! - [`cluster`] - OSD map and crush snapshots
//! - [`command`] - command results with a waitable handle
//! - [`store`] - ordered key/value store with prefix scans
//! - [`memory`] - simulated host

pub mod api;
pub mod cluster;
pub mod command;
pub mod config;
mod error;
pub mod memory;
pub mod store;

pub use api::MgrHost;
pub use cluster::{CrushBucket, CrushDevice, CrushMap, CrushRule, Incremental, OsdInfo, OsdMap};
pub use command::{CommandOutput, CommandResult};
pub use config::{HostConfig, ModuleConfig};
pub use error::HostError;
pub use memory::{HOST_VERSION, MemoryHost};
pub use store::KvStore;
