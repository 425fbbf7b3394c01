//! selftest - manager module self-test harness
//!
//! Validates a manager host's module API and exercises background task
//! coordination under controlled conditions.
//!
//! # Core Concepts
//!
//! - **Single-slot desired workload**: control commands overwrite one value
//!   and wake the coordinator; nothing is queued
//! - **Cooperative stop**: a running workload checks for a newer request
//!   between iterations, so a stop lands within one command round-trip
//! - **Supervised failure**: the `throw_exception` workload kills the
//!   coordinator on purpose and the daemon reports it as a health check
//!
//! # Modules
//!
//! - [`workload`] - coordinator loop, handle and workload bodies
//! - [`control`] - administrative command dispatch and the self-test procedure
//! - [`ipc`] - JSON-line control socket between the CLI and the daemon
//! - [`service`] - daemon run loop and coordinator supervision
//! - [`daemon`] - PID and version file management
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod control;
pub mod daemon;
pub mod ipc;
pub mod service;
pub mod workload;

pub use config::Config;
pub use control::{CommandReply, ControlCommand, ControlError, ControlSurface};
pub use service::SelfTestService;
pub use workload::{CoordinatorState, DesiredWorkload, Workload, WorkloadCoordinator, WorkloadError, WorkloadHandle};
