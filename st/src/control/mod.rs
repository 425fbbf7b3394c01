//! Control surface for the self-test module
//!
//! Translates administrative commands into synchronous host API checks or
//! into requests for the workload coordinator.

mod command;
mod config;
mod error;
mod remote;
mod selftest;
mod surface;

pub use command::{CommandReply, ControlCommand};
pub use config::ControlConfig;
pub use error::ControlError;
pub use remote::test_remote_calls;
pub use selftest::{CLUSTER_OBJECTS, MODULE_OPTIONS, SelfTest};
pub use surface::ControlSurface;
