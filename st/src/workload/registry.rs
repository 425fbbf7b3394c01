//! Recognized workloads and the desired-workload slot value

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::WorkloadError;

/// A background workload that can be requested by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workload {
    /// Submit a stream of random reweight commands
    CommandSpam,
    /// Raise an unrecoverable fault inside the coordinator
    ThrowException,
}

/// Every workload `start` accepts
pub const WORKLOADS: [Workload; 2] = [Workload::CommandSpam, Workload::ThrowException];

impl Workload {
    pub fn name(&self) -> &'static str {
        match self {
            Workload::CommandSpam => "command_spam",
            Workload::ThrowException => "throw_exception",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Workload::CommandSpam => "Submit random OSD reweight commands back to back",
            Workload::ThrowException => "Crash the workload coordinator with a synthetic fault",
        }
    }

    /// Comma separated list of registered names
    pub fn names() -> String {
        WORKLOADS.iter().map(Workload::name).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Workload {
    type Err = WorkloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WORKLOADS
            .into_iter()
            .find(|w| w.name() == s)
            .ok_or_else(|| WorkloadError::UnknownWorkload(s.to_string()))
    }
}

/// Value of the single desired-workload slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesiredWorkload {
    #[default]
    None,
    CommandSpam,
    ThrowException,
    Shutdown,
}

impl DesiredWorkload {
    /// The requested workload, if the slot holds one
    pub fn workload(&self) -> Option<Workload> {
        match self {
            DesiredWorkload::CommandSpam => Some(Workload::CommandSpam),
            DesiredWorkload::ThrowException => Some(Workload::ThrowException),
            DesiredWorkload::None | DesiredWorkload::Shutdown => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DesiredWorkload::None => "none",
            DesiredWorkload::Shutdown => "shutdown",
            DesiredWorkload::CommandSpam => Workload::CommandSpam.name(),
            DesiredWorkload::ThrowException => Workload::ThrowException.name(),
        }
    }
}

impl From<Workload> for DesiredWorkload {
    fn from(workload: Workload) -> Self {
        match workload {
            Workload::CommandSpam => DesiredWorkload::CommandSpam,
            Workload::ThrowException => DesiredWorkload::ThrowException,
        }
    }
}
