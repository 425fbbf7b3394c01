//! Counters for workload activity

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters shared between the coordinator and its handles
#[derive(Debug, Default)]
pub struct WorkloadMetrics {
    workloads_started: AtomicU64,
    spam_iterations: AtomicU64,
    commands_submitted: AtomicU64,
    commands_completed: AtomicU64,
    commands_failed: AtomicU64,
}

impl WorkloadMetrics {
    pub(crate) fn record_workload_started(&self) {
        self.workloads_started.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_iteration(&self) {
        self.spam_iterations.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_submitted(&self) {
        self.commands_submitted.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_completed(&self) {
        self.commands_completed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_failed(&self) {
        self.commands_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            workloads_started: self.workloads_started.load(Ordering::SeqCst),
            spam_iterations: self.spam_iterations.load(Ordering::SeqCst),
            commands_submitted: self.commands_submitted.load(Ordering::SeqCst),
            commands_completed: self.commands_completed.load(Ordering::SeqCst),
            commands_failed: self.commands_failed.load(Ordering::SeqCst),
        }
    }
}

/// Point-in-time copy of `WorkloadMetrics`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(rename = "workloads-started")]
    pub workloads_started: u64,
    #[serde(rename = "spam-iterations")]
    pub spam_iterations: u64,
    #[serde(rename = "commands-submitted")]
    pub commands_submitted: u64,
    #[serde(rename = "commands-completed")]
    pub commands_completed: u64,
    #[serde(rename = "commands-failed")]
    pub commands_failed: u64,
}
