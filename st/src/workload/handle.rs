//! Writer side of the workload coordinator

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use super::coordinator::CoordinatorState;
use super::error::WorkloadError;
use super::metrics::{MetricsSnapshot, WorkloadMetrics};
use super::registry::{DesiredWorkload, Workload};

/// Handle for requesting workloads from a running coordinator
///
/// Every write replaces the desired workload and wakes the coordinator.
/// Writes never wait for the coordinator to act on them.
#[derive(Clone)]
pub struct WorkloadHandle {
    desired_tx: Arc<watch::Sender<DesiredWorkload>>,
    state_rx: watch::Receiver<CoordinatorState>,
    metrics: Arc<WorkloadMetrics>,
}

impl WorkloadHandle {
    pub(crate) fn new(
        desired_tx: watch::Sender<DesiredWorkload>,
        state_rx: watch::Receiver<CoordinatorState>,
        metrics: Arc<WorkloadMetrics>,
    ) -> Self {
        Self {
            desired_tx: Arc::new(desired_tx),
            state_rx,
            metrics,
        }
    }

    /// Request `workload`, replacing whatever was desired before
    pub fn start(&self, workload: Workload) {
        debug!(%workload, "WorkloadHandle::start: called");
        self.write(DesiredWorkload::from(workload));
    }

    /// Parse a registry name and request it; unknown names change nothing
    pub fn start_by_name(&self, name: &str) -> Result<Workload, WorkloadError> {
        debug!(%name, "WorkloadHandle::start_by_name: called");
        let workload: Workload = name.parse()?;
        self.start(workload);
        Ok(workload)
    }

    /// Clear the desired workload, returning what was running
    ///
    /// A pending shutdown is left in place.
    pub fn stop(&self) -> Option<Workload> {
        debug!("WorkloadHandle::stop: called");
        let mut stopped = None;
        self.desired_tx.send_if_modified(|desired| match desired.workload() {
            Some(workload) => {
                stopped = Some(workload);
                *desired = DesiredWorkload::None;
                true
            }
            None => false,
        });
        stopped
    }

    pub fn shutdown(&self) {
        debug!("WorkloadHandle::shutdown: called");
        self.write(DesiredWorkload::Shutdown);
    }

    pub fn desired(&self) -> DesiredWorkload {
        *self.desired_tx.borrow()
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state_rx.borrow()
    }

    /// Whether the coordinator task still holds its end of the channel
    pub fn is_coordinator_alive(&self) -> bool {
        !self.desired_tx.is_closed()
    }

    /// Wait until the coordinator publishes a state matching `predicate`
    pub async fn wait_for_state(
        &self,
        predicate: impl FnMut(&CoordinatorState) -> bool,
    ) -> Result<CoordinatorState, WorkloadError> {
        let mut rx = self.state_rx.clone();
        let state = rx
            .wait_for(predicate)
            .await
            .map(|state| *state)
            .map_err(|_| WorkloadError::CoordinatorGone)?;
        Ok(state)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn write(&self, desired: DesiredWorkload) {
        let previous = self.desired_tx.send_replace(desired);
        debug!(previous = previous.name(), desired = desired.name(), "WorkloadHandle::write: replaced");
        if self.desired_tx.is_closed() {
            warn!(desired = desired.name(), "Workload coordinator is not running; request will not be served");
        }
    }
}
