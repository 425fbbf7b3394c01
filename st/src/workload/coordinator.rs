//! Workload coordinator loop

use std::sync::Arc;

use mgrhost::MgrHost;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::config::WorkloadConfig;
use super::error::WorkloadError;
use super::handle::WorkloadHandle;
use super::metrics::WorkloadMetrics;
use super::registry::DesiredWorkload;
use super::spam::{StopSignal, command_spam};

/// Observable state of the coordinator task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    RunningCommandSpam,
    RunningThrowException,
    ShuttingDown,
}

impl CoordinatorState {
    /// The coordinator never leaves these states
    pub fn is_terminal(&self) -> bool {
        matches!(self, CoordinatorState::RunningThrowException | CoordinatorState::ShuttingDown)
    }
}

/// Long-lived worker that runs whichever workload is currently desired
///
/// The desired workload lives in a single-slot watch channel. Its "changed"
/// flag is the wake signal: writers set it, the coordinator clears it only
/// when it re-reads the slot at the top of the loop.
pub struct WorkloadCoordinator {
    config: WorkloadConfig,
    host: Arc<dyn MgrHost>,
    desired_rx: watch::Receiver<DesiredWorkload>,
    state_tx: watch::Sender<CoordinatorState>,
    metrics: Arc<WorkloadMetrics>,
}

impl WorkloadCoordinator {
    /// Create a coordinator and the handle that controls it
    pub fn new(config: WorkloadConfig, host: Arc<dyn MgrHost>) -> (Self, WorkloadHandle) {
        debug!(?config, "WorkloadCoordinator::new: called");
        let (desired_tx, desired_rx) = watch::channel(DesiredWorkload::None);
        let (state_tx, state_rx) = watch::channel(CoordinatorState::Idle);
        let metrics = Arc::new(WorkloadMetrics::default());

        let handle = WorkloadHandle::new(desired_tx, state_rx, metrics.clone());
        let coordinator = Self {
            config,
            host,
            desired_rx,
            state_tx,
            metrics,
        };
        (coordinator, handle)
    }

    /// Run until a shutdown is requested or the fault workload fires
    ///
    /// Dropping every `WorkloadHandle` counts as a shutdown request.
    pub async fn run(mut self) -> Result<(), WorkloadError> {
        info!("Workload coordinator started");
        loop {
            if self.desired_rx.has_changed().is_err() {
                info!("All workload handles dropped");
                return self.shut_down();
            }

            let desired = *self.desired_rx.borrow_and_update();
            debug!(desired = desired.name(), "WorkloadCoordinator::run: evaluating");

            match desired {
                DesiredWorkload::CommandSpam => {
                    self.set_state(CoordinatorState::RunningCommandSpam);
                    self.metrics.record_workload_started();
                    let stop = StopSignal::new(&self.desired_rx);
                    command_spam(self.host.as_ref(), &self.config, &self.metrics, &stop).await;
                }
                DesiredWorkload::ThrowException => {
                    self.set_state(CoordinatorState::RunningThrowException);
                    self.metrics.record_workload_started();
                    error!("Raising synthetic exception from throw_exception workload");
                    return Err(WorkloadError::FatalFault("Synthetic exception in serve".to_string()));
                }
                DesiredWorkload::Shutdown => return self.shut_down(),
                DesiredWorkload::None => {
                    self.set_state(CoordinatorState::Idle);
                    info!("Waiting for workload request...");
                    if self.desired_rx.changed().await.is_err() {
                        info!("All workload handles dropped");
                        return self.shut_down();
                    }
                }
            }
        }
    }

    fn shut_down(&self) -> Result<(), WorkloadError> {
        self.set_state(CoordinatorState::ShuttingDown);
        info!("Shutting down...");
        Ok(())
    }

    fn set_state(&self, state: CoordinatorState) {
        debug!(?state, "WorkloadCoordinator::set_state: called");
        self.state_tx.send_replace(state);
    }
}
