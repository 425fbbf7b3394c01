//! Daemon service: control socket, signals and coordinator supervision

use std::sync::Arc;
use std::time::Duration;

use eyre::Result;
use mgrhost::MgrHost;
use serde_json::json;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::control::{ControlConfig, ControlSurface};
use crate::daemon::VERSION;
use crate::ipc::listener::{read_message_within, send_response};
use crate::ipc::{DaemonMessage, DaemonResponse, REQUEST_READ_TIMEOUT, StatusReport};
use crate::workload::{WorkloadConfig, WorkloadCoordinator, WorkloadError};

/// Health check raised when the coordinator task dies
pub const MODULE_ERROR_CHECK: &str = "MGR_MODULE_ERROR";

type CoordinatorTask = JoinHandle<Result<(), WorkloadError>>;

enum Event {
    Connection(std::io::Result<UnixStream>),
    CoordinatorExit(Result<Result<(), WorkloadError>, JoinError>),
    Shutdown,
}

/// The self-test module as hosted by the daemon
///
/// Owns the coordinator task and the control surface that drives it. A
/// coordinator failure is recorded and reported; control commands keep
/// being served afterwards.
pub struct SelfTestService {
    host: Arc<dyn MgrHost>,
    surface: ControlSurface,
    coordinator: Option<CoordinatorTask>,
    fault: Option<String>,
    shutdown_timeout: Duration,
    request_timeout: Duration,
}

impl SelfTestService {
    /// Spawn the coordinator and build the control surface around it
    pub fn start(host: Arc<dyn MgrHost>, workload: WorkloadConfig, control: ControlConfig) -> Self {
        debug!("SelfTestService::start: called");
        let shutdown_timeout = workload.shutdown_timeout();
        let (coordinator, handle) = WorkloadCoordinator::new(workload, host.clone());
        let task = tokio::spawn(coordinator.run());
        info!("Workload coordinator spawned");

        Self {
            surface: ControlSurface::new(host.clone(), handle, control),
            host,
            coordinator: Some(task),
            fault: None,
            shutdown_timeout,
            request_timeout: REQUEST_READ_TIMEOUT,
        }
    }

    pub fn surface(&self) -> &ControlSurface {
        &self.surface
    }

    /// Why the coordinator died, if it did
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    pub fn status(&self) -> StatusReport {
        let workloads = self.surface.workloads();
        StatusReport {
            version: VERSION.to_string(),
            state: workloads.state(),
            desired: workloads.desired(),
            coordinator_alive: self.coordinator.is_some(),
            fault: self.fault.clone(),
            metrics: workloads.metrics(),
        }
    }

    /// Serve the control socket until `shutdown_rx` fires or a client asks to stop
    pub async fn run(mut self, listener: UnixListener, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        info!("Self-test service running");
        loop {
            let event = tokio::select! {
                accepted = listener.accept() => Event::Connection(accepted.map(|(stream, _)| stream)),
                joined = join_coordinator(&mut self.coordinator) => Event::CoordinatorExit(joined),
                _ = shutdown_rx.recv() => Event::Shutdown,
            };

            match event {
                Event::Connection(Ok(stream)) => {
                    if self.serve_connection(stream).await {
                        info!("Shutdown requested over IPC");
                        break;
                    }
                }
                Event::Connection(Err(e)) => warn!(error = %e, "Failed to accept IPC connection"),
                Event::CoordinatorExit(joined) => {
                    self.coordinator = None;
                    self.on_coordinator_exit(joined).await;
                }
                Event::Shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }
        self.shutdown().await;
        Ok(())
    }

    /// Handle one request; returns true if the client asked the daemon to stop
    pub async fn serve_connection(&self, mut stream: UnixStream) -> bool {
        let (response, stop) = match read_message_within(&mut stream, self.request_timeout).await {
            Ok(msg) => self.dispatch(msg).await,
            Err(e) => {
                warn!(error = %e, "Rejected IPC request");
                (
                    DaemonResponse::Error {
                        message: e.to_string(),
                    },
                    false,
                )
            }
        };
        if let Err(e) = send_response(&mut stream, &response).await {
            warn!(error = %e, "Failed to send IPC response");
        }
        stop
    }

    async fn dispatch(&self, msg: DaemonMessage) -> (DaemonResponse, bool) {
        debug!(?msg, "SelfTestService::dispatch: called");
        match msg {
            DaemonMessage::Command { command } => (DaemonResponse::Reply(self.surface.handle_json(command).await), false),
            DaemonMessage::Status => (DaemonResponse::Status(self.status()), false),
            DaemonMessage::Ping => (
                DaemonResponse::Pong {
                    version: VERSION.to_string(),
                },
                false,
            ),
            DaemonMessage::Shutdown => (DaemonResponse::Ok, true),
        }
    }

    /// Record how the coordinator ended and raise a health check if it failed
    async fn on_coordinator_exit(&mut self, joined: Result<Result<(), WorkloadError>, JoinError>) {
        let reason = match joined {
            Ok(Ok(())) => {
                info!("Workload coordinator exited");
                return;
            }
            Ok(Err(e)) if e.is_fatal() => e.to_string(),
            Ok(Err(e)) => format!("Workload coordinator stopped unexpectedly: {}", e),
            Err(e) if e.is_panic() => format!("Workload coordinator panicked: {}", e),
            Err(e) => format!("Workload coordinator was cancelled: {}", e),
        };

        error!(%reason, "Workload coordinator failed");
        let checks = json!({
            MODULE_ERROR_CHECK: {
                "severity": "error",
                "summary": "Module 'selftest' has failed",
                "detail": [reason],
            }
        });
        if let Err(e) = self.host.set_health_checks(checks).await {
            warn!(error = %e, "Failed to raise module error health check");
        }
        self.fault = Some(reason);
    }

    /// Ask the coordinator to exit and wait for it, bounded by the shutdown timeout
    pub async fn shutdown(mut self) {
        info!("Shutting down self-test service");
        self.surface.shutdown();

        let Some(mut task) = self.coordinator.take() else {
            return;
        };
        match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
            Ok(joined) => self.on_coordinator_exit(joined).await,
            Err(_) => {
                warn!(timeout = ?self.shutdown_timeout, "Coordinator did not exit in time, aborting it");
                task.abort();
            }
        }
    }
}

/// Wait for the coordinator task; pends forever once it has been reaped
async fn join_coordinator(task: &mut Option<CoordinatorTask>) -> Result<Result<(), WorkloadError>, JoinError> {
    match task {
        Some(task) => task.await,
        None => std::future::pending().await,
    }
}
