//! The `command_spam` workload body

use mgrhost::{CommandOutput, HostError, MgrHost};
use rand::Rng;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::config::WorkloadConfig;
use super::metrics::WorkloadMetrics;
use super::registry::DesiredWorkload;

/// Stop condition observed by a running workload body
///
/// Set once the desired workload has been rewritten since the coordinator
/// last read it, or once every writer has gone away. Checking does not
/// clear it; the coordinator clears it when it re-reads the slot.
pub struct StopSignal<'a> {
    rx: &'a watch::Receiver<DesiredWorkload>,
}

impl<'a> StopSignal<'a> {
    pub fn new(rx: &'a watch::Receiver<DesiredWorkload>) -> Self {
        Self { rx }
    }

    pub fn is_set(&self) -> bool {
        self.rx.has_changed().unwrap_or(true)
    }
}

/// Submit random reweight commands one at a time until `stop` is set
///
/// Failed iterations are logged and followed by a short backoff; they never
/// end the workload.
pub async fn command_spam(
    host: &dyn MgrHost,
    config: &WorkloadConfig,
    metrics: &WorkloadMetrics,
    stop: &StopSignal<'_>,
) {
    info!("Starting command_spam workload...");
    while !stop.is_set() {
        metrics.record_iteration();
        match reweight_once(host, &config.command_target, metrics).await {
            Ok(output) => {
                metrics.record_completed();
                debug!(outs = %output.outs, "command_spam: command completed");
            }
            Err(e) => {
                metrics.record_failed();
                warn!(error = %e, "command_spam: iteration failed");
                tokio::time::sleep(config.error_backoff()).await;
            }
        }
    }
    info!("Ended command_spam workload...");
}

async fn reweight_once(host: &dyn MgrHost, target: &str, metrics: &WorkloadMetrics) -> Result<CommandOutput, HostError> {
    let osdmap = host.get_osdmap().await?;
    let (id, weight) = pick_reweight(osdmap.osds().len());
    debug!(%id, %weight, "reweight_once: submitting");

    let command = json!({
        "prefix": "osd reweight",
        "id": id,
        "weight": weight,
    });
    let result = host.send_command(target, command).await?;
    metrics.record_submitted();
    result.wait().await?.into_result()
}

/// Random OSD index in `0..osd_count` (0 for an empty map) and weight in `[0, 1)`
fn pick_reweight(osd_count: usize) -> (usize, f64) {
    let mut rng = rand::rng();
    let id = if osd_count == 0 { 0 } else { rng.random_range(0..osd_count) };
    (id, rng.random::<f64>())
}
