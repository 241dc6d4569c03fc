use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::engine::dispatcher::Dispatcher;
use crate::models::telemetry::TelemetrySample;

/// Applies samples in arrival order. Each sample commits only its robot.
pub async fn run_telemetry_ingest(
    dispatcher: Arc<Dispatcher>,
    mut telemetry_rx: mpsc::Receiver<TelemetrySample>,
) {
    info!("telemetry ingest started");

    while let Some(sample) = telemetry_rx.recv().await {
        let robot_id = sample.robot_id;
        if let Err(err) = dispatcher.ingest_telemetry(sample).await {
            warn!(robot_id = %robot_id, error = %err, "telemetry sample rejected");
        }
    }

    warn!("telemetry ingest stopped: channel closed");
}
