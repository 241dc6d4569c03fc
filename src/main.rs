use std::sync::Arc;

use robot_dispatch::api;
use robot_dispatch::config::Config;
use robot_dispatch::engine::handlers::run_event_loop;
use robot_dispatch::engine::telemetry::run_telemetry_ingest;
use robot_dispatch::error::AppError;
use robot_dispatch::ports::actuation::LoggingActuator;
use robot_dispatch::ports::routing::StraightLineRouter;
use robot_dispatch::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let router = StraightLineRouter::new(config.robot_speed_mps, config.max_leg_meters)?;
    let (app_state, receivers) =
        AppState::new(&config, Arc::new(router), Arc::new(LoggingActuator));
    let shared_state = Arc::new(app_state);

    tokio::spawn(run_event_loop(
        shared_state.dispatcher.clone(),
        receivers.events,
    ));
    tokio::spawn(run_telemetry_ingest(
        shared_state.dispatcher.clone(),
        receivers.telemetry,
    ));

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        min_battery = config.min_battery_percent,
        "dispatch service started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
