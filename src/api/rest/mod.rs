pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;

use crate::state::AppState;
use crate::storage::{DeliveryRepository, RobotRepository};

/// Operational surface: health, metrics and the two websocket streams.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws/events", get(ws::events_handler))
        .route("/ws/telemetry", get(ws::telemetry_handler))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    robots: usize,
    deliveries: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.dispatcher.store();
    match (store.count_robots().await, store.count_deliveries().await) {
        (Ok(robots), Ok(deliveries)) => Json(HealthResponse {
            status: "ok",
            robots,
            deliveries,
        })
        .into_response(),
        (Err(err), _) | (_, Err(err)) => {
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response()
        }
    }
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
