use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::models::telemetry::TelemetrySample;
use crate::state::AppState;

pub async fn events_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| stream_events(socket, state))
}

pub async fn telemetry_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| ingest_telemetry(socket, state))
}

async fn stream_events(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = BroadcastStream::new(state.dispatcher.subscribe());

    info!("event stream client connected");

    let send_task = tokio::spawn(async move {
        while let Some(next) = events.next().await {
            let event = match next {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "event stream subscriber lagged");
                    continue;
                }
            };

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("event stream client disconnected");
}

async fn ingest_telemetry(mut socket: WebSocket, state: Arc<AppState>) {
    info!("telemetry client connected");

    while let Some(Ok(message)) = socket.recv().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let sample: TelemetrySample = match serde_json::from_str(&text) {
            Ok(sample) => sample,
            Err(err) => {
                warn!(error = %err, "malformed telemetry frame skipped");
                continue;
            }
        };

        if state.telemetry_tx.send(sample).await.is_err() {
            warn!("telemetry queue closed; dropping connection");
            break;
        }
    }

    info!("telemetry client disconnected");
}
