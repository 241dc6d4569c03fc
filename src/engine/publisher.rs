use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, warn};

use crate::models::event::DomainEvent;
use crate::observability::metrics::Metrics;
use crate::ports::EventSink;

/// Fans committed events out to the sinks, the choreography handler queue
/// and any live stream subscribers, preserving staged order.
///
/// The handler queue is unbounded since handlers publish into the same queue
/// they drain.
#[derive(Clone)]
pub struct EventPublisher {
    handler_tx: mpsc::UnboundedSender<DomainEvent>,
    stream_tx: broadcast::Sender<DomainEvent>,
    sinks: Vec<Arc<dyn EventSink>>,
    metrics: Metrics,
}

impl EventPublisher {
    pub fn new(
        stream_capacity: usize,
        sinks: Vec<Arc<dyn EventSink>>,
        metrics: Metrics,
    ) -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (handler_tx, handler_rx) = mpsc::unbounded_channel();
        let (stream_tx, _unused_rx) = broadcast::channel(stream_capacity.max(1));

        (
            Self {
                handler_tx,
                stream_tx,
                sinks,
                metrics,
            },
            handler_rx,
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.stream_tx.subscribe()
    }

    /// Called only after the unit of work that produced `events` committed.
    /// Delivery failures are logged; the commit is never undone.
    pub async fn publish_all(&self, events: Vec<DomainEvent>) {
        if events.is_empty() {
            return;
        }

        for sink in &self.sinks {
            if let Err(err) = sink.publish_all(&events).await {
                error!(error = %err, count = events.len(), "event sink rejected batch");
            }
        }

        for event in events {
            self.metrics
                .events_published_total
                .with_label_values(&[event.kind()])
                .inc();
            debug!(event = event.kind(), aggregate_id = %event.aggregate_id(), "event published");

            let _ = self.stream_tx.send(event.clone());
            if self.handler_tx.send(event).is_err() {
                warn!("handler queue closed; event not dispatched to handlers");
            }
        }
    }
}
