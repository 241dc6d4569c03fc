use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::engine::assignment::AssignmentService;
use crate::engine::dispatcher::Dispatcher;
use crate::engine::publisher::EventPublisher;
use crate::models::event::DomainEvent;
use crate::models::telemetry::TelemetrySample;
use crate::observability::metrics::Metrics;
use crate::ports::history::EventHistory;
use crate::ports::{EventSink, RobotActuator, RouteFinder};
use crate::storage::memory::InMemoryStore;

pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub history: Arc<EventHistory>,
    pub telemetry_tx: mpsc::Sender<TelemetrySample>,
    pub metrics: Metrics,
}

/// Queue ends the background loops consume.
pub struct Receivers {
    pub events: mpsc::UnboundedReceiver<DomainEvent>,
    pub telemetry: mpsc::Receiver<TelemetrySample>,
}

impl AppState {
    pub fn new(
        config: &Config,
        router: Arc<dyn RouteFinder>,
        actuator: Arc<dyn RobotActuator>,
    ) -> (Self, Receivers) {
        let metrics = Metrics::new();
        let history = Arc::new(EventHistory::new());
        let sinks: Vec<Arc<dyn EventSink>> = vec![history.clone()];

        let (publisher, event_rx) =
            EventPublisher::new(config.event_buffer_size, sinks, metrics.clone());
        let (telemetry_tx, telemetry_rx) = mpsc::channel(config.telemetry_queue_size.max(1));

        let dispatcher = Dispatcher::new(
            Arc::new(InMemoryStore::new()),
            router,
            actuator,
            publisher,
            AssignmentService::new(config.min_battery_percent),
            metrics.clone(),
            config.max_commit_retries,
        );

        (
            Self {
                dispatcher: Arc::new(dispatcher),
                history,
                telemetry_tx,
                metrics,
            },
            Receivers {
                events: event_rx,
                telemetry: telemetry_rx,
            },
        )
    }
}
