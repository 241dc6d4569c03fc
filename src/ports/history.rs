use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::EventSink;
use crate::error::AppError;
use crate::models::event::DomainEvent;

/// Append-only record of every published event.
#[derive(Debug, Default)]
pub struct EventHistory {
    events: RwLock<Vec<DomainEvent>>,
}

impl EventHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<DomainEvent> {
        self.events.read().await.clone()
    }

    /// Events produced by one aggregate, oldest first.
    pub async fn for_aggregate(&self, aggregate_id: Uuid) -> Vec<DomainEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|event| event.aggregate_id() == aggregate_id)
            .cloned()
            .collect()
    }

    pub async fn kinds_for(&self, aggregate_id: Uuid) -> Vec<&'static str> {
        self.for_aggregate(aggregate_id)
            .await
            .iter()
            .map(DomainEvent::kind)
            .collect()
    }
}

#[async_trait]
impl EventSink for EventHistory {
    async fn publish_all(&self, events: &[DomainEvent]) -> Result<(), AppError> {
        self.events.write().await.extend_from_slice(events);
        Ok(())
    }
}
