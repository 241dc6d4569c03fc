use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinate;
use crate::models::route::RouteEstimate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DestinationType {
    Pickup,
    Delivery,
    Return,
}

/// Immutable domain fact. Serialized with a `type` discriminant so history
/// consumers can switch on the kind without knowing the Rust type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    DeliveryCreated {
        delivery_id: Uuid,
        pickup: Coordinate,
    },
    DeliveryRobotAssigned {
        delivery_id: Uuid,
        robot_id: Uuid,
        route: RouteEstimate,
    },
    DeliveryApproaching {
        delivery_id: Uuid,
        robot_id: Option<Uuid>,
        destination_type: DestinationType,
    },
    DeliveryArrived {
        delivery_id: Uuid,
        robot_id: Option<Uuid>,
        destination_type: DestinationType,
    },
    DeliveryDoorOpened {
        delivery_id: Uuid,
        robot_id: Option<Uuid>,
        destination_type: DestinationType,
    },
    DeliveryStarted {
        delivery_id: Uuid,
        robot_id: Option<Uuid>,
    },
    DeliveryCompleted {
        delivery_id: Uuid,
        robot_id: Option<Uuid>,
    },
    DeliveryReturnStarted {
        delivery_id: Uuid,
        robot_id: Option<Uuid>,
    },
    DeliveryReturnCompleted {
        delivery_id: Uuid,
        robot_id: Option<Uuid>,
    },
    DeliveryCanceled {
        delivery_id: Uuid,
        robot_id: Option<Uuid>,
        requires_return: bool,
    },
    DeliveryRobotUnassigned {
        delivery_id: Uuid,
        robot_id: Uuid,
    },
    DeliveryRobotReassigned {
        delivery_id: Uuid,
        previous_robot_id: Uuid,
        new_robot_id: Uuid,
    },
    RobotBecameAvailable {
        robot_id: Uuid,
    },
    RobotDestinationChanged {
        robot_id: Uuid,
        delivery_id: Option<Uuid>,
        destination: Coordinate,
    },
    RobotApproaching {
        robot_id: Uuid,
        delivery_id: Option<Uuid>,
        destination: Coordinate,
    },
    RobotArrived {
        robot_id: Uuid,
        delivery_id: Option<Uuid>,
        destination: Coordinate,
    },
}

impl DomainEvent {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            payload,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    /// Identity of the aggregate that produced the event.
    pub fn aggregate_id(&self) -> Uuid {
        self.payload.aggregate_id()
    }
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::DeliveryCreated { .. } => "delivery_created",
            EventPayload::DeliveryRobotAssigned { .. } => "delivery_robot_assigned",
            EventPayload::DeliveryApproaching { .. } => "delivery_approaching",
            EventPayload::DeliveryArrived { .. } => "delivery_arrived",
            EventPayload::DeliveryDoorOpened { .. } => "delivery_door_opened",
            EventPayload::DeliveryStarted { .. } => "delivery_started",
            EventPayload::DeliveryCompleted { .. } => "delivery_completed",
            EventPayload::DeliveryReturnStarted { .. } => "delivery_return_started",
            EventPayload::DeliveryReturnCompleted { .. } => "delivery_return_completed",
            EventPayload::DeliveryCanceled { .. } => "delivery_canceled",
            EventPayload::DeliveryRobotUnassigned { .. } => "delivery_robot_unassigned",
            EventPayload::DeliveryRobotReassigned { .. } => "delivery_robot_reassigned",
            EventPayload::RobotBecameAvailable { .. } => "robot_became_available",
            EventPayload::RobotDestinationChanged { .. } => "robot_destination_changed",
            EventPayload::RobotApproaching { .. } => "robot_approaching",
            EventPayload::RobotArrived { .. } => "robot_arrived",
        }
    }

    pub fn aggregate_id(&self) -> Uuid {
        match self {
            EventPayload::DeliveryCreated { delivery_id, .. }
            | EventPayload::DeliveryRobotAssigned { delivery_id, .. }
            | EventPayload::DeliveryApproaching { delivery_id, .. }
            | EventPayload::DeliveryArrived { delivery_id, .. }
            | EventPayload::DeliveryDoorOpened { delivery_id, .. }
            | EventPayload::DeliveryStarted { delivery_id, .. }
            | EventPayload::DeliveryCompleted { delivery_id, .. }
            | EventPayload::DeliveryReturnStarted { delivery_id, .. }
            | EventPayload::DeliveryReturnCompleted { delivery_id, .. }
            | EventPayload::DeliveryCanceled { delivery_id, .. }
            | EventPayload::DeliveryRobotUnassigned { delivery_id, .. }
            | EventPayload::DeliveryRobotReassigned { delivery_id, .. } => *delivery_id,
            EventPayload::RobotBecameAvailable { robot_id }
            | EventPayload::RobotDestinationChanged { robot_id, .. }
            | EventPayload::RobotApproaching { robot_id, .. }
            | EventPayload::RobotArrived { robot_id, .. } => *robot_id,
        }
    }
}

/// Events collected during one unit of work. Handed to the publisher only
/// after the commit succeeds; pulling drains the buffer.
#[derive(Debug, Default)]
pub struct Outbox {
    staged: Vec<DomainEvent>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, events: impl IntoIterator<Item = DomainEvent>) {
        self.staged.extend(events);
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn pull_domain_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.staged)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{DomainEvent, EventPayload, Outbox};

    #[test]
    fn pull_returns_events_once_in_staged_order() {
        let robot_id = Uuid::new_v4();
        let delivery_id = Uuid::new_v4();
        let mut outbox = Outbox::new();
        outbox.record(vec![
            DomainEvent::new(EventPayload::RobotBecameAvailable { robot_id }),
            DomainEvent::new(EventPayload::DeliveryStarted {
                delivery_id,
                robot_id: Some(robot_id),
            }),
        ]);

        let first = outbox.pull_domain_events();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].kind(), "robot_became_available");
        assert_eq!(first[1].kind(), "delivery_started");

        assert!(outbox.pull_domain_events().is_empty());
        assert!(outbox.is_empty());
    }

    #[test]
    fn serializes_with_type_discriminant() {
        let delivery_id = Uuid::new_v4();
        let event = DomainEvent::new(EventPayload::DeliveryCanceled {
            delivery_id,
            robot_id: None,
            requires_return: false,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "delivery_canceled");
        assert_eq!(json["requires_return"], false);
        assert_eq!(json["delivery_id"], delivery_id.to_string());

        let back: DomainEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.aggregate_id(), delivery_id);
    }
}
