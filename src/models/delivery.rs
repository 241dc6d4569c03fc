use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::geo::Coordinate;
use crate::models::event::{DestinationType, DomainEvent, EventPayload};
use crate::models::location::{ContactRef, Location};
use crate::models::route::RouteEstimate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    Assigned,
    PickupArrived,
    PickingUp,
    Delivering,
    DeliveryArrived,
    DroppingOff,
    Completed,
    Canceled,
    Returning,
    ReturnArrived,
    ReturningOff,
    ReturnCompleted,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 13] = [
        DeliveryStatus::Pending,
        DeliveryStatus::Assigned,
        DeliveryStatus::PickupArrived,
        DeliveryStatus::PickingUp,
        DeliveryStatus::Delivering,
        DeliveryStatus::DeliveryArrived,
        DeliveryStatus::DroppingOff,
        DeliveryStatus::Completed,
        DeliveryStatus::Canceled,
        DeliveryStatus::Returning,
        DeliveryStatus::ReturnArrived,
        DeliveryStatus::ReturningOff,
        DeliveryStatus::ReturnCompleted,
    ];

    pub fn allowed_targets(self) -> &'static [DeliveryStatus] {
        use DeliveryStatus::*;
        match self {
            Pending => &[Assigned, Canceled],
            Assigned => &[PickupArrived, Canceled, Pending],
            PickupArrived => &[PickingUp, Canceled, Pending],
            PickingUp => &[Delivering, Returning, Pending],
            Delivering => &[DeliveryArrived, Returning],
            DeliveryArrived => &[DroppingOff, Returning],
            DroppingOff => &[Completed, Returning],
            Returning => &[ReturnArrived],
            ReturnArrived => &[ReturningOff],
            ReturningOff => &[ReturnCompleted],
            Completed | Canceled | ReturnCompleted => &[],
        }
    }

    pub fn can_transition_to(self, target: DeliveryStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeliveryStatus::Completed | DeliveryStatus::Canceled | DeliveryStatus::ReturnCompleted
        )
    }

    /// Can be canceled without sending the robot back.
    pub fn is_cancelable(self) -> bool {
        matches!(
            self,
            DeliveryStatus::Pending | DeliveryStatus::Assigned | DeliveryStatus::PickupArrived
        )
    }

    /// Cancellation sends the parcel back to the pickup point.
    pub fn requires_return(self) -> bool {
        matches!(
            self,
            DeliveryStatus::PickingUp
                | DeliveryStatus::Delivering
                | DeliveryStatus::DeliveryArrived
                | DeliveryStatus::DroppingOff
        )
    }

    pub fn is_before_departure(self) -> bool {
        matches!(
            self,
            DeliveryStatus::Assigned | DeliveryStatus::PickupArrived | DeliveryStatus::PickingUp
        )
    }

    /// Robot is attached and the delivery is moving forward (not returning).
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            DeliveryStatus::Assigned
                | DeliveryStatus::PickupArrived
                | DeliveryStatus::PickingUp
                | DeliveryStatus::Delivering
                | DeliveryStatus::DeliveryArrived
                | DeliveryStatus::DroppingOff
        )
    }

    pub fn has_assigned_robot(self) -> bool {
        self.is_in_progress()
            || matches!(
                self,
                DeliveryStatus::Returning
                    | DeliveryStatus::ReturnArrived
                    | DeliveryStatus::ReturningOff
            )
    }

    /// Destination the robot is currently driving towards, if any.
    pub fn destination_type(self) -> Option<DestinationType> {
        match self {
            DeliveryStatus::Assigned => Some(DestinationType::Pickup),
            DeliveryStatus::Delivering => Some(DestinationType::Delivery),
            DeliveryStatus::Returning => Some(DestinationType::Return),
            _ => None,
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryStatus::Pending => "PENDING",
            DeliveryStatus::Assigned => "ASSIGNED",
            DeliveryStatus::PickupArrived => "PICKUP_ARRIVED",
            DeliveryStatus::PickingUp => "PICKING_UP",
            DeliveryStatus::Delivering => "DELIVERING",
            DeliveryStatus::DeliveryArrived => "DELIVERY_ARRIVED",
            DeliveryStatus::DroppingOff => "DROPPING_OFF",
            DeliveryStatus::Completed => "COMPLETED",
            DeliveryStatus::Canceled => "CANCELED",
            DeliveryStatus::Returning => "RETURNING",
            DeliveryStatus::ReturnArrived => "RETURN_ARRIVED",
            DeliveryStatus::ReturningOff => "RETURNING_OFF",
            DeliveryStatus::ReturnCompleted => "RETURN_COMPLETED",
        };
        f.write_str(name)
    }
}

/// Delivery aggregate. Fields are private; every state change goes through
/// an operation that returns the events it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    id: Uuid,
    pickup: Location,
    dropoff: Location,
    contact: ContactRef,
    status: DeliveryStatus,
    assigned_robot: Option<Uuid>,
    route: RouteEstimate,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Delivery {
    pub fn create(
        pickup: Location,
        dropoff: Location,
        contact: ContactRef,
        route: RouteEstimate,
    ) -> Result<(Self, Vec<DomainEvent>), DomainError> {
        if !route.is_available() {
            return Err(DomainError::RouteUnavailable);
        }

        let now = Utc::now();
        let delivery = Self {
            id: Uuid::new_v4(),
            pickup,
            dropoff,
            contact,
            status: DeliveryStatus::Pending,
            assigned_robot: None,
            route,
            version: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        let event = DomainEvent::new(EventPayload::DeliveryCreated {
            delivery_id: delivery.id,
            pickup: delivery.pickup.coordinate,
        });

        Ok((delivery, vec![event]))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    pub fn pickup(&self) -> &Location {
        &self.pickup
    }

    pub fn dropoff(&self) -> &Location {
        &self.dropoff
    }

    pub fn contact(&self) -> &ContactRef {
        &self.contact
    }

    pub fn assigned_robot(&self) -> Option<Uuid> {
        self.assigned_robot
    }

    pub fn route(&self) -> &RouteEstimate {
        &self.route
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Pending and returning deliveries both resolve to the pickup point.
    pub fn current_destination(&self) -> Option<&Location> {
        match self.status {
            DeliveryStatus::Pending
            | DeliveryStatus::Assigned
            | DeliveryStatus::PickupArrived
            | DeliveryStatus::PickingUp
            | DeliveryStatus::Returning
            | DeliveryStatus::ReturnArrived
            | DeliveryStatus::ReturningOff => Some(&self.pickup),
            DeliveryStatus::Delivering
            | DeliveryStatus::DeliveryArrived
            | DeliveryStatus::DroppingOff => Some(&self.dropoff),
            DeliveryStatus::Completed
            | DeliveryStatus::Canceled
            | DeliveryStatus::ReturnCompleted => None,
        }
    }

    pub fn current_destination_coordinate(&self) -> Option<Coordinate> {
        self.current_destination().map(|location| location.coordinate)
    }

    pub fn assign_robot(
        &mut self,
        robot_id: Uuid,
        route: RouteEstimate,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        self.require(self.status == DeliveryStatus::Pending, "assign robot")?;
        self.transition(DeliveryStatus::Assigned, "assign robot")?;
        self.assigned_robot = Some(robot_id);

        Ok(vec![DomainEvent::new(EventPayload::DeliveryRobotAssigned {
            delivery_id: self.id,
            robot_id,
            route,
        })])
    }

    pub fn arrived(&mut self) -> Result<Vec<DomainEvent>, DomainError> {
        let (target, destination_type) = match self.status {
            DeliveryStatus::Assigned => (DeliveryStatus::PickupArrived, DestinationType::Pickup),
            DeliveryStatus::Delivering => {
                (DeliveryStatus::DeliveryArrived, DestinationType::Delivery)
            }
            DeliveryStatus::Returning => (DeliveryStatus::ReturnArrived, DestinationType::Return),
            _ => return Err(self.invalid("mark arrived")),
        };
        self.transition(target, "mark arrived")?;

        Ok(vec![DomainEvent::new(EventPayload::DeliveryArrived {
            delivery_id: self.id,
            robot_id: self.assigned_robot,
            destination_type,
        })])
    }

    pub fn open_door(&mut self) -> Result<Vec<DomainEvent>, DomainError> {
        let (target, destination_type) = match self.status {
            DeliveryStatus::PickupArrived => (DeliveryStatus::PickingUp, DestinationType::Pickup),
            DeliveryStatus::DeliveryArrived => {
                (DeliveryStatus::DroppingOff, DestinationType::Delivery)
            }
            DeliveryStatus::ReturnArrived => (DeliveryStatus::ReturningOff, DestinationType::Return),
            _ => return Err(self.invalid("open door")),
        };
        self.transition(target, "open door")?;

        Ok(vec![DomainEvent::new(EventPayload::DeliveryDoorOpened {
            delivery_id: self.id,
            robot_id: self.assigned_robot,
            destination_type,
        })])
    }

    pub fn start_delivery(&mut self) -> Result<Vec<DomainEvent>, DomainError> {
        self.require(self.status == DeliveryStatus::PickingUp, "start delivery")?;
        self.transition(DeliveryStatus::Delivering, "start delivery")?;

        Ok(vec![DomainEvent::new(EventPayload::DeliveryStarted {
            delivery_id: self.id,
            robot_id: self.assigned_robot,
        })])
    }

    pub fn complete(&mut self) -> Result<Vec<DomainEvent>, DomainError> {
        self.require(self.status == DeliveryStatus::DroppingOff, "complete")?;
        let robot_id = self.assigned_robot;
        self.transition(DeliveryStatus::Completed, "complete")?;
        self.assigned_robot = None;
        self.completed_at = Some(self.updated_at);

        Ok(vec![DomainEvent::new(EventPayload::DeliveryCompleted {
            delivery_id: self.id,
            robot_id,
        })])
    }

    pub fn complete_return(&mut self) -> Result<Vec<DomainEvent>, DomainError> {
        self.require(self.status == DeliveryStatus::ReturningOff, "complete return")?;
        let robot_id = self.assigned_robot;
        self.transition(DeliveryStatus::ReturnCompleted, "complete return")?;
        self.assigned_robot = None;
        self.completed_at = Some(self.updated_at);

        Ok(vec![DomainEvent::new(EventPayload::DeliveryReturnCompleted {
            delivery_id: self.id,
            robot_id,
        })])
    }

    /// Early states cancel outright; once the parcel is on board the
    /// delivery turns around and emits `return_started` before `canceled`.
    pub fn cancel(&mut self) -> Result<Vec<DomainEvent>, DomainError> {
        let robot_id = self.assigned_robot;

        if self.status.is_cancelable() {
            self.transition(DeliveryStatus::Canceled, "cancel")?;
            self.assigned_robot = None;
            self.completed_at = Some(self.updated_at);

            return Ok(vec![DomainEvent::new(EventPayload::DeliveryCanceled {
                delivery_id: self.id,
                robot_id,
                requires_return: false,
            })]);
        }

        if self.status.requires_return() {
            self.transition(DeliveryStatus::Returning, "cancel")?;

            return Ok(vec![
                DomainEvent::new(EventPayload::DeliveryReturnStarted {
                    delivery_id: self.id,
                    robot_id,
                }),
                DomainEvent::new(EventPayload::DeliveryCanceled {
                    delivery_id: self.id,
                    robot_id,
                    requires_return: true,
                }),
            ]);
        }

        Err(self.invalid("cancel"))
    }

    pub fn unassign_robot(&mut self) -> Result<Vec<DomainEvent>, DomainError> {
        self.require(self.status.is_before_departure(), "unassign robot")?;
        let robot_id = self.assigned_robot.ok_or_else(|| self.invalid("unassign robot"))?;
        self.transition(DeliveryStatus::Pending, "unassign robot")?;
        self.assigned_robot = None;

        Ok(vec![DomainEvent::new(EventPayload::DeliveryRobotUnassigned {
            delivery_id: self.id,
            robot_id,
        })])
    }

    pub fn reassign_robot(&mut self, new_robot_id: Uuid) -> Result<Vec<DomainEvent>, DomainError> {
        self.require(self.status.is_in_progress(), "reassign robot")?;
        let previous_robot_id = self.assigned_robot.ok_or_else(|| self.invalid("reassign robot"))?;
        if previous_robot_id == new_robot_id {
            return Err(DomainError::SameRobot(new_robot_id));
        }

        self.assigned_robot = Some(new_robot_id);
        self.touch();

        Ok(vec![DomainEvent::new(EventPayload::DeliveryRobotReassigned {
            delivery_id: self.id,
            previous_robot_id,
            new_robot_id,
        })])
    }

    pub fn approaching(&self) -> Result<Vec<DomainEvent>, DomainError> {
        let destination_type = self
            .status
            .destination_type()
            .ok_or_else(|| self.invalid("signal approaching"))?;

        Ok(vec![DomainEvent::new(EventPayload::DeliveryApproaching {
            delivery_id: self.id,
            robot_id: self.assigned_robot,
            destination_type,
        })])
    }

    fn require(&self, condition: bool, operation: &'static str) -> Result<(), DomainError> {
        if condition {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn transition(
        &mut self,
        target: DeliveryStatus,
        operation: &'static str,
    ) -> Result<(), DomainError> {
        if !self.status.can_transition_to(target) {
            return Err(self.invalid(operation));
        }
        self.status = target;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn invalid(&self, operation: &'static str) -> DomainError {
        DomainError::InvalidTransition {
            aggregate: "delivery",
            from: self.status.to_string(),
            operation,
        }
    }
}
