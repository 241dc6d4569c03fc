use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::geo::Coordinate;
use crate::models::driving::{DrivingStatus, ProximitySignal};
use crate::models::event::{DomainEvent, EventPayload};

pub const DEFAULT_MIN_BATTERY_PERCENT: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RobotStatus {
    Ready,
    Busy,
    OffDuty,
}

impl RobotStatus {
    pub const ALL: [RobotStatus; 3] = [RobotStatus::Ready, RobotStatus::Busy, RobotStatus::OffDuty];

    pub fn allowed_targets(self) -> &'static [RobotStatus] {
        match self {
            RobotStatus::OffDuty => &[RobotStatus::Ready],
            RobotStatus::Ready => &[RobotStatus::Busy, RobotStatus::OffDuty],
            RobotStatus::Busy => &[RobotStatus::Ready],
        }
    }

    pub fn can_transition_to(self, target: RobotStatus) -> bool {
        self.allowed_targets().contains(&target)
    }
}

impl fmt::Display for RobotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RobotStatus::Ready => "READY",
            RobotStatus::Busy => "BUSY",
            RobotStatus::OffDuty => "OFF_DUTY",
        })
    }
}

/// Active navigation target plus how close the robot has come to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Navigation {
    pub destination: Coordinate,
    pub driving_status: DrivingStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Robot {
    id: Uuid,
    name: String,
    status: RobotStatus,
    battery: u8,
    location: Coordinate,
    current_delivery: Option<Uuid>,
    navigation: Option<Navigation>,
    door_open: bool,
    load_weight_kg: f64,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Robot {
    /// New robots start off duty.
    pub fn register(
        name: impl Into<String>,
        location: Coordinate,
        battery: i64,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::Validation("robot name cannot be empty".to_string()));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            status: RobotStatus::OffDuty,
            battery: validate_battery(battery)?,
            location,
            current_delivery: None,
            navigation: None,
            door_open: false,
            load_weight_kg: 0.0,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> RobotStatus {
        self.status
    }

    pub fn battery(&self) -> u8 {
        self.battery
    }

    pub fn location(&self) -> Coordinate {
        self.location
    }

    pub fn current_delivery(&self) -> Option<Uuid> {
        self.current_delivery
    }

    pub fn navigation(&self) -> Option<&Navigation> {
        self.navigation.as_ref()
    }

    pub fn door_open(&self) -> bool {
        self.door_open
    }

    pub fn load_weight_kg(&self) -> f64 {
        self.load_weight_kg
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

    pub fn is_available(&self) -> bool {
        self.is_available_with(DEFAULT_MIN_BATTERY_PERCENT)
    }

    pub fn is_available_with(&self, min_battery: u8) -> bool {
        self.status == RobotStatus::Ready
            && self.current_delivery.is_none()
            && self.battery >= min_battery
    }

    pub fn start_duty(&mut self) -> Result<Vec<DomainEvent>, DomainError> {
        self.require(self.status == RobotStatus::OffDuty, "start duty")?;
        self.transition(RobotStatus::Ready, "start duty")?;

        Ok(vec![self.became_available()])
    }

    pub fn end_duty(&mut self) -> Result<(), DomainError> {
        self.require(
            self.status == RobotStatus::Ready && self.current_delivery.is_none(),
            "end duty",
        )?;
        self.transition(RobotStatus::OffDuty, "end duty")
    }

    pub fn assign_delivery(
        &mut self,
        delivery_id: Uuid,
        destination: Coordinate,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        self.require(
            self.status == RobotStatus::Ready && self.current_delivery.is_none(),
            "assign delivery",
        )?;
        self.transition(RobotStatus::Busy, "assign delivery")?;
        self.current_delivery = Some(delivery_id);

        self.navigate_to(destination)
    }

    pub fn complete_delivery(&mut self) -> Result<Vec<DomainEvent>, DomainError> {
        self.release("complete delivery")
    }

    pub fn unassign_delivery(&mut self) -> Result<Vec<DomainEvent>, DomainError> {
        self.release("unassign delivery")
    }

    pub fn navigate_to(&mut self, destination: Coordinate) -> Result<Vec<DomainEvent>, DomainError> {
        self.require(self.status == RobotStatus::Busy, "navigate")?;
        self.navigation = Some(Navigation {
            destination,
            driving_status: DrivingStatus::OnGoing,
        });
        self.touch();

        Ok(vec![DomainEvent::new(EventPayload::RobotDestinationChanged {
            robot_id: self.id,
            delivery_id: self.current_delivery,
            destination,
        })])
    }

    /// Records a new position and advances the proximity tracker for the
    /// active target. Arrival clears the target, so it fires once per target.
    pub fn update_location(&mut self, location: Coordinate) -> Vec<DomainEvent> {
        self.location = location;
        self.touch();

        let Some(navigation) = self.navigation else {
            return Vec::new();
        };

        let distance_m = location.distance_to(&navigation.destination);
        let (driving_status, signal) = navigation.driving_status.advance(distance_m);

        match signal {
            None => {
                self.navigation = Some(Navigation {
                    driving_status,
                    ..navigation
                });
                Vec::new()
            }
            Some(ProximitySignal::Approaching) => {
                self.navigation = Some(Navigation {
                    driving_status,
                    ..navigation
                });
                vec![DomainEvent::new(EventPayload::RobotApproaching {
                    robot_id: self.id,
                    delivery_id: self.current_delivery,
                    destination: navigation.destination,
                })]
            }
            Some(ProximitySignal::Arrived) => {
                self.navigation = None;
                vec![DomainEvent::new(EventPayload::RobotArrived {
                    robot_id: self.id,
                    delivery_id: self.current_delivery,
                    destination: navigation.destination,
                })]
            }
        }
    }

    pub fn update_battery(&mut self, battery: i64) -> Result<(), DomainError> {
        self.battery = validate_battery(battery)?;
        self.touch();
        Ok(())
    }

    pub fn update_sensors(&mut self, door_open: bool, load_weight_kg: f64) -> Result<(), DomainError> {
        if !load_weight_kg.is_finite() || load_weight_kg < 0.0 {
            return Err(DomainError::Validation(format!(
                "load weight {load_weight_kg} must be a non-negative number"
            )));
        }
        self.door_open = door_open;
        self.load_weight_kg = load_weight_kg;
        self.touch();
        Ok(())
    }

    fn release(&mut self, operation: &'static str) -> Result<Vec<DomainEvent>, DomainError> {
        self.require(
            self.status == RobotStatus::Busy && self.current_delivery.is_some(),
            operation,
        )?;
        self.transition(RobotStatus::Ready, operation)?;
        self.current_delivery = None;
        self.navigation = None;

        Ok(vec![self.became_available()])
    }

    fn became_available(&self) -> DomainEvent {
        DomainEvent::new(EventPayload::RobotBecameAvailable { robot_id: self.id })
    }

    fn require(&self, condition: bool, operation: &'static str) -> Result<(), DomainError> {
        if condition {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn transition(&mut self, target: RobotStatus, operation: &'static str) -> Result<(), DomainError> {
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
            aggregate: "robot",
            from: self.status.to_string(),
            operation,
        }
    }
}

fn validate_battery(battery: i64) -> Result<u8, DomainError> {
    if (0..=100).contains(&battery) {
        Ok(battery as u8)
    } else {
        Err(DomainError::Validation(format!(
            "battery {battery} out of range [0, 100]"
        )))
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{Robot, RobotStatus};
    use crate::error::DomainError;
    use crate::geo::Coordinate;
    use crate::models::driving::DrivingStatus;
    use crate::models::event::EventPayload;

    fn point(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    fn ready_robot() -> Robot {
        let mut robot = Robot::register("r-1", point(37.5660, 126.9770), 80).unwrap();
        robot.start_duty().unwrap();
        robot
    }

    fn busy_robot(destination: Coordinate) -> Robot {
        let mut robot = ready_robot();
        robot.assign_delivery(Uuid::new_v4(), destination).unwrap();
        robot
    }

    #[test]
    fn transition_table_matches_duty_cycle() {
        let expected: &[(RobotStatus, &[RobotStatus])] = &[
            (RobotStatus::OffDuty, &[RobotStatus::Ready]),
            (RobotStatus::Ready, &[RobotStatus::Busy, RobotStatus::OffDuty]),
            (RobotStatus::Busy, &[RobotStatus::Ready]),
        ];

        for (source, targets) in expected {
            for target in RobotStatus::ALL {
                assert_eq!(
                    source.can_transition_to(target),
                    targets.contains(&target),
                    "{source} -> {target}"
                );
            }
        }
    }

    #[test]
    fn registered_robot_is_off_duty_and_unavailable() {
        let robot = Robot::register("r-1", point(37.0, 127.0), 100).unwrap();
        assert_eq!(robot.status(), RobotStatus::OffDuty);
        assert!(!robot.is_available());
    }

    #[test]
    fn register_validates_inputs() {
        assert!(Robot::register(" ", point(37.0, 127.0), 50).is_err());
        assert!(Robot::register("r", point(37.0, 127.0), -1).is_err());
        assert!(Robot::register("r", point(37.0, 127.0), 101).is_err());
    }

    #[test]
    fn start_duty_makes_robot_available() {
        let mut robot = Robot::register("r-1", point(37.0, 127.0), 100).unwrap();
        let events = robot.start_duty().unwrap();

        assert_eq!(robot.status(), RobotStatus::Ready);
        assert!(robot.is_available());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "robot_became_available");
        assert!(robot.start_duty().is_err());
    }

    #[test]
    fn low_battery_robot_is_not_available() {
        let mut robot = ready_robot();
        robot.update_battery(19).unwrap();
        assert!(!robot.is_available());
        robot.update_battery(20).unwrap();
        assert!(robot.is_available());
        assert!(!robot.is_available_with(50));
    }

    #[test]
    fn update_battery_rejects_out_of_range() {
        let mut robot = ready_robot();
        assert!(matches!(robot.update_battery(-5), Err(DomainError::Validation(_))));
        assert!(robot.update_battery(150).is_err());
        assert_eq!(robot.battery(), 80);
    }

    #[test]
    fn end_duty_emits_nothing_and_rejects_when_busy() {
        let mut robot = ready_robot();
        robot.end_duty().unwrap();
        assert_eq!(robot.status(), RobotStatus::OffDuty);

        let mut busy = busy_robot(point(37.5665, 126.9780));
        assert!(busy.end_duty().is_err());
        assert_eq!(busy.status(), RobotStatus::Busy);
    }

    #[test]
    fn assign_delivery_starts_navigation() {
        let mut robot = ready_robot();
        let delivery_id = Uuid::new_v4();
        let destination = point(37.5665, 126.9780);
        let events = robot.assign_delivery(delivery_id, destination).unwrap();

        assert_eq!(robot.status(), RobotStatus::Busy);
        assert_eq!(robot.current_delivery(), Some(delivery_id));
        assert_eq!(robot.navigation().map(|n| n.destination), Some(destination));
        assert!(!robot.is_available());
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].payload,
            EventPayload::RobotDestinationChanged { delivery_id: Some(d), .. } if d == delivery_id
        ));
    }

    #[test]
    fn assign_delivery_requires_ready_and_free() {
        let mut off = Robot::register("r", point(37.0, 127.0), 90).unwrap();
        assert!(off.assign_delivery(Uuid::new_v4(), point(37.0, 127.0)).is_err());

        let mut busy = busy_robot(point(37.5665, 126.9780));
        assert!(busy.assign_delivery(Uuid::new_v4(), point(37.0, 127.0)).is_err());
    }

    #[test]
    fn complete_delivery_returns_robot_to_ready() {
        let mut robot = busy_robot(point(37.5665, 126.9780));
        let events = robot.complete_delivery().unwrap();

        assert_eq!(robot.status(), RobotStatus::Ready);
        assert_eq!(robot.current_delivery(), None);
        assert!(robot.navigation().is_none());
        assert_eq!(events[0].kind(), "robot_became_available");
        assert!(robot.complete_delivery().is_err());
    }

    #[test]
    fn unassign_requires_busy() {
        let mut robot = ready_robot();
        assert!(robot.unassign_delivery().is_err());

        let mut busy = busy_robot(point(37.5665, 126.9780));
        assert_eq!(busy.unassign_delivery().unwrap()[0].kind(), "robot_became_available");
    }

    #[test]
    fn navigate_requires_busy() {
        let mut robot = ready_robot();
        assert!(robot.navigate_to(point(37.5, 127.0)).is_err());

        let mut busy = busy_robot(point(37.5665, 126.9780));
        let next = point(37.5700, 126.9820);
        let events = busy.navigate_to(next).unwrap();
        assert_eq!(busy.navigation().map(|n| n.destination), Some(next));
        assert_eq!(
            busy.navigation().map(|n| n.driving_status),
            Some(DrivingStatus::OnGoing)
        );
        assert_eq!(events[0].kind(), "robot_destination_changed");
    }

    #[test]
    fn update_location_without_target_emits_nothing() {
        let mut robot = ready_robot();
        let events = robot.update_location(point(37.0, 127.0));
        assert!(events.is_empty());
        assert_eq!(robot.location(), point(37.0, 127.0));
    }

    #[test]
    fn approach_then_arrival_emitted_once_each() {
        let destination = point(37.5665, 126.9780);
        let mut robot = busy_robot(destination);

        // ~33 m north of the destination
        let near = point(37.5668, 126.9780);
        let approach = robot.update_location(near);
        assert_eq!(approach.len(), 1);
        assert_eq!(approach[0].kind(), "robot_approaching");
        assert!(robot.update_location(near).is_empty());

        let arrival = robot.update_location(destination);
        assert_eq!(arrival.len(), 1);
        assert_eq!(arrival[0].kind(), "robot_arrived");
        assert!(robot.navigation().is_none());

        for _ in 0..3 {
            assert!(robot.update_location(destination).is_empty());
        }
    }

    #[test]
    fn far_updates_do_not_signal() {
        let mut robot = busy_robot(point(37.5665, 126.9780));
        assert!(robot.update_location(point(37.4979, 127.0276)).is_empty());
        assert_eq!(
            robot.navigation().map(|n| n.driving_status),
            Some(DrivingStatus::OnGoing)
        );
    }

    #[test]
    fn update_sensors_rejects_negative_load() {
        let mut robot = ready_robot();
        assert!(robot.update_sensors(true, -1.0).is_err());
        robot.update_sensors(true, 2.5).unwrap();
        assert!(robot.door_open());
        assert_eq!(robot.load_weight_kg(), 2.5);
    }
}
