//! Greedy nearest-match pairing between robots and deliveries.
//!
//! This is the only code that links a robot to a delivery. It mutates the
//! aggregates it is handed and returns the events they produced; persisting
//! both sides in one commit is the caller's job.

use chrono::Utc;
use tracing::debug;

use crate::error::DomainError;
use crate::geo::Coordinate;
use crate::models::assignment::Assignment;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::event::DomainEvent;
use crate::models::robot::{Robot, DEFAULT_MIN_BATTERY_PERCENT};

#[derive(Debug)]
pub struct RobotMatch {
    pub robot: Robot,
    pub assignment: Assignment,
    pub events: Vec<DomainEvent>,
}

#[derive(Debug)]
pub struct DeliveryMatch {
    pub delivery: Delivery,
    pub assignment: Assignment,
    pub events: Vec<DomainEvent>,
}

#[derive(Debug, Clone)]
pub struct AssignmentService {
    min_battery: u8,
}

impl Default for AssignmentService {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_BATTERY_PERCENT)
    }
}

impl AssignmentService {
    pub fn new(min_battery: u8) -> Self {
        Self { min_battery }
    }

    /// Picks the available robot closest to the delivery's pickup point.
    /// Equidistant candidates resolve to the first one enumerated.
    pub fn assign_nearest_robot_to_delivery(
        &self,
        delivery: &mut Delivery,
        candidates: Vec<Robot>,
    ) -> Result<Option<RobotMatch>, DomainError> {
        if delivery.status() != DeliveryStatus::Pending {
            return Ok(None);
        }

        let pickup = delivery.pickup().coordinate;
        let available = candidates
            .into_iter()
            .filter(|robot| robot.is_available_with(self.min_battery));

        let Some((mut robot, distance_m)) = nearest(pickup, available, Robot::location) else {
            return Ok(None);
        };

        let events = link(delivery, &mut robot)?;
        debug!(
            delivery_id = %delivery.id(),
            robot_id = %robot.id(),
            distance_m,
            "nearest robot selected"
        );

        Ok(Some(RobotMatch {
            assignment: record(delivery, &robot, distance_m),
            robot,
            events,
        }))
    }

    /// Picks the pending delivery whose pickup point is closest to the robot.
    pub fn assign_nearest_delivery_to_robot(
        &self,
        robot: &mut Robot,
        candidates: Vec<Delivery>,
    ) -> Result<Option<DeliveryMatch>, DomainError> {
        if !robot.is_available_with(self.min_battery) {
            return Ok(None);
        }

        let pending = candidates
            .into_iter()
            .filter(|delivery| delivery.status() == DeliveryStatus::Pending);

        let Some((mut delivery, distance_m)) =
            nearest(robot.location(), pending, |d: &Delivery| d.pickup().coordinate)
        else {
            return Ok(None);
        };

        let events = link(&mut delivery, robot)?;
        debug!(
            delivery_id = %delivery.id(),
            robot_id = %robot.id(),
            distance_m,
            "nearest delivery selected"
        );

        Ok(Some(DeliveryMatch {
            assignment: record(&delivery, robot, distance_m),
            delivery,
            events,
        }))
    }

    /// Moves an in-progress delivery onto another available robot. The
    /// previous robot is released by whoever consumes the reassigned event.
    pub fn reassign(
        &self,
        delivery: &mut Delivery,
        new_robot: &mut Robot,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        if delivery.assigned_robot() == Some(new_robot.id()) {
            return Err(DomainError::SameRobot(new_robot.id()));
        }
        if !new_robot.is_available_with(self.min_battery) {
            return Err(DomainError::RobotUnavailable(new_robot.id()));
        }

        let mut events = delivery.reassign_robot(new_robot.id())?;
        let destination = delivery
            .current_destination_coordinate()
            .unwrap_or(delivery.pickup().coordinate);
        events.extend(new_robot.assign_delivery(delivery.id(), destination)?);

        Ok(events)
    }
}

fn link(delivery: &mut Delivery, robot: &mut Robot) -> Result<Vec<DomainEvent>, DomainError> {
    let mut events = delivery.assign_robot(robot.id(), delivery.route().clone())?;
    events.extend(robot.assign_delivery(delivery.id(), delivery.pickup().coordinate)?);
    Ok(events)
}

fn record(delivery: &Delivery, robot: &Robot, distance_m: f64) -> Assignment {
    Assignment {
        delivery_id: delivery.id(),
        robot_id: robot.id(),
        distance_m,
        assigned_at: Utc::now(),
    }
}

fn nearest<T>(
    origin: Coordinate,
    candidates: impl Iterator<Item = T>,
    position: impl Fn(&T) -> Coordinate,
) -> Option<(T, f64)> {
    candidates
        .map(|candidate| {
            let distance = origin.distance_to(&position(&candidate));
            (candidate, distance)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::AssignmentService;
    use crate::error::DomainError;
    use crate::geo::Coordinate;
    use crate::models::delivery::{Delivery, DeliveryStatus};
    use crate::models::location::{ContactRef, Location};
    use crate::models::robot::{Robot, RobotStatus};
    use crate::models::route::{RouteEstimate, RouteLeg};

    fn point(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    fn robot_at(name: &str, lat: f64, lng: f64, battery: i64) -> Robot {
        let mut robot = Robot::register(name, point(lat, lng), battery).unwrap();
        robot.start_duty().unwrap();
        robot
    }

    fn delivery_at(lat: f64, lng: f64) -> Delivery {
        let route = RouteEstimate::new(vec![RouteLeg {
            available: true,
            duration_secs: 120,
        }]);
        let (delivery, _) = Delivery::create(
            Location::new(point(lat, lng), "pickup").unwrap(),
            Location::new(point(lat + 0.002, lng + 0.002), "dropoff").unwrap(),
            ContactRef::new("contact").unwrap(),
            route,
        )
        .unwrap();
        delivery
    }

    #[test]
    fn picks_nearest_robot_for_city_hall_pickup() {
        let service = AssignmentService::default();
        let mut delivery = delivery_at(37.5665, 126.9780);
        let far = robot_at("gangnam", 37.4979, 127.0276, 90);
        let near = robot_at("city-hall", 37.5660, 126.9770, 90);
        let near_id = near.id();

        let matched = service
            .assign_nearest_robot_to_delivery(&mut delivery, vec![far, near])
            .unwrap()
            .expect("a robot should be matched");

        assert_eq!(matched.robot.id(), near_id);
        assert!(matched.assignment.distance_m < 200.0);
        assert_eq!(delivery.status(), DeliveryStatus::Assigned);
        assert_eq!(delivery.assigned_robot(), Some(near_id));
        assert_eq!(matched.robot.status(), RobotStatus::Busy);
        assert_eq!(matched.robot.current_delivery(), Some(delivery.id()));

        let kinds: Vec<_> = matched.events.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["delivery_robot_assigned", "robot_destination_changed"]);
    }

    #[test]
    fn equidistant_robots_resolve_to_first_enumerated() {
        let service = AssignmentService::default();
        let mut delivery = delivery_at(37.5665, 126.9780);
        let first = robot_at("first", 37.5670, 126.9780, 90);
        let second = robot_at("second", 37.5670, 126.9780, 90);
        let first_id = first.id();

        let matched = service
            .assign_nearest_robot_to_delivery(&mut delivery, vec![first, second])
            .unwrap()
            .unwrap();

        assert_eq!(matched.robot.id(), first_id);
    }

    #[test]
    fn unavailable_robots_are_skipped() {
        let service = AssignmentService::default();
        let mut delivery = delivery_at(37.5665, 126.9780);
        let drained = robot_at("drained", 37.5665, 126.9781, 10);
        let off_duty = Robot::register("off", point(37.5665, 126.9781), 100).unwrap();
        let fallback = robot_at("fallback", 37.5700, 126.9800, 50);
        let fallback_id = fallback.id();

        let matched = service
            .assign_nearest_robot_to_delivery(&mut delivery, vec![drained, off_duty, fallback])
            .unwrap()
            .unwrap();

        assert_eq!(matched.robot.id(), fallback_id);
    }

    #[test]
    fn no_candidates_is_a_negative_result() {
        let service = AssignmentService::default();
        let mut delivery = delivery_at(37.5665, 126.9780);
        let drained = robot_at("drained", 37.5665, 126.9781, 5);

        let matched = service
            .assign_nearest_robot_to_delivery(&mut delivery, vec![drained])
            .unwrap();

        assert!(matched.is_none());
        assert_eq!(delivery.status(), DeliveryStatus::Pending);
        assert_eq!(delivery.assigned_robot(), None);
    }

    #[test]
    fn non_pending_delivery_is_left_alone() {
        let service = AssignmentService::default();
        let mut delivery = delivery_at(37.5665, 126.9780);
        delivery.cancel().unwrap();

        let matched = service
            .assign_nearest_robot_to_delivery(&mut delivery, vec![robot_at("r", 37.5, 127.0, 90)])
            .unwrap();
        assert!(matched.is_none());
    }

    #[test]
    fn picks_nearest_pending_delivery_for_robot() {
        let service = AssignmentService::default();
        let mut robot = robot_at("r", 37.5660, 126.9770, 90);
        let far = delivery_at(37.4979, 127.0276);
        let near = delivery_at(37.5665, 126.9780);
        let mut taken = delivery_at(37.5661, 126.9771);
        taken.cancel().unwrap();
        let near_id = near.id();

        let matched = service
            .assign_nearest_delivery_to_robot(&mut robot, vec![taken, far, near])
            .unwrap()
            .unwrap();

        assert_eq!(matched.delivery.id(), near_id);
        assert_eq!(matched.delivery.status(), DeliveryStatus::Assigned);
        assert_eq!(robot.current_delivery(), Some(near_id));
    }

    #[test]
    fn unavailable_robot_takes_no_delivery() {
        let service = AssignmentService::new(50);
        let mut robot = robot_at("r", 37.5660, 126.9770, 40);

        let matched = service
            .assign_nearest_delivery_to_robot(&mut robot, vec![delivery_at(37.5665, 126.9780)])
            .unwrap();

        assert!(matched.is_none());
        assert_eq!(robot.status(), RobotStatus::Ready);
    }

    #[test]
    fn reassign_moves_delivery_to_new_robot() {
        let service = AssignmentService::default();
        let mut delivery = delivery_at(37.5665, 126.9780);
        let original = robot_at("a", 37.5660, 126.9770, 90);
        let matched = service
            .assign_nearest_robot_to_delivery(&mut delivery, vec![original])
            .unwrap()
            .unwrap();
        let mut replacement = robot_at("b", 37.5600, 126.9700, 90);

        let events = service.reassign(&mut delivery, &mut replacement).unwrap();

        assert_eq!(delivery.assigned_robot(), Some(replacement.id()));
        assert_eq!(delivery.status(), DeliveryStatus::Assigned);
        assert_eq!(replacement.current_delivery(), Some(delivery.id()));
        assert_eq!(events[0].kind(), "delivery_robot_reassigned");
        assert_eq!(events[1].kind(), "robot_destination_changed");
        assert_ne!(matched.robot.id(), replacement.id());
    }

    #[test]
    fn reassign_rejects_same_or_unavailable_robot() {
        let service = AssignmentService::default();
        let mut delivery = delivery_at(37.5665, 126.9780);
        let matched = service
            .assign_nearest_robot_to_delivery(&mut delivery, vec![robot_at("a", 37.5660, 126.9770, 90)])
            .unwrap()
            .unwrap();
        let mut same = matched.robot.clone();
        assert_eq!(
            service.reassign(&mut delivery, &mut same).unwrap_err(),
            DomainError::SameRobot(same.id())
        );

        let mut off_duty = Robot::register("off", point(37.5, 127.0), 90).unwrap();
        assert_eq!(
            service.reassign(&mut delivery, &mut off_duty).unwrap_err(),
            DomainError::RobotUnavailable(off_duty.id())
        );
    }
}
