//! Command layer over the two aggregates.
//!
//! Every public operation is one unit of work: read the aggregates, run the
//! domain operations while collecting their events in an [`Outbox`], commit
//! at the versions read, and only then publish. A version conflict re-runs
//! the whole unit of work, up to the configured retry budget.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::assignment::AssignmentService;
use crate::engine::publisher::EventPublisher;
use crate::error::{AppError, DomainError};
use crate::geo::Coordinate;
use crate::models::assignment::Assignment;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::event::{DomainEvent, Outbox};
use crate::models::location::{ContactRef, Location};
use crate::models::robot::{Robot, RobotStatus};
use crate::models::telemetry::TelemetrySample;
use crate::observability::metrics::Metrics;
use crate::ports::{RobotActuator, RouteFinder};
use crate::storage::{Changeset, DeliveryRepository, RobotRepository, Store};

type DeliveryOp = fn(&mut Delivery) -> Result<Vec<DomainEvent>, DomainError>;

/// Why a robot is being let go of its delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Completed,
    Unassigned,
}

pub struct Dispatcher {
    store: Arc<dyn Store>,
    router: Arc<dyn RouteFinder>,
    actuator: Arc<dyn RobotActuator>,
    publisher: EventPublisher,
    assignment: AssignmentService,
    metrics: Metrics,
    max_commit_retries: u32,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        router: Arc<dyn RouteFinder>,
        actuator: Arc<dyn RobotActuator>,
        publisher: EventPublisher,
        assignment: AssignmentService,
        metrics: Metrics,
        max_commit_retries: u32,
    ) -> Self {
        Self {
            store,
            router,
            actuator,
            publisher,
            assignment,
            metrics,
            max_commit_retries,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.publisher.subscribe()
    }

    pub async fn find_delivery(&self, delivery_id: Uuid) -> Result<Delivery, AppError> {
        self.store
            .find_delivery(delivery_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))
    }

    pub async fn find_robot(&self, robot_id: Uuid) -> Result<Robot, AppError> {
        self.store
            .find_robot(robot_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("robot {robot_id} not found")))
    }

    pub async fn register_robot(
        &self,
        name: impl Into<String>,
        location: Coordinate,
        battery: i64,
    ) -> Result<Robot, AppError> {
        let robot = Robot::register(name, location, battery)?;
        let robot = self.commit_robot(robot, Outbox::new()).await?;
        info!(robot_id = %robot.id(), name = robot.name(), "robot registered");
        Ok(robot)
    }

    pub async fn start_duty(&self, robot_id: Uuid) -> Result<Robot, AppError> {
        self.retrying("start duty", move || async move {
            let mut robot = self.find_robot(robot_id).await?;
            let mut outbox = Outbox::new();
            outbox.record(robot.start_duty()?);
            self.commit_robot(robot, outbox).await
        })
        .await
    }

    pub async fn end_duty(&self, robot_id: Uuid) -> Result<Robot, AppError> {
        self.retrying("end duty", move || async move {
            let mut robot = self.find_robot(robot_id).await?;
            robot.end_duty()?;
            self.commit_robot(robot, Outbox::new()).await
        })
        .await
    }

    /// Fails with [`DomainError::RouteUnavailable`] and persists nothing if
    /// any leg between pickup and drop-off cannot be driven.
    pub async fn create_delivery(
        &self,
        pickup: Location,
        dropoff: Location,
        contact: ContactRef,
    ) -> Result<Delivery, AppError> {
        let route = self
            .router
            .find_route(&[pickup.coordinate, dropoff.coordinate])
            .await?;

        let (delivery, events) = Delivery::create(pickup, dropoff, contact, route)?;
        let mut outbox = Outbox::new();
        outbox.record(events);

        let delivery = self.commit_delivery(delivery, outbox).await?;
        info!(
            delivery_id = %delivery.id(),
            contact = delivery.contact().as_str(),
            eta_secs = delivery.route().total_duration_secs(),
            "delivery created"
        );
        Ok(delivery)
    }

    pub async fn assign_robot_to_delivery(
        &self,
        delivery_id: Uuid,
    ) -> Result<Option<Assignment>, AppError> {
        let start = Instant::now();
        let result = self
            .retrying("assign robot", move || async move {
                let mut delivery = self.find_delivery(delivery_id).await?;
                let candidates = self.store.find_robots_by_status(RobotStatus::Ready).await?;

                let Some(matched) = self
                    .assignment
                    .assign_nearest_robot_to_delivery(&mut delivery, candidates)?
                else {
                    return Ok(None);
                };

                let mut outbox = Outbox::new();
                outbox.record(matched.events);
                self.commit_pair(delivery, matched.robot, outbox).await?;
                Ok(Some(matched.assignment))
            })
            .await;

        self.observe_assignment(start, &result);
        match &result {
            Ok(Some(assignment)) => info!(
                delivery_id = %assignment.delivery_id,
                robot_id = %assignment.robot_id,
                distance_m = assignment.distance_m,
                "robot assigned to delivery"
            ),
            Ok(None) => warn!(delivery_id = %delivery_id, "no available robot for delivery"),
            Err(_) => {}
        }
        result
    }

    pub async fn assign_delivery_to_robot(
        &self,
        robot_id: Uuid,
    ) -> Result<Option<Assignment>, AppError> {
        let start = Instant::now();
        let result = self
            .retrying("assign delivery", move || async move {
                let mut robot = self.find_robot(robot_id).await?;
                let candidates = self
                    .store
                    .find_deliveries_by_status(DeliveryStatus::Pending)
                    .await?;

                let Some(matched) = self
                    .assignment
                    .assign_nearest_delivery_to_robot(&mut robot, candidates)?
                else {
                    return Ok(None);
                };

                let mut outbox = Outbox::new();
                outbox.record(matched.events);
                self.commit_pair(matched.delivery, robot, outbox).await?;
                Ok(Some(matched.assignment))
            })
            .await;

        self.observe_assignment(start, &result);
        match &result {
            Ok(Some(assignment)) => info!(
                delivery_id = %assignment.delivery_id,
                robot_id = %assignment.robot_id,
                distance_m = assignment.distance_m,
                "pending delivery assigned to robot"
            ),
            Ok(None) => debug!(robot_id = %robot_id, "no pending delivery for robot"),
            Err(_) => {}
        }
        result
    }

    pub async fn reassign_robot(
        &self,
        delivery_id: Uuid,
        robot_id: Uuid,
    ) -> Result<Delivery, AppError> {
        let delivery = self
            .retrying("reassign robot", move || async move {
                let mut delivery = self.find_delivery(delivery_id).await?;
                let mut robot = self.find_robot(robot_id).await?;

                let mut outbox = Outbox::new();
                outbox.record(self.assignment.reassign(&mut delivery, &mut robot)?);
                let (delivery, _) = self.commit_pair(delivery, robot, outbox).await?;
                Ok(delivery)
            })
            .await?;

        info!(delivery_id = %delivery_id, robot_id = %robot_id, "delivery reassigned");
        Ok(delivery)
    }

    /// Opens the door for the current leg and commands the robot to unlock.
    pub async fn open_door(&self, delivery_id: Uuid) -> Result<Delivery, AppError> {
        let delivery = self.apply(delivery_id, "open door", Delivery::open_door).await?;

        if let Some(robot_id) = delivery.assigned_robot() {
            if let Err(err) = self.actuator.open_door(robot_id).await {
                warn!(robot_id = %robot_id, error = %err, "open door command failed");
            }
        }
        Ok(delivery)
    }

    pub async fn start_delivery(&self, delivery_id: Uuid) -> Result<Delivery, AppError> {
        self.apply(delivery_id, "start delivery", Delivery::start_delivery)
            .await
    }

    pub async fn complete_delivery(&self, delivery_id: Uuid) -> Result<Delivery, AppError> {
        self.apply(delivery_id, "complete delivery", Delivery::complete)
            .await
    }

    pub async fn complete_return(&self, delivery_id: Uuid) -> Result<Delivery, AppError> {
        self.apply(delivery_id, "complete return", Delivery::complete_return)
            .await
    }

    pub async fn cancel_delivery(&self, delivery_id: Uuid) -> Result<Delivery, AppError> {
        self.apply(delivery_id, "cancel delivery", Delivery::cancel)
            .await
    }

    pub async fn unassign_robot(&self, delivery_id: Uuid) -> Result<Delivery, AppError> {
        self.apply(delivery_id, "unassign robot", Delivery::unassign_robot)
            .await
    }

    /// Ignored unless `robot_id` is still the delivery's robot.
    pub async fn mark_approaching(
        &self,
        delivery_id: Uuid,
        robot_id: Uuid,
    ) -> Result<bool, AppError> {
        let delivery = self.find_delivery(delivery_id).await?;
        if delivery.assigned_robot() != Some(robot_id) {
            debug!(delivery_id = %delivery_id, robot_id = %robot_id, "approach from stale robot ignored");
            return Ok(false);
        }

        self.publisher.publish_all(delivery.approaching()?).await;
        Ok(true)
    }

    /// Ignored unless `robot_id` is still the delivery's robot and the
    /// delivery is travelling towards a destination.
    pub async fn mark_arrived(
        &self,
        delivery_id: Uuid,
        robot_id: Uuid,
    ) -> Result<Option<Delivery>, AppError> {
        self.retrying("mark arrived", move || async move {
            let mut delivery = self.find_delivery(delivery_id).await?;
            if delivery.assigned_robot() != Some(robot_id) {
                debug!(delivery_id = %delivery_id, robot_id = %robot_id, "arrival from stale robot ignored");
                return Ok(None);
            }
            if delivery.status().destination_type().is_none() {
                debug!(delivery_id = %delivery_id, status = %delivery.status(), "arrival while not travelling ignored");
                return Ok(None);
            }

            let mut outbox = Outbox::new();
            outbox.record(delivery.arrived()?);
            self.commit_delivery(delivery, outbox).await.map(Some)
        })
        .await
    }

    /// Points the robot at the delivery's current destination.
    pub async fn navigate_robot(
        &self,
        robot_id: Uuid,
        delivery_id: Uuid,
    ) -> Result<Option<Robot>, AppError> {
        self.retrying("navigate robot", move || async move {
            let delivery = self.find_delivery(delivery_id).await?;
            let mut robot = self.find_robot(robot_id).await?;
            if robot.current_delivery() != Some(delivery_id) {
                debug!(robot_id = %robot_id, delivery_id = %delivery_id, "robot no longer on delivery");
                return Ok(None);
            }
            let Some(destination) = delivery.current_destination_coordinate() else {
                return Ok(None);
            };

            let mut outbox = Outbox::new();
            outbox.record(robot.navigate_to(destination)?);
            self.commit_robot(robot, outbox).await.map(Some)
        })
        .await
    }

    /// Frees the robot if it is still carrying `delivery_id`.
    pub async fn release_robot(
        &self,
        robot_id: Uuid,
        delivery_id: Uuid,
        reason: Release,
    ) -> Result<Option<Robot>, AppError> {
        let released = self
            .retrying("release robot", move || async move {
                let mut robot = self.find_robot(robot_id).await?;
                if robot.current_delivery() != Some(delivery_id) {
                    debug!(robot_id = %robot_id, delivery_id = %delivery_id, "robot already released");
                    return Ok(None);
                }

                let events = match reason {
                    Release::Completed => robot.complete_delivery()?,
                    Release::Unassigned => robot.unassign_delivery()?,
                };
                let mut outbox = Outbox::new();
                outbox.record(events);
                self.commit_robot(robot, outbox).await.map(Some)
            })
            .await?;

        if released.is_some() {
            info!(robot_id = %robot_id, delivery_id = %delivery_id, reason = ?reason, "robot released");
        }
        Ok(released)
    }

    pub async fn issue_navigation(&self, robot_id: Uuid, destination: Coordinate) {
        if let Err(err) = self.actuator.navigate_to(robot_id, destination).await {
            warn!(robot_id = %robot_id, error = %err, "navigate command failed");
        }
    }

    /// Robot-only unit of work: never touches a delivery.
    pub async fn ingest_telemetry(&self, sample: TelemetrySample) -> Result<Robot, AppError> {
        self.metrics.telemetry_samples_total.inc();
        let sample = &sample;

        self.retrying("ingest telemetry", move || async move {
            let mut robot = self.find_robot(sample.robot_id).await?;
            robot.update_battery(sample.battery)?;
            robot.update_sensors(sample.door_open, sample.load_weight_kg)?;

            let mut outbox = Outbox::new();
            outbox.record(robot.update_location(sample.location));
            self.commit_robot(robot, outbox).await
        })
        .await
    }

    async fn apply(
        &self,
        delivery_id: Uuid,
        operation: &'static str,
        op: DeliveryOp,
    ) -> Result<Delivery, AppError> {
        let delivery = self
            .retrying(operation, move || async move {
                let mut delivery = self.find_delivery(delivery_id).await?;
                let mut outbox = Outbox::new();
                outbox.record(op(&mut delivery)?);
                self.commit_delivery(delivery, outbox).await
            })
            .await?;

        info!(delivery_id = %delivery_id, status = %delivery.status(), operation, "delivery updated");
        Ok(delivery)
    }

    async fn retrying<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err) if err.is_conflict() => {
                    self.metrics.commit_conflicts_total.inc();
                    if retries >= self.max_commit_retries {
                        warn!(operation, retries, error = %err, "commit conflict; giving up");
                        return Err(err);
                    }
                    retries += 1;
                    warn!(operation, retries, error = %err, "commit conflict; retrying");
                }
                other => return other,
            }
        }
    }

    async fn commit_delivery(
        &self,
        mut delivery: Delivery,
        outbox: Outbox,
    ) -> Result<Delivery, AppError> {
        self.commit(Changeset::delivery(delivery.clone()), outbox)
            .await?;
        delivery.set_version(delivery.version() + 1);
        Ok(delivery)
    }

    async fn commit_robot(&self, mut robot: Robot, outbox: Outbox) -> Result<Robot, AppError> {
        self.commit(Changeset::robot(robot.clone()), outbox).await?;
        robot.set_version(robot.version() + 1);
        Ok(robot)
    }

    async fn commit_pair(
        &self,
        mut delivery: Delivery,
        mut robot: Robot,
        outbox: Outbox,
    ) -> Result<(Delivery, Robot), AppError> {
        self.commit(Changeset::pair(delivery.clone(), robot.clone()), outbox)
            .await?;
        delivery.set_version(delivery.version() + 1);
        robot.set_version(robot.version() + 1);
        Ok((delivery, robot))
    }

    async fn commit(&self, changeset: Changeset, mut outbox: Outbox) -> Result<(), AppError> {
        self.store.commit(changeset).await?;
        self.publisher.publish_all(outbox.pull_domain_events()).await;
        Ok(())
    }

    fn observe_assignment<T>(&self, start: Instant, result: &Result<Option<T>, AppError>) {
        let outcome = match result {
            Ok(Some(_)) => "matched",
            Ok(None) => "no_match",
            Err(_) => "error",
        };
        self.metrics
            .record_assignment(outcome, start.elapsed().as_secs_f64());
    }
}
