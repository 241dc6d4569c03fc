//! Aggregate persistence contracts.
//!
//! Each aggregate carries an explicit `version`. A [`Changeset`] is committed
//! against the versions its aggregates were read at; if any stored version
//! moved in the meantime nothing is written and the commit fails with
//! [`StoreError::Conflict`](crate::error::StoreError::Conflict), which callers
//! treat as "re-read and retry".

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::robot::{Robot, RobotStatus};

#[async_trait]
pub trait DeliveryRepository: Send + Sync {
    async fn find_delivery(&self, id: Uuid) -> Result<Option<Delivery>, AppError>;

    /// Ordered by creation time, then id.
    async fn find_deliveries_by_status(
        &self,
        status: DeliveryStatus,
    ) -> Result<Vec<Delivery>, AppError>;

    async fn count_deliveries(&self) -> Result<usize, AppError>;
}

#[async_trait]
pub trait RobotRepository: Send + Sync {
    async fn find_robot(&self, id: Uuid) -> Result<Option<Robot>, AppError>;

    /// Ordered by creation time, then id.
    async fn find_robots_by_status(&self, status: RobotStatus) -> Result<Vec<Robot>, AppError>;

    async fn count_robots(&self) -> Result<usize, AppError>;
}

#[async_trait]
pub trait Store: DeliveryRepository + RobotRepository {
    /// Writes every aggregate in the changeset or none of them.
    async fn commit(&self, changeset: Changeset) -> Result<(), AppError>;
}

/// Aggregates touched by one unit of work: at most one delivery and one
/// robot, each at the version it was read at (0 for new aggregates).
#[derive(Debug, Default, Clone)]
pub struct Changeset {
    pub delivery: Option<Delivery>,
    pub robot: Option<Robot>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivery(delivery: Delivery) -> Self {
        Self {
            delivery: Some(delivery),
            robot: None,
        }
    }

    pub fn robot(robot: Robot) -> Self {
        Self {
            delivery: None,
            robot: Some(robot),
        }
    }

    pub fn pair(delivery: Delivery, robot: Robot) -> Self {
        Self {
            delivery: Some(delivery),
            robot: Some(robot),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.delivery.is_none() && self.robot.is_none()
    }
}
