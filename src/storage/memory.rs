//! In-process store backed by `DashMap`.
//!
//! Commits lock the delivery entry before the robot entry. Every changeset
//! follows that order, so two commits can never wait on each other in a
//! cycle, and telemetry commits (robot only) never touch the delivery map.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::{Changeset, DeliveryRepository, RobotRepository, Store};
use crate::error::{AppError, StoreError};
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::robot::{Robot, RobotStatus};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    deliveries: DashMap<Uuid, Delivery>,
    robots: DashMap<Uuid, Robot>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn commit_changeset(&self, changeset: Changeset) -> Result<(), StoreError> {
        if changeset.is_empty() {
            return Err(StoreError::EmptyChangeset);
        }

        let delivery_slot = match changeset.delivery {
            Some(delivery) => {
                let entry = self.deliveries.entry(delivery.id());
                check_version(&entry, "delivery", delivery.id(), delivery.version(), |d| {
                    d.version()
                })?;
                Some((entry, delivery))
            }
            None => None,
        };

        let robot_slot = match changeset.robot {
            Some(robot) => {
                let entry = self.robots.entry(robot.id());
                check_version(&entry, "robot", robot.id(), robot.version(), |r| r.version())?;
                Some((entry, robot))
            }
            None => None,
        };

        if let Some((entry, mut delivery)) = delivery_slot {
            delivery.set_version(delivery.version() + 1);
            drop(entry.insert(delivery));
        }
        if let Some((entry, mut robot)) = robot_slot {
            robot.set_version(robot.version() + 1);
            drop(entry.insert(robot));
        }

        Ok(())
    }
}

fn check_version<V>(
    entry: &Entry<'_, Uuid, V>,
    aggregate: &'static str,
    id: Uuid,
    expected: u64,
    version: impl Fn(&V) -> u64,
) -> Result<(), StoreError> {
    let actual = match entry {
        Entry::Occupied(occupied) => version(occupied.get()),
        Entry::Vacant(_) => 0,
    };

    if actual == expected {
        Ok(())
    } else {
        Err(StoreError::Conflict {
            aggregate,
            id,
            expected,
            actual,
        })
    }
}

#[async_trait]
impl DeliveryRepository for InMemoryStore {
    async fn find_delivery(&self, id: Uuid) -> Result<Option<Delivery>, AppError> {
        Ok(self.deliveries.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_deliveries_by_status(
        &self,
        status: DeliveryStatus,
    ) -> Result<Vec<Delivery>, AppError> {
        let mut deliveries: Vec<Delivery> = self
            .deliveries
            .iter()
            .filter(|entry| entry.value().status() == status)
            .map(|entry| entry.value().clone())
            .collect();
        deliveries.sort_by_key(|d| (d.created_at(), d.id()));
        Ok(deliveries)
    }

    async fn count_deliveries(&self) -> Result<usize, AppError> {
        Ok(self.deliveries.len())
    }
}

#[async_trait]
impl RobotRepository for InMemoryStore {
    async fn find_robot(&self, id: Uuid) -> Result<Option<Robot>, AppError> {
        Ok(self.robots.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_robots_by_status(&self, status: RobotStatus) -> Result<Vec<Robot>, AppError> {
        let mut robots: Vec<Robot> = self
            .robots
            .iter()
            .filter(|entry| entry.value().status() == status)
            .map(|entry| entry.value().clone())
            .collect();
        robots.sort_by_key(|r| (r.created_at(), r.id()));
        Ok(robots)
    }

    async fn count_robots(&self) -> Result<usize, AppError> {
        Ok(self.robots.len())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn commit(&self, changeset: Changeset) -> Result<(), AppError> {
        self.commit_changeset(changeset).map_err(AppError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryStore;
    use crate::error::{AppError, StoreError};
    use crate::geo::Coordinate;
    use crate::models::delivery::{Delivery, DeliveryStatus};
    use crate::models::location::{ContactRef, Location};
    use crate::models::robot::{Robot, RobotStatus};
    use crate::models::route::{RouteEstimate, RouteLeg};
    use crate::storage::{Changeset, DeliveryRepository, RobotRepository, Store};

    fn robot() -> Robot {
        Robot::register("r", Coordinate::new(37.5, 127.0).unwrap(), 90).unwrap()
    }

    fn delivery() -> Delivery {
        let c = Coordinate::new(37.5, 127.0).unwrap();
        Delivery::create(
            Location::new(c, "a").unwrap(),
            Location::new(c, "b").unwrap(),
            ContactRef::new("c").unwrap(),
            RouteEstimate::new(vec![RouteLeg {
                available: true,
                duration_secs: 1,
            }]),
        )
        .unwrap()
        .0
    }

    #[tokio::test]
    async fn insert_then_update_bumps_version() {
        let store = InMemoryStore::new();
        let robot = robot();
        store.commit(Changeset::robot(robot.clone())).await.unwrap();

        let mut stored = store.find_robot(robot.id()).await.unwrap().unwrap();
        assert_eq!(stored.version(), 1);

        stored.start_duty().unwrap();
        store.commit(Changeset::robot(stored)).await.unwrap();

        let reloaded = store.find_robot(robot.id()).await.unwrap().unwrap();
        assert_eq!(reloaded.version(), 2);
        assert_eq!(reloaded.status(), RobotStatus::Ready);
    }

    #[tokio::test]
    async fn stale_write_is_rejected() {
        let store = InMemoryStore::new();
        let robot = robot();
        store.commit(Changeset::robot(robot.clone())).await.unwrap();

        let mut first = store.find_robot(robot.id()).await.unwrap().unwrap();
        let mut second = first.clone();
        first.start_duty().unwrap();
        store.commit(Changeset::robot(first)).await.unwrap();

        second.update_battery(10).unwrap();
        let err = store.commit(Changeset::robot(second)).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() {
        let store = InMemoryStore::new();
        let robot = robot();
        store.commit(Changeset::robot(robot.clone())).await.unwrap();
        assert!(store.commit(Changeset::robot(robot)).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn conflict_on_robot_leaves_delivery_untouched() {
        let store = InMemoryStore::new();
        let robot = robot();
        let delivery = delivery();
        store.commit(Changeset::robot(robot.clone())).await.unwrap();

        // robot still at version 0: stale
        let err = store
            .commit(Changeset::pair(delivery.clone(), robot))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(store.find_delivery(delivery.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_changeset_is_rejected() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.commit(Changeset::new()).await,
            Err(AppError::Store(StoreError::EmptyChangeset))
        ));
    }

    #[tokio::test]
    async fn status_queries_filter_and_count() {
        let store = InMemoryStore::new();
        let pending = delivery();
        let mut canceled = delivery();
        canceled.cancel().unwrap();
        store.commit(Changeset::delivery(pending.clone())).await.unwrap();
        store.commit(Changeset::delivery(canceled)).await.unwrap();

        let found = store
            .find_deliveries_by_status(DeliveryStatus::Pending)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), pending.id());
        assert_eq!(store.count_deliveries().await.unwrap(), 2);
        assert_eq!(store.count_robots().await.unwrap(), 0);
    }
}
