//! Contracts for the collaborators the dispatch core consumes but does not
//! own: routing, robot actuation and the published event stream.

pub mod actuation;
pub mod history;
pub mod routing;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::Coordinate;
use crate::models::event::DomainEvent;
use crate::models::route::RouteEstimate;

#[async_trait]
pub trait RouteFinder: Send + Sync {
    /// Estimates every leg between consecutive waypoints.
    async fn find_route(&self, waypoints: &[Coordinate]) -> Result<RouteEstimate, AppError>;
}

/// Fire-and-forget robot commands. Failures are logged by the caller and
/// never undo the domain change that triggered them.
#[async_trait]
pub trait RobotActuator: Send + Sync {
    async fn navigate_to(&self, robot_id: Uuid, destination: Coordinate) -> Result<(), AppError>;

    async fn open_door(&self, robot_id: Uuid) -> Result<(), AppError>;
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish_all(&self, events: &[DomainEvent]) -> Result<(), AppError>;
}
