use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinate;

/// One reading from a robot's telemetry feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub robot_id: Uuid,
    pub location: Coordinate,
    pub battery: i64,
    #[serde(default)]
    pub door_open: bool,
    #[serde(default)]
    pub load_weight_kg: f64,
}
