use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record of one robot/delivery pairing made by the assignment service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub delivery_id: Uuid,
    pub robot_id: Uuid,
    pub distance_m: f64,
    pub assigned_at: DateTime<Utc>,
}
