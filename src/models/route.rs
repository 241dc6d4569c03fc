use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub available: bool,
    pub duration_secs: u64,
}

/// Per-leg estimate for an ordered waypoint sequence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteEstimate {
    pub legs: Vec<RouteLeg>,
}

impl RouteEstimate {
    pub fn new(legs: Vec<RouteLeg>) -> Self {
        Self { legs }
    }

    /// A route with no legs is never available.
    pub fn is_available(&self) -> bool {
        !self.legs.is_empty() && self.legs.iter().all(|leg| leg.available)
    }

    pub fn total_duration_secs(&self) -> u64 {
        self.legs.iter().map(|leg| leg.duration_secs).sum()
    }
}
