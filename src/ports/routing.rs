use async_trait::async_trait;

use super::RouteFinder;
use crate::error::AppError;
use crate::geo::{haversine_m, Coordinate};
use crate::models::route::{RouteEstimate, RouteLeg};

/// Estimates legs from great-circle distance at a constant speed. Legs
/// longer than `max_leg_m` are reported unavailable.
#[derive(Debug, Clone)]
pub struct StraightLineRouter {
    speed_mps: f64,
    max_leg_m: f64,
}

impl StraightLineRouter {
    pub fn new(speed_mps: f64, max_leg_m: f64) -> Result<Self, AppError> {
        if !(speed_mps.is_finite() && speed_mps > 0.0) {
            return Err(AppError::Internal(format!(
                "robot speed must be positive, got {speed_mps}"
            )));
        }
        Ok(Self {
            speed_mps,
            max_leg_m,
        })
    }

    fn leg(&self, from: &Coordinate, to: &Coordinate) -> RouteLeg {
        let distance_m = haversine_m(from, to);
        if distance_m > self.max_leg_m {
            return RouteLeg {
                available: false,
                duration_secs: 0,
            };
        }
        RouteLeg {
            available: true,
            duration_secs: (distance_m / self.speed_mps).ceil() as u64,
        }
    }
}

#[async_trait]
impl RouteFinder for StraightLineRouter {
    async fn find_route(&self, waypoints: &[Coordinate]) -> Result<RouteEstimate, AppError> {
        let legs = waypoints
            .windows(2)
            .map(|pair| self.leg(&pair[0], &pair[1]))
            .collect();
        Ok(RouteEstimate::new(legs))
    }
}
