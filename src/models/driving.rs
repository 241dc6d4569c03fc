//! Distance classifier that turns a stream of robot positions into discrete
//! approach and arrival signals for a single navigation target.
//!
//! Stages only move forward: `OnGoing -> Approaching -> Arrived`. The caller
//! stores the current stage next to the target and feeds every new distance
//! through [`DrivingStatus::advance`].

use serde::{Deserialize, Serialize};

pub const ON_GOING_THRESHOLD_M: f64 = 1_500.0;
pub const APPROACHING_THRESHOLD_M: f64 = 50.0;
pub const ARRIVAL_THRESHOLD_M: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DrivingStatus {
    OnGoing,
    Approaching,
    Arrived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximitySignal {
    Approaching,
    Arrived,
}

impl DrivingStatus {
    pub fn threshold_m(self) -> f64 {
        match self {
            DrivingStatus::OnGoing => ON_GOING_THRESHOLD_M,
            DrivingStatus::Approaching => APPROACHING_THRESHOLD_M,
            DrivingStatus::Arrived => ARRIVAL_THRESHOLD_M,
        }
    }

    pub fn next(self) -> Option<DrivingStatus> {
        match self {
            DrivingStatus::OnGoing => Some(DrivingStatus::Approaching),
            DrivingStatus::Approaching => Some(DrivingStatus::Arrived),
            DrivingStatus::Arrived => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    /// True when `distance_m` is within the next stage's threshold.
    pub fn can_advance(self, distance_m: f64) -> bool {
        self.next()
            .is_some_and(|next| distance_m <= next.threshold_m())
    }

    /// Signal emitted when a stage is entered.
    pub fn signal(self) -> Option<ProximitySignal> {
        match self {
            DrivingStatus::OnGoing => None,
            DrivingStatus::Approaching => Some(ProximitySignal::Approaching),
            DrivingStatus::Arrived => Some(ProximitySignal::Arrived),
        }
    }

    /// Moves as far forward as `distance_m` allows. When several stages are
    /// crossed by one sample only the deepest stage's signal is returned.
    pub fn advance(self, distance_m: f64) -> (DrivingStatus, Option<ProximitySignal>) {
        let mut status = self;
        while status.can_advance(distance_m) {
            match status.next() {
                Some(next) => status = next,
                None => break,
            }
        }

        if status == self {
            (status, None)
        } else {
            (status, status.signal())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DrivingStatus, ProximitySignal};

    #[test]
    fn thresholds_shrink_toward_arrival() {
        assert_eq!(DrivingStatus::OnGoing.threshold_m(), 1_500.0);
        assert_eq!(DrivingStatus::Approaching.threshold_m(), 50.0);
        assert_eq!(DrivingStatus::Arrived.threshold_m(), 5.0);
    }

    #[test]
    fn far_away_stays_on_going() {
        assert_eq!(DrivingStatus::OnGoing.advance(900.0), (DrivingStatus::OnGoing, None));
    }

    #[test]
    fn crossing_fifty_meters_signals_approaching() {
        assert_eq!(
            DrivingStatus::OnGoing.advance(50.0),
            (DrivingStatus::Approaching, Some(ProximitySignal::Approaching))
        );
    }

    #[test]
    fn approaching_does_not_repeat() {
        assert_eq!(
            DrivingStatus::Approaching.advance(30.0),
            (DrivingStatus::Approaching, None)
        );
    }

    #[test]
    fn crossing_five_meters_signals_arrival() {
        assert_eq!(
            DrivingStatus::Approaching.advance(4.0),
            (DrivingStatus::Arrived, Some(ProximitySignal::Arrived))
        );
    }

    #[test]
    fn jump_straight_to_arrival_reports_only_arrival() {
        assert_eq!(
            DrivingStatus::OnGoing.advance(1.0),
            (DrivingStatus::Arrived, Some(ProximitySignal::Arrived))
        );
    }

    #[test]
    fn arrived_is_terminal() {
        assert!(DrivingStatus::Arrived.is_terminal());
        assert!(!DrivingStatus::Arrived.can_advance(0.0));
        assert_eq!(DrivingStatus::Arrived.advance(0.0), (DrivingStatus::Arrived, None));
    }

    #[test]
    fn on_going_emits_nothing_on_entry() {
        assert_eq!(DrivingStatus::OnGoing.signal(), None);
    }
}
