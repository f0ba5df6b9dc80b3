use crate::action::Action;
use crate::error::{SimError, SimResult};
use crate::vehicle::Vehicle;

/// The crash term of a crashed vehicle.
const CRASH_PENALTY: f64 = 100.0;

/// The weights of the reward terms. The cost weights are never positive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RewardWeights {
    speed: f64,
    speed_change: f64,
    crash: f64,
    lane_change: f64,
    lateral: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            speed: 1.0,
            speed_change: -10.0,
            crash: -10.0,
            lane_change: -5.0,
            lateral: 20.0,
        }
    }
}

impl RewardWeights {
    /// Creates a set of weights, failing if any cost weight is positive or NaN.
    pub fn new(
        speed: f64,
        speed_change: f64,
        crash: f64,
        lane_change: f64,
        lateral: f64,
    ) -> SimResult<Self> {
        for (name, value) in [
            ("acceleration_cost_w", speed_change),
            ("crash_cost_w", crash),
            ("lane_change_cost_w", lane_change),
        ] {
            if !(value <= 0.0) {
                return Err(SimError::PositiveCostWeight { name, value });
            }
        }
        Ok(Self {
            speed,
            speed_change,
            crash,
            lane_change,
            lateral,
        })
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn speed_change(&self) -> f64 {
        self.speed_change
    }

    pub fn crash(&self) -> f64 {
        self.crash
    }

    pub fn lane_change(&self) -> f64 {
        self.lane_change
    }

    pub fn lateral(&self) -> f64 {
        self.lateral
    }
}

/// The unweighted terms of a controlled vehicle's reward.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RewardTerms {
    /// Speed in m/s.
    pub speed: f64,
    /// Magnitude of the change of speed over the tick, in m/s.
    pub speed_change: f64,
    pub crash: f64,
    /// 1 if the action was a lane change.
    pub lane_change: f64,
    /// The world y coordinate, which grows towards the exit.
    pub lateral: f64,
}

impl RewardTerms {
    /// Computes the terms for a vehicle after it applied `action`.
    pub fn new(vehicle: &Vehicle, action: Action) -> Self {
        let speed_delta = vehicle.controlled().map_or(0.0, |s| s.speed_delta());
        Self {
            speed: vehicle.speed(),
            speed_change: speed_delta.abs(),
            crash: if vehicle.crashed() { CRASH_PENALTY } else { 0.0 },
            lane_change: if action.is_lane_change() { 1.0 } else { 0.0 },
            lateral: vehicle.position().y,
        }
    }

    /// The weighted sum of the terms.
    pub fn weighted(&self, weights: &RewardWeights) -> f64 {
        weights.speed * self.speed
            + weights.speed_change * self.speed_change
            + weights.crash * self.crash
            + weights.lane_change * self.lane_change
            + weights.lateral * self.lateral
    }
}
