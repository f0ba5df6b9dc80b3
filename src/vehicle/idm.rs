use super::Vehicle;
use crate::error::SimResult;
use crate::math::not_zero;
use crate::network::RoadNetwork;
use cgmath::prelude::*;
use rand::Rng;

/// The maximum acceleration magnitude of background vehicles in m/s<sup>2</sup>.
pub const ACC_MAX: f64 = 6.0; // m/s^2

/// The range the acceleration exponent is drawn from when randomized.
pub const DELTA_RANGE: [f64; 2] = [3.5, 4.5];

/// The interval between lane change evaluations in s.
pub const LANE_CHANGE_DELAY: f64 = 1.0; // s

/// The car following and lane changing model of a background vehicle.
#[derive(Clone, Debug)]
pub struct DriverModel {
    comf_acc: f64,
    comf_dec: f64,
    min_gap: f64,
    headway: f64,
    delta: f64,
    politeness: f64,
    min_acc_gain: f64,
    max_braking_imposed: f64,
}

/// The parameters of the driver model.
#[derive(Clone, Copy, Debug)]
pub struct ModelParams {
    /// The comfortable acceleration in m/s<sup>2</sup>.
    pub comf_acceleration: f64,
    /// The comfortable deceleration, a negative number in m/s<sup>2</sup>.
    pub comf_deceleration: f64,
    /// The desired jam distance to the vehicle ahead in m, centre to centre.
    pub min_gap: f64,
    /// The desired time gap to the vehicle ahead in s.
    pub time_headway: f64,
    /// The acceleration exponent.
    pub delta: f64,
    /// How much the gains of other vehicles count towards a lane change.
    pub politeness: f64,
    /// The minimum acceleration gain needed to change lane in m/s<sup>2</sup>.
    pub min_acc_gain: f64,
    /// The strongest braking a lane change may impose on the new follower in m/s<sup>2</sup>.
    pub max_braking_imposed: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            comf_acceleration: 3.0,
            comf_deceleration: -5.0,
            min_gap: 10.0,
            time_headway: 1.5,
            delta: 4.0,
            politeness: 0.0,
            min_acc_gain: 0.2,
            max_braking_imposed: 2.0,
        }
    }
}

impl Default for DriverModel {
    fn default() -> Self {
        Self::new(&ModelParams::default())
    }
}

impl DriverModel {
    /// Creates a new driver model.
    pub fn new(params: &ModelParams) -> Self {
        Self {
            comf_acc: params.comf_acceleration,
            comf_dec: params.comf_deceleration,
            min_gap: params.min_gap,
            headway: params.time_headway,
            delta: params.delta,
            politeness: params.politeness,
            min_acc_gain: params.min_acc_gain,
            max_braking_imposed: params.max_braking_imposed,
        }
    }

    /// Draws the acceleration exponent uniformly from [DELTA_RANGE].
    pub fn randomize(&mut self, rng: &mut impl Rng) {
        self.delta = rng.gen_range(DELTA_RANGE[0]..=DELTA_RANGE[1]);
    }

    /// The acceleration exponent.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn politeness(&self) -> f64 {
        self.politeness
    }

    pub fn min_acc_gain(&self) -> f64 {
        self.min_acc_gain
    }

    pub fn max_braking_imposed(&self) -> f64 {
        self.max_braking_imposed
    }

    /// Computes the acceleration `ego` would choose when following `front`,
    /// using the intelligent driver model with this model's parameters.
    ///
    /// A missing `ego` has no acceleration. A missing `front` means a free road.
    pub fn acceleration(
        &self,
        network: &RoadNetwork,
        ego: Option<&Vehicle>,
        front: Option<&Vehicle>,
    ) -> SimResult<f64> {
        let ego = match ego {
            Some(ego) => ego,
            None => return Ok(0.0),
        };
        let limit = network.lane(ego.lane_index())?.speed_limit();
        let target_speed = ego.target_speed().clamp(0.0, limit);
        let ratio = f64::max(ego.speed(), 0.0) / not_zero(target_speed).abs();
        let mut acc = self.comf_acc * (1.0 - ratio.powf(self.delta));

        if let Some(front) = front {
            let net_dist = ego.lane_distance_to(front, network)?;
            let term = self.desired_gap(ego, front) / not_zero(net_dist);
            acc -= self.comf_acc * term * term;
        }
        Ok(acc)
    }

    /// The gap `ego` wants to keep to `front`, in m.
    pub fn desired_gap(&self, ego: &Vehicle, front: &Vehicle) -> f64 {
        let ab = -self.comf_acc * self.comf_dec;
        let appr = (ego.velocity() - front.velocity()).dot(ego.direction());
        let vel = ego.speed();
        self.min_gap + vel * self.headway + vel * appr / (2.0 * ab.sqrt())
    }
}
