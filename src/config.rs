use crate::error::{SimError, SimResult};
use crate::reward::RewardWeights;
use crate::scenario::{ExitCorridor, ScenarioGeometry};
use crate::vehicle::controlled::SpeedLadder;

/// The configuration of a [Simulation](crate::Simulation).
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// The total number of vehicles, controlled ones included.
    pub vehicles_count: usize,
    /// The number of vehicles driven by the agent.
    pub controlled_vehicles: usize,
    /// The share of controlled vehicles routed onto the exit ramp.
    pub exit_controlled_vehicles_ratio: f64,
    /// Reward weight of the speed term.
    pub speed_reward_w: f64,
    /// Reward weight of the speed change term. Must not be positive.
    pub acceleration_cost_w: f64,
    /// Reward weight of the crash term. Must not be positive.
    pub crash_cost_w: f64,
    /// Reward weight of the lane change term. Must not be positive.
    pub lane_change_cost_w: f64,
    /// Reward weight of the lateral position term.
    pub export_reward_w: f64,
    /// Where the exit corridor starts, in m along the road.
    pub export_of_cav: f64,
    /// The length of the exit corridor in m.
    pub export_length: f64,
    /// The slot controlled vehicles start in.
    pub initial_lane_id: usize,
    /// Spacing factor between controlled vehicles and the vehicles ahead of them.
    pub ego_spacing: f64,
    /// Density of background traffic. Higher is denser.
    pub vehicles_density: f64,
    /// Whether leaving the road terminates a controlled vehicle.
    pub offroad_terminal: bool,
    /// Episode length in s.
    pub duration: f64,
    /// Physics substeps per second.
    pub simulation_frequency: u32,
    /// Agent decisions per second.
    pub policy_frequency: u32,
    /// The initial speed of controlled vehicles in m/s.
    pub controlled_speed: f64,
    /// The speeds controlled vehicles choose between, ascending, in m/s.
    pub target_speeds: Vec<f64>,
    /// The seed of the random number generator.
    pub seed: u64,
    pub scenario: ScenarioGeometry,
    pub render: RenderConfig,
}

/// Display settings passed through to an external renderer.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RenderConfig {
    /// Where the view is centred, as a fraction of the screen.
    pub centering_position: [f64; 2],
    pub screen_width: u32,
    pub screen_height: u32,
    /// Pixels per m.
    pub scaling: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            centering_position: [-0.0, 0.4],
            screen_width: 2400,
            screen_height: 300,
            scaling: 2.5,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vehicles_count: 10,
            controlled_vehicles: 4,
            exit_controlled_vehicles_ratio: 0.5,
            speed_reward_w: 1.0,
            acceleration_cost_w: -10.0,
            crash_cost_w: -10.0,
            lane_change_cost_w: -5.0,
            export_reward_w: 20.0,
            export_of_cav: 300.0,
            export_length: 100.0,
            initial_lane_id: 0,
            ego_spacing: 2.0,
            vehicles_density: 1.0,
            offroad_terminal: true,
            duration: 40.0,
            simulation_frequency: 15,
            policy_frequency: 1,
            controlled_speed: 25.0,
            target_speeds: vec![20.0, 25.0, 30.0],
            seed: 0,
            scenario: ScenarioGeometry::default(),
            render: RenderConfig::default(),
        }
    }
}

impl Config {
    /// Checks the configuration for values the simulation cannot run with.
    pub fn validate(&self) -> SimResult<()> {
        self.reward_weights()?;
        self.speed_ladder()?;
        self.scenario.validate()?;
        if self.controlled_vehicles == 0 {
            return Err(SimError::Config("need at least one controlled vehicle".into()));
        }
        if self.vehicles_count < self.controlled_vehicles {
            return Err(SimError::Config(format!(
                "vehicles_count ({}) is less than controlled_vehicles ({})",
                self.vehicles_count, self.controlled_vehicles
            )));
        }
        if !(0.0..=1.0).contains(&self.exit_controlled_vehicles_ratio) {
            return Err(SimError::Config(format!(
                "exit_controlled_vehicles_ratio must lie in [0, 1], got {}",
                self.exit_controlled_vehicles_ratio
            )));
        }
        if self.policy_frequency == 0 || self.simulation_frequency < self.policy_frequency {
            return Err(SimError::Config(format!(
                "simulation_frequency ({}) must be at least policy_frequency ({}), which must be positive",
                self.simulation_frequency, self.policy_frequency
            )));
        }
        if self.initial_lane_id >= self.scenario.through_lanes {
            return Err(SimError::Config(format!(
                "initial_lane_id {} is not a through lane",
                self.initial_lane_id
            )));
        }
        if self.vehicles_density <= 0.0 || self.ego_spacing <= 0.0 {
            return Err(SimError::Config(
                "vehicles_density and ego_spacing must be positive".into(),
            ));
        }
        if self.duration < 0.0 || self.export_length < 0.0 {
            return Err(SimError::Config(
                "duration and export_length must not be negative".into(),
            ));
        }
        Ok(())
    }

    /// The validated reward weights.
    pub fn reward_weights(&self) -> SimResult<RewardWeights> {
        RewardWeights::new(
            self.speed_reward_w,
            self.acceleration_cost_w,
            self.crash_cost_w,
            self.lane_change_cost_w,
            self.export_reward_w,
        )
    }

    /// The validated speed ladder of controlled vehicles.
    pub fn speed_ladder(&self) -> SimResult<SpeedLadder> {
        SpeedLadder::new(&self.target_speeds)
    }

    /// The window in which controlled vehicles may leave the reserved lane.
    pub fn corridor(&self) -> ExitCorridor {
        ExitCorridor::new(self.export_of_cav, self.export_length)
    }

    /// The number of physics substeps per agent decision.
    pub fn substeps(&self) -> u32 {
        (self.simulation_frequency / self.policy_frequency).max(1)
    }

    /// The length of a physics substep in s.
    pub fn substep_dt(&self) -> f64 {
        1.0 / self.simulation_frequency as f64
    }

    /// The number of controlled vehicles routed onto the exit ramp.
    pub fn exit_bound_count(&self) -> usize {
        let n = self.controlled_vehicles as f64 * self.exit_controlled_vehicles_ratio;
        (n.round() as usize).min(self.controlled_vehicles)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.substeps(), 15);
        assert_eq!(config.exit_bound_count(), 2);
        assert!(config.corridor().contains(350.0));
    }

    #[test]
    fn rejects_positive_cost() {
        let config = Config {
            acceleration_cost_w: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimError::PositiveCostWeight { .. })
        ));
    }

    #[test]
    fn rejects_too_few_vehicles() {
        let config = Config {
            vehicles_count: 3,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SimError::Config(_))));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json() {
        let config: Config =
            serde_json::from_str(r#"{"controlled_vehicles": 1, "duration": 10.0}"#).unwrap();
        assert_eq!(config.controlled_vehicles, 1);
        assert_eq!(config.duration, 10.0);
        assert_eq!(config.vehicles_count, 10);
        assert_eq!(config.render, RenderConfig::default());
    }
}
