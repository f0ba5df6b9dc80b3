use crate::action::Action;
use crate::config::Config;
use crate::constraint::enforce;
#[cfg(feature = "debug")]
use crate::debug::render_frame;
use crate::error::{SimError, SimResult};
use crate::math::Point2d;
use crate::network::LaneIndex;
use crate::observation::{Kinematics, ObservationBuilder};
use crate::reward::{RewardTerms, RewardWeights};
use crate::road::Road;
use crate::termination::{is_terminated, is_truncated};
use crate::util::near_split;
use crate::vehicle::behavior::BackgroundState;
use crate::vehicle::controlled::{ControlledState, SpeedLadder};
use crate::vehicle::idm::DriverModel;
use crate::vehicle::VehicleKind;
use crate::VehicleId;
use rand::rngs::StdRng;
use rand::seq::{IteratorRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use slotmap::SecondaryMap;

/// Give up placing a background vehicle after this many rejected positions.
const MAX_PLACEMENT_ATTEMPTS: usize = 100;

/// The base spacing between spawned vehicles in m, before speed and lane count adjustments.
const BASE_SPACING: f64 = 12.0; // m

/// What a [Simulation] reports for each controlled vehicle, alongside the observation.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Info {
    /// Elapsed time in s.
    pub time: f64,
    /// The number of ticks since the last reset.
    pub steps: usize,
    pub speeds: Vec<f64>,
    pub crashed: Vec<bool>,
    pub on_road: Vec<bool>,
    /// The actions applied during the last tick, after constraint enforcement.
    pub actions: Vec<Action>,
    /// Whether each requested action was replaced during constraint enforcement.
    pub overridden: Vec<bool>,
    pub reward_terms: Vec<RewardTerms>,
}

/// The outcome of a [Simulation::step].
#[derive(Clone, Debug)]
pub struct Step<T> {
    pub observation: T,
    /// One reward per controlled vehicle.
    pub rewards: Vec<f64>,
    /// Whether each controlled vehicle is done.
    pub terminated: Vec<bool>,
    /// Whether the episode is over.
    pub truncated: bool,
    pub info: Info,
}

/// A multi-agent traffic simulation of a road with an exit ramp.
pub struct Simulation<O: ObservationBuilder = Kinematics> {
    config: Config,
    weights: RewardWeights,
    ladder: SpeedLadder,
    observer: O,
    rng: StdRng,
    /// The road, or `None` if the simulation needs a reset.
    road: Option<Road>,
    /// The controlled vehicles, in the order agents address them.
    controlled: Vec<VehicleId>,
    /// The number of ticks since the last reset.
    steps: usize,
    /// Render frame of the previously simulated tick.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

impl Simulation<Kinematics> {
    /// Creates a new simulation observing vehicle kinematics.
    pub fn new(config: Config) -> SimResult<Self> {
        Self::with_observation(config, Kinematics::default())
    }
}

impl<O: ObservationBuilder> Simulation<O> {
    /// Creates a new simulation with a custom observation builder.
    pub fn with_observation(config: Config, observer: O) -> SimResult<Self> {
        config.validate()?;
        Ok(Self {
            weights: config.reward_weights()?,
            ladder: config.speed_ladder()?,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            observer,
            road: None,
            controlled: vec![],
            steps: 0,
            #[cfg(feature = "debug")]
            debug: serde_json::Value::Null,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn weights(&self) -> &RewardWeights {
        &self.weights
    }

    /// The road, if the simulation has been reset.
    pub fn road(&self) -> Option<&Road> {
        self.road.as_ref()
    }

    /// The controlled vehicles, in the order actions are given.
    pub fn controlled_vehicles(&self) -> &[VehicleId] {
        &self.controlled
    }

    /// The number of ticks since the last reset.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Elapsed time since the last reset in s.
    pub fn time(&self) -> f64 {
        self.steps as f64 / self.config.policy_frequency as f64
    }

    /// Starts a new episode, continuing the random number stream.
    pub fn reset(&mut self) -> SimResult<(O::Observation, Info)> {
        self.road = None;
        self.controlled.clear();
        self.steps = 0;

        let (road, controlled) = self.populate()?;
        log::info!(
            "reset: {} controlled and {} background vehicles",
            controlled.len(),
            road.len() - controlled.len()
        );
        let observation = self.observer.observe(&road, &controlled)?;
        let info = info(&road, &controlled, 0.0, 0, vec![], vec![], vec![])?;
        #[cfg(feature = "debug")]
        {
            self.debug = render_frame(&road, &self.config.render);
        }
        self.road = Some(road);
        self.controlled = controlled;
        Ok((observation, info))
    }

    /// Reseeds the random number generator, then starts a new episode.
    /// Equal seeds give equal initial states.
    pub fn reset_seeded(&mut self, seed: u64) -> SimResult<(O::Observation, Info)> {
        self.rng = StdRng::seed_from_u64(seed);
        self.reset()
    }

    /// Advances the simulation by one tick, applying one action per controlled vehicle.
    ///
    /// Errors other than a wrong number of actions end the episode; the
    /// simulation must then be reset.
    pub fn step(&mut self, actions: &[Action]) -> SimResult<Step<O::Observation>> {
        let road = self.road.as_mut().ok_or(SimError::NotReset)?;
        let (actions, overridden) = enforce(road, &self.controlled, actions, &self.config.corridor())?;
        let queued = self
            .controlled
            .iter()
            .copied()
            .zip(actions.iter().copied())
            .collect::<SecondaryMap<_, _>>();

        if let Err(err) = simulate(road, &queued, self.config.substeps(), self.config.substep_dt()) {
            log::warn!("episode aborted: {}", err);
            self.road = None;
            return Err(err);
        }
        self.steps += 1;
        let time = self.time();

        let road = self.road.as_ref().ok_or(SimError::NotReset)?;
        let mut rewards = Vec::with_capacity(actions.len());
        let mut terms = Vec::with_capacity(actions.len());
        let mut terminated = Vec::with_capacity(actions.len());
        for (id, action) in self.controlled.iter().zip(&actions) {
            let vehicle = road.vehicle(*id)?;
            let t = RewardTerms::new(vehicle, *action);
            rewards.push(t.weighted(&self.weights));
            terms.push(t);
            terminated.push(is_terminated(vehicle, self.config.offroad_terminal));
        }
        let truncated = is_truncated(&terminated, time, self.config.duration);
        if truncated {
            log::debug!("episode truncated at t = {:.1} s", time);
        }

        let observation = self.observer.observe(road, &self.controlled)?;
        let info = info(road, &self.controlled, time, self.steps, actions, overridden, terms)?;
        #[cfg(feature = "debug")]
        {
            self.debug = render_frame(road, &self.config.render);
        }
        Ok(Step {
            observation,
            rewards,
            terminated,
            truncated,
            info,
        })
    }

    /// Moves a vehicle to local coordinates of a lane, for setting up scenarios.
    pub fn place_vehicle(&mut self, id: VehicleId, lane: LaneIndex, long: f64, lat: f64) -> SimResult<()> {
        self.road
            .as_mut()
            .ok_or(SimError::NotReset)?
            .place(id, lane, long, lat)
    }

    /// Gets the render frame of the previously simulated tick as JSON.
    #[cfg(feature = "debug")]
    pub fn debug(&self) -> serde_json::Value {
        self.debug.clone()
    }

    /// Builds the road and places every vehicle on it.
    ///
    /// Each controlled vehicle is followed by its share of the background
    /// traffic, every vehicle placed ahead of all those before it.
    fn populate(&mut self) -> SimResult<(Road, Vec<VehicleId>)> {
        let (network, lanes) = self.config.scenario.build()?;
        let mut road = Road::new(network, lanes);
        let mut controlled = vec![];

        let background = self.config.vehicles_count - self.config.controlled_vehicles;
        let shares = near_split(background, self.config.controlled_vehicles);
        let exit_bound = self.config.exit_bound_count();

        for (i, share) in shares.into_iter().enumerate() {
            let entry = road.scenario().entry();
            let to = road
                .network()
                .successors(entry)
                .choose(&mut self.rng)
                .ok_or(SimError::EmptyNetwork)?;
            let lane = LaneIndex::new(entry, to, self.config.initial_lane_id);
            let speed = self.config.controlled_speed;
            let (position, heading) =
                spawn_pose(&road, lane, speed, self.config.ego_spacing, &mut self.rng)?;
            let lane = road.network().closest_lane_index(position, Some(heading))?;
            let mut state = ControlledState::new(lane, speed, self.ladder.clone());
            if i < exit_bound {
                state = state.with_exit_route(road.scenario().exit_route().clone());
            }
            let id = road.add_vehicle(position, heading, speed, VehicleKind::Controlled(state))?;
            log::debug!(
                "controlled vehicle {:?} on {} at x = {:.1}{}",
                id,
                road.network().describe(lane),
                position.x,
                if i < exit_bound { ", exit bound" } else { "" }
            );
            controlled.push(id);

            for _ in 0..share {
                self.add_background(&mut road)?;
            }
        }
        Ok((road, controlled))
    }

    /// Places a background vehicle on a random spawn lane.
    fn add_background(&mut self, road: &mut Road) -> SimResult<VehicleId> {
        let spawn_lanes = road.scenario().spawn_lanes().to_vec();
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let lane = *spawn_lanes
                .choose(&mut self.rng)
                .ok_or(SimError::Placement(0))?;
            let limit = road.network().lane(lane)?.speed_limit();
            let speed = self.rng.gen_range(0.7 * limit..0.8 * limit);
            let spacing = 1.0 / self.config.vehicles_density;
            let (position, heading) = spawn_pose(road, lane, speed, spacing, &mut self.rng)?;

            let closest = road.network().closest_lane_index(position, Some(heading))?;
            if !spawn_lanes.contains(&closest) {
                log::trace!(
                    "rejected spawn at x = {:.1}, closest lane {} is not a spawn lane",
                    position.x,
                    road.network().describe(closest)
                );
                continue;
            }
            let mut model = DriverModel::default();
            model.randomize(&mut self.rng);
            let state = BackgroundState::new(closest, speed, position).with_model(model);
            return road.add_vehicle(position, heading, speed, VehicleKind::Background(state));
        }
        Err(SimError::Placement(MAX_PLACEMENT_ATTEMPTS))
    }
}

/// Runs the physics substeps of one tick.
fn simulate(
    road: &mut Road,
    actions: &SecondaryMap<VehicleId, Action>,
    substeps: u32,
    dt: f64,
) -> SimResult<()> {
    road.begin_tick(actions)?;
    for _ in 0..substeps {
        road.step(dt)?;
    }
    road.end_tick();
    Ok(())
}

/// Picks a pose on `lane` ahead of every vehicle already on the road, at a
/// gap that grows with speed and shrinks with the number of parallel lanes.
fn spawn_pose(
    road: &Road,
    lane: LaneIndex,
    speed: f64,
    spacing: f64,
    rng: &mut StdRng,
) -> SimResult<(Point2d, f64)> {
    let network = road.network();
    let target = network.lane(lane)?;
    let lanes = network.edge_lanes(lane.from, lane.to).len() as f64;
    let offset = spacing * (BASE_SPACING + speed) * (-5.0 / 40.0 * lanes).exp();
    let x0 = road
        .iter()
        .map(|v| target.local_coordinates(v.position()).0)
        .reduce(f64::max)
        .unwrap_or(3.0 * offset);
    let x0 = x0 + offset * rng.gen_range(0.9..1.1);
    Ok((target.position(x0, 0.0), target.heading_at(x0)))
}

fn info(
    road: &Road,
    controlled: &[VehicleId],
    time: f64,
    steps: usize,
    actions: Vec<Action>,
    overridden: Vec<bool>,
    reward_terms: Vec<RewardTerms>,
) -> SimResult<Info> {
    let vehicles = controlled
        .iter()
        .map(|id| road.vehicle(*id))
        .collect::<SimResult<Vec<_>>>()?;
    Ok(Info {
        time,
        steps,
        speeds: vehicles.iter().map(|v| v.speed()).collect(),
        crashed: vehicles.iter().map(|v| v.crashed()).collect(),
        on_road: vehicles.iter().map(|v| v.on_road()).collect(),
        actions,
        overridden,
        reward_terms,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn step_before_reset_fails() {
        let mut sim = Simulation::new(Config::default()).unwrap();
        assert!(matches!(sim.step(&[Action::Idle; 4]), Err(SimError::NotReset)));
    }

    #[test]
    fn populates_road() {
        let mut sim = Simulation::new(Config::default()).unwrap();
        let (obs, info) = sim.reset().unwrap();
        let road = sim.road().unwrap();
        assert_eq!(road.len(), 10);
        assert_eq!(sim.controlled_vehicles().len(), 4);
        assert_eq!(obs.len(), 4);
        assert_eq!(info.speeds, vec![25.0; 4]);

        let exit_bound = sim
            .controlled_vehicles()
            .iter()
            .filter(|id| road.vehicle(**id).unwrap().controlled().unwrap().exit_bound())
            .count();
        assert_eq!(exit_bound, 2);

        let spawn = road.scenario().spawn_lanes();
        for vehicle in road.iter().filter(|v| !v.is_controlled()) {
            assert!(spawn.contains(&vehicle.lane_index()));
        }
    }

    #[test]
    fn wrong_action_count_keeps_episode() {
        let mut sim = Simulation::new(Config::default()).unwrap();
        sim.reset().unwrap();
        assert!(matches!(
            sim.step(&[Action::Idle]),
            Err(SimError::ActionCountMismatch { expected: 4, got: 1 })
        ));
        assert!(sim.step(&[Action::Idle; 4]).is_ok());
    }

    #[test]
    fn time_advances_per_tick() {
        let config = Config {
            policy_frequency: 5,
            ..Default::default()
        };
        let mut sim = Simulation::new(config).unwrap();
        sim.reset().unwrap();
        for _ in 0..5 {
            sim.step(&[Action::Idle; 4]).unwrap();
        }
        assert_eq!(sim.steps(), 5);
        assert!((sim.time() - 1.0).abs() < 1e-12);
    }
}
