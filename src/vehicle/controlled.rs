//! Vehicles driven by discrete meta-actions.

use super::control::{follow_road, speed_control, steering_control};
use super::{Command, Vehicle};
use crate::action::Action;
use crate::error::{SimError, SimResult};
use crate::network::{LaneIndex, Route};
use crate::road::Road;
use arrayvec::ArrayVec;
use std::collections::VecDeque;

/// The number of recent lanes remembered by a controlled vehicle.
pub const LANE_HISTORY_LEN: usize = 50;

/// The most target speeds a ladder can hold.
const MAX_LADDER_LEN: usize = 8;

/// The discrete target speeds a controlled vehicle chooses between, ascending.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeedLadder(ArrayVec<f64, MAX_LADDER_LEN>);

impl Default for SpeedLadder {
    fn default() -> Self {
        Self([20.0, 25.0, 30.0].into_iter().collect())
    }
}

impl SpeedLadder {
    /// Creates a ladder from ascending speeds in m/s.
    pub fn new(speeds: &[f64]) -> SimResult<Self> {
        if speeds.is_empty() || speeds.len() > MAX_LADDER_LEN {
            return Err(SimError::Config(format!(
                "a speed ladder needs between 1 and {} speeds, got {}",
                MAX_LADDER_LEN,
                speeds.len()
            )));
        }
        if speeds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SimError::Config(format!(
                "speed ladder {:?} is not strictly ascending",
                speeds
            )));
        }
        Ok(Self(speeds.iter().copied().collect()))
    }

    pub fn speeds(&self) -> &[f64] {
        &self.0
    }

    /// The index of the rung nearest to `speed`, assuming evenly spaced rungs.
    pub fn speed_to_index(&self, speed: f64) -> usize {
        let last = self.0.len() - 1;
        if last == 0 {
            return 0;
        }
        let (lo, hi) = (self.0[0], self.0[last]);
        let x = (speed - lo) / (hi - lo) * last as f64;
        x.round_ties_even().clamp(0.0, last as f64) as usize
    }

    /// The speed of a rung, clamping the index onto the ladder.
    pub fn index_to_speed(&self, index: usize) -> f64 {
        self.0[index.min(self.0.len() - 1)]
    }

    /// The rung `steps` above (or below) the one nearest to `speed`.
    pub fn shift(&self, speed: f64, steps: isize) -> f64 {
        let index = self.speed_to_index(speed) as isize + steps;
        let index = index.clamp(0, self.0.len() as isize - 1);
        self.index_to_speed(index as usize)
    }

    /// Snaps a speed onto the nearest rung.
    pub fn snap(&self, speed: f64) -> f64 {
        self.index_to_speed(self.speed_to_index(speed))
    }
}

/// The state of a vehicle driven by meta-actions.
#[derive(Clone, Debug)]
pub struct ControlledState {
    target_lane: LaneIndex,
    /// Always one of the ladder speeds.
    target_speed: f64,
    ladder: SpeedLadder,
    route: Route,
    exit_bound: bool,
    /// The number of meta-actions applied.
    ticks: usize,
    lane_history: VecDeque<LaneIndex>,
    /// The meta-action to apply on the next decision.
    pending: Option<Action>,
    tick_start_speed: f64,
    speed_delta: f64,
}

impl ControlledState {
    /// Creates the state of a vehicle aiming for `lane` at the ladder speed nearest `speed`.
    pub fn new(lane: LaneIndex, speed: f64, ladder: SpeedLadder) -> Self {
        Self {
            target_lane: lane,
            target_speed: ladder.snap(speed),
            ladder,
            route: Route::new(),
            exit_bound: false,
            ticks: 0,
            lane_history: VecDeque::with_capacity(LANE_HISTORY_LEN),
            pending: None,
            tick_start_speed: speed,
            speed_delta: 0.0,
        }
    }

    /// Marks the vehicle as heading for the exit, following `route`.
    pub fn with_exit_route(mut self, route: Route) -> Self {
        self.route = route;
        self.exit_bound = true;
        self
    }

    pub fn target_lane(&self) -> LaneIndex {
        self.target_lane
    }

    pub(crate) fn set_target_lane(&mut self, lane: LaneIndex) {
        self.target_lane = lane;
    }

    pub fn target_speed(&self) -> f64 {
        self.target_speed
    }

    pub fn ladder(&self) -> &SpeedLadder {
        &self.ladder
    }

    /// The remaining planned route.
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Whether the vehicle was assigned to take the exit.
    pub fn exit_bound(&self) -> bool {
        self.exit_bound
    }

    /// The number of meta-actions the vehicle has applied.
    pub fn ticks(&self) -> usize {
        self.ticks
    }

    /// The lanes the vehicle was on when it applied its most recent meta-actions, oldest first.
    pub fn lane_history(&self) -> &VecDeque<LaneIndex> {
        &self.lane_history
    }

    /// The change of speed over the last tick in m/s.
    pub fn speed_delta(&self) -> f64 {
        self.speed_delta
    }

    /// Queues a meta-action for the first substep of a tick.
    pub(crate) fn begin_tick(&mut self, action: Action, speed: f64) {
        self.pending = Some(action);
        self.tick_start_speed = speed;
    }

    pub(crate) fn end_tick(&mut self, speed: f64) {
        self.speed_delta = speed - self.tick_start_speed;
    }

    /// Applies any pending meta-action, then computes the low-level command.
    pub(crate) fn decide(&self, vehicle: &Vehicle, road: &Road) -> SimResult<(Command, Self)> {
        let network = road.network();
        let mut next = self.clone();
        next.target_lane = follow_road(vehicle, network, self.target_lane, &mut next.route)?;

        if let Some(action) = next.pending.take() {
            next.apply_action(action, vehicle, road)?;
        }

        let command = Command {
            steering: steering_control(vehicle, network, next.target_lane)?,
            acceleration: speed_control(vehicle.speed(), next.target_speed),
        };
        Ok((command, next))
    }

    fn apply_action(&mut self, action: Action, vehicle: &Vehicle, road: &Road) -> SimResult<()> {
        let network = road.network();
        self.ticks += 1;
        if self.lane_history.len() == LANE_HISTORY_LEN {
            self.lane_history.pop_front();
        }
        self.lane_history.push_back(vehicle.lane_index());

        match action {
            Action::Faster => self.target_speed = self.ladder.shift(vehicle.speed(), 1),
            Action::Slower => self.target_speed = self.ladder.shift(vehicle.speed(), -1),
            Action::LaneLeft | Action::LaneRight => {
                let count = network
                    .edge_lanes(self.target_lane.from, self.target_lane.to)
                    .len();
                let slot = match action {
                    Action::LaneLeft => self.target_lane.slot.saturating_sub(1),
                    _ => usize::min(self.target_lane.slot + 1, count.saturating_sub(1)),
                };
                let candidate = self.target_lane.with_slot(slot);
                if network.lane(candidate)?.is_reachable_from(vehicle.position()) {
                    self.target_lane = candidate;
                }
            }
            Action::Idle => {}
        }
        Ok(())
    }
}
