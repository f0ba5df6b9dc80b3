//! Background traffic: IDM car following with MOBIL lane changes, kept out of
//! the reserved fast lane.

use super::control::{follow_road, steering_control};
use super::idm::{DriverModel, ACC_MAX, LANE_CHANGE_DELAY};
use super::{Command, Decision, Vehicle, VehicleKind};
use crate::error::SimResult;
use crate::math::Point2d;
use crate::network::{LaneIndex, Route};
use crate::road::Road;
use std::f64::consts::PI;

/// Vehicles slower than this never start a lane change, in m/s.
const MIN_LANE_CHANGE_SPEED: f64 = 1.0; // m/s

/// The state of a background vehicle.
#[derive(Clone, Debug)]
pub struct BackgroundState {
    target_lane: LaneIndex,
    target_speed: f64,
    route: Route,
    model: DriverModel,
    /// Time since the last lane change evaluation in s.
    timer: f64,
    enable_lane_change: bool,
}

impl BackgroundState {
    /// Creates the state of a vehicle at `position` aiming for `lane` at `target_speed`.
    pub fn new(lane: LaneIndex, target_speed: f64, position: Point2d) -> Self {
        Self {
            target_lane: lane,
            target_speed,
            route: Route::new(),
            model: DriverModel::default(),
            // Stagger evaluations between vehicles
            timer: ((position.x + position.y) * PI).rem_euclid(LANE_CHANGE_DELAY),
            enable_lane_change: true,
        }
    }

    /// Replaces the driver model.
    pub fn with_model(mut self, model: DriverModel) -> Self {
        self.model = model;
        self
    }

    /// Enables or disables lane changes.
    pub fn with_lane_change(mut self, enable: bool) -> Self {
        self.enable_lane_change = enable;
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

    pub fn set_target_speed(&mut self, speed: f64) {
        self.target_speed = speed;
    }

    pub fn model(&self) -> &DriverModel {
        &self.model
    }

    pub fn timer(&self) -> f64 {
        self.timer
    }

    pub(crate) fn set_timer(&mut self, timer: f64) {
        self.timer = timer;
    }

    /// Computes the vehicle's next command and state.
    pub(crate) fn decide(&self, vehicle: &Vehicle, road: &Road, dt: f64) -> SimResult<Decision> {
        let mut next = self.clone();
        if vehicle.crashed() {
            next.timer += dt;
            return Ok(Decision {
                command: vehicle.command(),
                speed: vehicle.speed(),
                kind: VehicleKind::Background(next),
            });
        }

        let network = road.network();
        next.target_lane = follow_road(vehicle, network, self.target_lane, &mut next.route)?;

        // The snapped speed is used for the rest of the decision
        let mut me = vehicle.clone();
        if next.enable_lane_change {
            me.speed = network.lane(me.lane_index())?.speed_limit();
            next.change_lane_policy(&me, road)?;
        }

        let steering = steering_control(&me, network, next.target_lane)?;
        let (front, _) = road.neighbour_vehicles(&me, me.lane_index())?;
        let mut acceleration = next.model.acceleration(network, Some(&me), front)?;
        if me.lane_index() != next.target_lane {
            let (front, _) = road.neighbour_vehicles(&me, next.target_lane)?;
            let target_acc = next.model.acceleration(network, Some(&me), front)?;
            acceleration = f64::min(acceleration, target_acc);
        }
        let acceleration = acceleration.clamp(-ACC_MAX, ACC_MAX);

        next.timer += dt;
        Ok(Decision {
            command: Command {
                acceleration,
                steering,
            },
            speed: me.speed,
            kind: VehicleKind::Background(next),
        })
    }

    /// Decides whether to start, keep or abort a lane change.
    fn change_lane_policy(&mut self, me: &Vehicle, road: &Road) -> SimResult<()> {
        let network = road.network();
        let scenario = road.scenario();

        if scenario.is_reserved(self.target_lane) {
            log::debug!(
                "vehicle {:?} kept out of reserved lane {}",
                me.id(),
                network.describe(self.target_lane)
            );
            self.target_lane = me.lane_index();
            return Ok(());
        }

        // A lane change is ongoing
        if me.lane_index() != self.target_lane {
            if me.lane_index().edge() == self.target_lane.edge() {
                for other in road.iter() {
                    if other.id() == me.id()
                        || other.lane_index() == self.target_lane
                        || other.target_lane() != self.target_lane
                    {
                        continue;
                    }
                    let d = me.lane_distance_to(other, network)?;
                    let d_star = self.model.desired_gap(me, other);
                    if 0.0 < d && d < d_star {
                        log::trace!("vehicle {:?} aborts its lane change", me.id());
                        self.target_lane = me.lane_index();
                        break;
                    }
                }
            }
            return Ok(());
        }

        if self.timer <= LANE_CHANGE_DELAY {
            return Ok(());
        }
        self.timer = 0.0;

        for lane in network.side_lanes(me.lane_index()) {
            if scenario.is_reserved(lane) {
                continue;
            }
            if !network.lane(lane)?.is_reachable_from(me.position()) {
                continue;
            }
            if me.speed().abs() < MIN_LANE_CHANGE_SPEED {
                continue;
            }
            if self.mobil(me, lane, road)? {
                self.target_lane = lane;
            }
        }
        Ok(())
    }

    /// Whether the MOBIL model approves a change onto `lane`.
    ///
    /// The change is rejected when the new follower would have to brake
    /// harder than allowed, and approved when the vehicle's own acceleration
    /// gain plus the politeness-weighted gains of both followers is large
    /// enough.
    pub(crate) fn mobil(&self, me: &Vehicle, lane: LaneIndex, road: &Road) -> SimResult<bool> {
        let network = road.network();
        let model = &self.model;

        let (new_preceding, new_following) = road.neighbour_vehicles(me, lane)?;
        let new_following_a = model.acceleration(network, new_following, new_preceding)?;
        let new_following_pred_a = model.acceleration(network, new_following, Some(me))?;
        if new_following_pred_a < -model.max_braking_imposed() {
            return Ok(false);
        }

        let (old_preceding, old_following) = road.neighbour_vehicles(me, me.lane_index())?;
        let self_pred_a = model.acceleration(network, Some(me), new_preceding)?;
        let self_a = model.acceleration(network, Some(me), old_preceding)?;
        let old_following_a = model.acceleration(network, old_following, Some(me))?;
        let old_following_pred_a = model.acceleration(network, old_following, old_preceding)?;
        let gain = self_pred_a - self_a
            + model.politeness()
                * (new_following_pred_a - new_following_a + old_following_pred_a
                    - old_following_a);
        Ok(gain >= model.min_acc_gain())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scenario::ScenarioGeometry;
    use crate::VehicleId;

    const DT: f64 = 1.0 / 15.0;

    fn road() -> Road {
        let (network, scenario) = ScenarioGeometry::default().build().unwrap();
        Road::new(network, scenario)
    }

    fn add(road: &mut Road, lane: LaneIndex, target: LaneIndex, x: f64, speed: f64) -> VehicleId {
        let position = road.network().lane(lane).unwrap().position(x, 0.0);
        let mut state = BackgroundState::new(target, speed, position);
        state.set_timer(1.5);
        road.add_vehicle(position, 0.0, speed, VehicleKind::Background(state))
            .unwrap()
    }

    fn decided_target(road: &Road, id: VehicleId) -> LaneIndex {
        let vehicle = road.vehicle(id).unwrap();
        match vehicle.decide(road, DT).unwrap().kind {
            VehicleKind::Background(state) => state.target_lane(),
            VehicleKind::Controlled(_) => unreachable!(),
        }
    }

    #[test]
    fn overtakes_slow_leader() {
        let mut road = road();
        let lane = road.scenario().reserved()[0].with_slot(1);
        let ego = add(&mut road, lane, lane, 100.0, 22.22);
        add(&mut road, lane, lane, 115.0, 10.0);
        assert_eq!(decided_target(&road, ego), lane.with_slot(2));
    }

    #[test]
    fn never_proposes_reserved_lane() {
        let mut road = road();
        let lane = road.scenario().reserved()[0].with_slot(1);
        let ego = add(&mut road, lane, lane, 100.0, 22.22);
        add(&mut road, lane, lane, 115.0, 10.0);
        // Makes the right lane unsafe
        add(&mut road, lane.with_slot(2), lane.with_slot(2), 92.0, 22.22);

        let vehicle = road.vehicle(ego).unwrap();
        let state = match vehicle.kind() {
            VehicleKind::Background(state) => state,
            VehicleKind::Controlled(_) => unreachable!(),
        };
        let mut me = vehicle.clone();
        me.speed = 22.22;
        assert!(state.mobil(&me, lane.with_slot(0), &road).unwrap());
        assert!(!state.mobil(&me, lane.with_slot(2), &road).unwrap());

        assert_eq!(decided_target(&road, ego), lane);
    }

    #[test]
    fn reserved_target_is_reset() {
        let mut road = road();
        let reserved = road.scenario().reserved()[0];
        let lane = reserved.with_slot(1);
        let ego = add(&mut road, lane, reserved, 100.0, 22.22);
        assert_eq!(decided_target(&road, ego), lane);
    }

    #[test]
    fn lane_changes_can_be_disabled() {
        let mut road = road();
        let lane = road.scenario().reserved()[0].with_slot(1);
        let ego = add(&mut road, lane, lane, 100.0, 22.22);
        add(&mut road, lane, lane, 115.0, 10.0);
        if let VehicleKind::Background(state) = road.vehicle_mut(ego).unwrap().kind_mut() {
            *state = state.clone().with_lane_change(false);
        }
        assert_eq!(decided_target(&road, ego), lane);
    }

    #[test]
    fn waits_for_timer() {
        let mut road = road();
        let lane = road.scenario().reserved()[0].with_slot(1);
        let ego = add(&mut road, lane, lane, 100.0, 22.22);
        add(&mut road, lane, lane, 115.0, 10.0);
        if let VehicleKind::Background(state) = road.vehicle_mut(ego).unwrap().kind_mut() {
            state.set_timer(0.5);
        }
        assert_eq!(decided_target(&road, ego), lane);
    }

    #[test]
    fn snaps_speed_to_lane_limit() {
        let mut road = road();
        let lane = road.scenario().reserved()[0].with_slot(1);
        let ego = add(&mut road, lane, lane, 100.0, 15.0);
        let vehicle = road.vehicle(ego).unwrap();
        let decision = vehicle.decide(&road, DT).unwrap();
        assert_eq!(decision.speed, 22.22);
        // Target speed below the limit, so IDM brakes
        assert!(decision.command.acceleration < 0.0);
        assert!(decision.command.acceleration >= -ACC_MAX);
    }
}
