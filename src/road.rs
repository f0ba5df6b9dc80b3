use crate::action::Action;
use crate::error::{SimError, SimResult};
use crate::math::{rect_corners, rot90, Point2d};
use crate::network::{LaneIndex, RoadNetwork};
use crate::scenario::ScenarioLanes;
use crate::util::Interval;
use crate::vehicle::{Vehicle, VehicleKind, VEHICLE_LENGTH, VEHICLE_WIDTH};
use crate::{VehicleId, VehicleSet};
use cgmath::prelude::*;
use itertools::Itertools;
use slotmap::SecondaryMap;

/// The lateral slack used when deciding whether a vehicle is on a lane, in m.
const NEIGHBOUR_MARGIN: f64 = 1.0; // m

/// A road network and the vehicles driving on it.
#[derive(Clone)]
pub struct Road {
    network: RoadNetwork,
    scenario: ScenarioLanes,
    /// The vehicles, in insertion order.
    vehicles: VehicleSet,
}

impl Road {
    /// Creates an empty road.
    pub fn new(network: RoadNetwork, scenario: ScenarioLanes) -> Self {
        Self {
            network,
            scenario,
            vehicles: VehicleSet::with_key(),
        }
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    /// The special lanes of the road.
    pub fn scenario(&self) -> &ScenarioLanes {
        &self.scenario
    }

    /// Adds a vehicle to the road.
    pub(crate) fn add_vehicle(
        &mut self,
        position: Point2d,
        heading: f64,
        speed: f64,
        kind: VehicleKind,
    ) -> SimResult<VehicleId> {
        let network = &self.network;
        self.vehicles
            .try_insert_with_key(|id| Vehicle::new(id, network, position, heading, speed, kind))
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn vehicle(&self, id: VehicleId) -> SimResult<&Vehicle> {
        self.vehicles.get(id).ok_or(SimError::UnknownVehicle)
    }

    pub(crate) fn vehicle_mut(&mut self, id: VehicleId) -> SimResult<&mut Vehicle> {
        self.vehicles.get_mut(id).ok_or(SimError::UnknownVehicle)
    }

    /// Returns an iterator over all the vehicles, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// The number of vehicles on the road.
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Finds the closest vehicles ahead of and behind `vehicle` on `lane`,
    /// projecting every vehicle onto that lane.
    pub fn neighbour_vehicles(
        &self,
        vehicle: &Vehicle,
        lane: LaneIndex,
    ) -> SimResult<(Option<&Vehicle>, Option<&Vehicle>)> {
        self.neighbour_vehicles_within(vehicle, lane, f64::INFINITY)
    }

    /// Like [neighbour_vehicles](Self::neighbour_vehicles), ignoring vehicles
    /// more than `horizon` m away along the lane.
    pub fn neighbour_vehicles_within(
        &self,
        vehicle: &Vehicle,
        lane: LaneIndex,
        horizon: f64,
    ) -> SimResult<(Option<&Vehicle>, Option<&Vehicle>)> {
        let lane = self.network.lane(lane)?;
        let (s, _) = lane.local_coordinates(vehicle.position());
        let mut front: Option<(&Vehicle, f64)> = None;
        let mut rear: Option<(&Vehicle, f64)> = None;

        for other in self.vehicles.values() {
            if other.id() == vehicle.id() {
                continue;
            }
            let (s_v, lat_v) = lane.local_coordinates(other.position());
            if !lane.on_lane_at(s_v, lat_v, NEIGHBOUR_MARGIN) {
                continue;
            }
            if s <= s_v && s_v - s <= horizon && front.map_or(true, |(_, s_f)| s_v <= s_f) {
                front = Some((other, s_v));
            }
            if s_v < s && s - s_v <= horizon && rear.map_or(true, |(_, s_r)| s_v > s_r) {
                rear = Some((other, s_v));
            }
        }
        Ok((front.map(|(v, _)| v), rear.map(|(v, _)| v)))
    }

    /// Queues a meta-action on each controlled vehicle and records its speed
    /// at the start of the tick.
    pub(crate) fn begin_tick(&mut self, actions: &SecondaryMap<VehicleId, Action>) -> SimResult<()> {
        for (id, action) in actions {
            let vehicle = self.vehicle_mut(id)?;
            let speed = vehicle.speed();
            if let VehicleKind::Controlled(state) = vehicle.kind_mut() {
                state.begin_tick(*action, speed);
            }
        }
        Ok(())
    }

    /// Records each controlled vehicle's change of speed over the tick.
    pub(crate) fn end_tick(&mut self) {
        for vehicle in self.vehicles.values_mut() {
            let speed = vehicle.speed();
            if let VehicleKind::Controlled(state) = vehicle.kind_mut() {
                state.end_tick(speed);
            }
        }
    }

    /// Advances every vehicle by one physics substep of `dt` seconds.
    pub(crate) fn step(&mut self, dt: f64) -> SimResult<()> {
        // Every vehicle decides against the same snapshot
        let decisions = self
            .vehicles
            .values()
            .map(|vehicle| Ok((vehicle.id(), vehicle.decide(self, dt)?)))
            .collect::<SimResult<Vec<_>>>()?;
        for (id, decision) in decisions {
            self.vehicles[id].apply(decision);
        }

        for vehicle in self.vehicles.values_mut() {
            vehicle.integrate(&self.network, dt)?;
        }
        self.check_collisions();
        self.update_on_road();
        Ok(())
    }

    /// Flags every pair of overlapping vehicles as crashed.
    fn check_collisions(&mut self) {
        let crashes = self
            .vehicles
            .values()
            .tuple_combinations()
            .filter(|(a, b)| is_colliding(a, b))
            .map(|(a, b)| (a.id(), b.id()))
            .collect::<Vec<_>>();
        for (a, b) in crashes {
            log::debug!("vehicles {:?} and {:?} collided", a, b);
            self.vehicles[a].set_crashed();
            self.vehicles[b].set_crashed();
        }
    }

    /// Re-evaluates whether each vehicle is within a lane of its current edge.
    fn update_on_road(&mut self) {
        let network = &self.network;
        for vehicle in self.vehicles.values_mut() {
            let lane = vehicle.lane_index();
            let on_road = network.is_on_edge(lane, vehicle.position());
            if vehicle.on_road() && !on_road {
                log::debug!(
                    "vehicle {:?} left the road near {}",
                    vehicle.id(),
                    network.describe(lane)
                );
            }
            vehicle.set_on_road(on_road);
        }
    }

    /// Moves a vehicle to the given local coordinates of a lane, aligned with
    /// the lane, and makes that lane its target.
    pub fn place(&mut self, id: VehicleId, lane: LaneIndex, long: f64, lat: f64) -> SimResult<()> {
        let target = self.network.lane(lane)?;
        let position = target.position(long, lat);
        let heading = target.heading_at(long);
        let vehicle = self.vehicles.get_mut(id).ok_or(SimError::UnknownVehicle)?;
        vehicle.set_pose(&self.network, position, heading)?;
        match vehicle.kind_mut() {
            VehicleKind::Controlled(state) => state.set_target_lane(lane),
            VehicleKind::Background(state) => state.set_target_lane(lane),
        }
        self.update_on_road();
        Ok(())
    }
}

/// Whether the footprints of two vehicles overlap, using the separating axis test.
fn is_colliding(a: &Vehicle, b: &Vehicle) -> bool {
    let diagonal = VEHICLE_LENGTH.hypot(VEHICLE_WIDTH);
    if a.distance_to(b) > diagonal {
        return false;
    }
    let corners = |v: &Vehicle| rect_corners(v.position(), v.heading(), VEHICLE_LENGTH, VEHICLE_WIDTH);
    let (ca, cb) = (corners(a), corners(b));
    let axes = [a.direction(), rot90(a.direction()), b.direction(), rot90(b.direction())];
    axes.iter().all(|axis| {
        let project = |pts: &[Point2d; 4]| {
            Interval::hull(pts.iter().map(|p| p.to_vec().dot(*axis))).unwrap_or_default()
        };
        project(&ca).overlaps(&project(&cb))
    })
}
