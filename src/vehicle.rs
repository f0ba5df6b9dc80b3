use self::behavior::BackgroundState;
use self::controlled::ControlledState;
use crate::error::SimResult;
use crate::math::{heading_vector, Point2d, Vector2d};
use crate::network::{LaneIndex, RoadNetwork};
use crate::road::Road;
use crate::VehicleId;
use cgmath::prelude::*;

pub mod behavior;
pub mod control;
pub mod controlled;
pub mod idm;

/// The length of every vehicle in m.
pub const VEHICLE_LENGTH: f64 = 5.0; // m

/// The width of every vehicle in m.
pub const VEHICLE_WIDTH: f64 = 2.0; // m

/// The maximum speed magnitude of any vehicle in m/s.
pub const MAX_SPEED: f64 = 40.0; // m/s

/// A low-level kinematic command.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Command {
    /// Longitudinal acceleration in m/s<sup>2</sup>.
    pub acceleration: f64,
    /// Front wheel angle in rad.
    pub steering: f64,
}

/// The behavior driving a vehicle.
#[derive(Clone, Debug)]
pub enum VehicleKind {
    /// Driven by discrete meta-actions from an external agent.
    Controlled(ControlledState),
    /// Driven by IDM and MOBIL.
    Background(BackgroundState),
}

/// What a vehicle decided to do during the read-only phase of a substep.
#[derive(Clone, Debug)]
pub(crate) struct Decision {
    pub command: Command,
    /// The vehicle's speed once the decision is applied.
    pub speed: f64,
    pub kind: VehicleKind,
}

/// A simulated vehicle.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID
    pub(crate) id: VehicleId,
    /// The world space coordinates of the centre of the vehicle.
    position: Point2d,
    /// The heading in rad.
    heading: f64,
    /// The speed in m/s.
    speed: f64,
    /// The lane the vehicle is closest to.
    lane_index: LaneIndex,
    crashed: bool,
    on_road: bool,
    /// The most recently decided command.
    command: Command,
    kind: VehicleKind,
}

impl Vehicle {
    /// Creates a vehicle, locating it on the closest lane of the network.
    pub(crate) fn new(
        id: VehicleId,
        network: &RoadNetwork,
        position: Point2d,
        heading: f64,
        speed: f64,
        kind: VehicleKind,
    ) -> SimResult<Self> {
        let lane_index = network.closest_lane_index(position, Some(heading))?;
        let on_road = network.is_on_edge(lane_index, position);
        Ok(Self {
            id,
            position,
            heading,
            speed,
            lane_index,
            crashed: false,
            on_road,
            command: Command::default(),
            kind,
        })
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The coordinates in world space of the centre of the vehicle.
    pub fn position(&self) -> Point2d {
        self.position
    }

    /// The heading in rad.
    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// The speed in m/s.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// A unit vector in world space aligned with the vehicle's heading.
    pub fn direction(&self) -> Vector2d {
        heading_vector(self.heading)
    }

    /// The velocity vector in m/s.
    pub fn velocity(&self) -> Vector2d {
        self.speed * self.direction()
    }

    /// The lane the vehicle is currently on.
    pub fn lane_index(&self) -> LaneIndex {
        self.lane_index
    }

    /// Whether the vehicle has been in a collision. Never cleared once set.
    pub fn crashed(&self) -> bool {
        self.crashed
    }

    /// Whether the vehicle lies within a lane of its current edge.
    pub fn on_road(&self) -> bool {
        self.on_road
    }

    /// The most recently decided kinematic command.
    pub fn command(&self) -> Command {
        self.command
    }

    pub fn kind(&self) -> &VehicleKind {
        &self.kind
    }

    pub fn is_controlled(&self) -> bool {
        matches!(self.kind, VehicleKind::Controlled(_))
    }

    /// The controlled vehicle state, if the vehicle is controlled.
    pub fn controlled(&self) -> Option<&ControlledState> {
        match &self.kind {
            VehicleKind::Controlled(state) => Some(state),
            VehicleKind::Background(_) => None,
        }
    }

    /// The lane the vehicle is steering towards.
    pub fn target_lane(&self) -> LaneIndex {
        match &self.kind {
            VehicleKind::Controlled(state) => state.target_lane(),
            VehicleKind::Background(state) => state.target_lane(),
        }
    }

    /// The speed the vehicle is trying to reach, in m/s.
    pub fn target_speed(&self) -> f64 {
        match &self.kind {
            VehicleKind::Controlled(state) => state.target_speed(),
            VehicleKind::Background(state) => state.target_speed(),
        }
    }

    /// The longitudinal distance from this vehicle to `other`, measured along this vehicle's lane.
    pub fn lane_distance_to(&self, other: &Vehicle, network: &RoadNetwork) -> SimResult<f64> {
        let lane = network.lane(self.lane_index)?;
        let (theirs, _) = lane.local_coordinates(other.position);
        let (mine, _) = lane.local_coordinates(self.position);
        Ok(theirs - mine)
    }

    /// Computes the vehicle's next command against the current state of the road.
    pub(crate) fn decide(&self, road: &Road, dt: f64) -> SimResult<Decision> {
        match &self.kind {
            VehicleKind::Controlled(state) => {
                let (command, state) = state.decide(self, road)?;
                Ok(Decision {
                    command,
                    speed: self.speed,
                    kind: VehicleKind::Controlled(state),
                })
            }
            VehicleKind::Background(state) => state.decide(self, road, dt),
        }
    }

    /// Adopts a decision made during the read-only phase.
    pub(crate) fn apply(&mut self, decision: Decision) {
        self.command = decision.command;
        self.speed = decision.speed;
        self.kind = decision.kind;
    }

    pub(crate) fn kind_mut(&mut self) -> &mut VehicleKind {
        &mut self.kind
    }

    /// Integrates the kinematic bicycle model over `dt` seconds.
    pub(crate) fn integrate(&mut self, network: &RoadNetwork, dt: f64) -> SimResult<()> {
        let Command {
            mut acceleration,
            mut steering,
        } = self.command;
        if self.crashed {
            steering = 0.0;
            acceleration = -self.speed;
        }
        if self.speed > MAX_SPEED {
            acceleration = f64::min(acceleration, MAX_SPEED - self.speed);
        } else if self.speed < -MAX_SPEED {
            acceleration = f64::max(acceleration, -MAX_SPEED - self.speed);
        }

        let beta = (0.5 * steering.tan()).atan();
        self.position += self.speed * heading_vector(self.heading + beta) * dt;
        self.heading += self.speed * beta.sin() / (0.5 * VEHICLE_LENGTH) * dt;
        self.speed += acceleration * dt;

        self.locate(network)?;
        let limit = network.lane(self.lane_index)?.speed_limit();
        self.speed = f64::min(self.speed, limit);
        Ok(())
    }

    /// Moves the vehicle to a new pose.
    pub(crate) fn set_pose(
        &mut self,
        network: &RoadNetwork,
        position: Point2d,
        heading: f64,
    ) -> SimResult<()> {
        self.position = position;
        self.heading = heading;
        self.locate(network)
    }

    /// Re-derives the current lane from the vehicle's pose.
    fn locate(&mut self, network: &RoadNetwork) -> SimResult<()> {
        self.lane_index = network.closest_lane_index(self.position, Some(self.heading))?;
        Ok(())
    }

    /// Flags the vehicle as crashed.
    pub(crate) fn set_crashed(&mut self) {
        self.crashed = true;
    }

    pub(crate) fn set_on_road(&mut self, on_road: bool) {
        self.on_road = on_road;
    }

    /// The distance between the centres of the vehicles in m.
    pub fn distance_to(&self, other: &Vehicle) -> f64 {
        (other.position - self.position).magnitude()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scenario::ScenarioGeometry;
    use assert_approx_eq::assert_approx_eq;

    fn vehicle(speed: f64) -> (RoadNetwork, Vehicle) {
        let (network, scenario) = ScenarioGeometry::default().build().unwrap();
        let lane = scenario.reserved()[0].with_slot(1);
        let position = network.lane(lane).unwrap().position(100.0, 0.0);
        let kind = VehicleKind::Background(BackgroundState::new(lane, speed, position));
        let vehicle = Vehicle::new(VehicleId::default(), &network, position, 0.0, speed, kind).unwrap();
        (network, vehicle)
    }

    #[test]
    fn integrates_and_clamps_to_lane_limit() {
        let (network, mut vehicle) = vehicle(30.0);
        assert!(vehicle.on_road());
        vehicle.integrate(&network, 0.1).unwrap();
        assert_approx_eq!(vehicle.position().x, 103.0);
        assert_approx_eq!(vehicle.position().y, 3.5);
        assert_approx_eq!(vehicle.speed(), 22.22);
    }

    #[test]
    fn steering_turns_left() {
        let (network, mut vehicle) = vehicle(20.0);
        vehicle.command = Command {
            acceleration: 1.0,
            steering: 0.1,
        };
        vehicle.integrate(&network, 0.1).unwrap();
        assert!(vehicle.heading() > 0.0);
        assert!(vehicle.position().y > 3.5);
        assert_approx_eq!(vehicle.speed(), 20.1);
    }

    #[test]
    fn crashed_vehicle_brakes_straight() {
        let (network, mut vehicle) = vehicle(20.0);
        vehicle.set_crashed();
        vehicle.command = Command {
            acceleration: 3.0,
            steering: 0.3,
        };
        vehicle.integrate(&network, 0.5).unwrap();
        assert_approx_eq!(vehicle.heading(), 0.0);
        assert_approx_eq!(vehicle.speed(), 10.0);
    }
}
