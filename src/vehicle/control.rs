//! The low-level controller shared by every vehicle: steering towards the
//! centre line of a target lane, and proportional speed tracking.

use super::{Vehicle, VEHICLE_LENGTH};
use crate::error::SimResult;
use crate::math::{not_zero, wrap_to_pi};
use crate::network::{LaneIndex, RoadNetwork, Route};
use std::f64::consts::{FRAC_PI_3, FRAC_PI_4};

/// Time constant of the speed controller in s.
const TAU_ACC: f64 = 0.6; // s

/// Time constant of the heading controller in s.
const TAU_HEADING: f64 = 0.2; // s

/// Time constant of the lateral position controller in s.
const TAU_LATERAL: f64 = 0.6; // s

/// How far ahead the heading reference is sampled, in s.
const TAU_PURSUIT: f64 = 0.5 * TAU_HEADING; // s

/// The maximum front wheel angle in rad.
pub const MAX_STEERING_ANGLE: f64 = FRAC_PI_3;

/// The largest heading offset from the lane used to regain its centre line, in rad.
const MAX_HEADING_OFFSET: f64 = FRAC_PI_4;

/// Switches the target lane to the next lane once the vehicle reaches its end.
pub fn follow_road(
    vehicle: &Vehicle,
    network: &RoadNetwork,
    target_lane: LaneIndex,
    route: &mut Route,
) -> SimResult<LaneIndex> {
    if network.lane(target_lane)?.after_end(vehicle.position()) {
        let next = network.next_lane(target_lane, route, vehicle.position())?;
        log::trace!(
            "vehicle {:?} continues from {} onto {}",
            vehicle.id(),
            network.describe(target_lane),
            network.describe(next)
        );
        Ok(next)
    } else {
        Ok(target_lane)
    }
}

/// Computes the steering angle which brings the vehicle onto the centre line
/// of `target_lane`.
///
/// The lateral offset is turned into a lateral speed command, then into a
/// heading reference, then into a heading rate, and finally into a front
/// wheel angle through the inverse of the bicycle model.
pub fn steering_control(
    vehicle: &Vehicle,
    network: &RoadNetwork,
    target_lane: LaneIndex,
) -> SimResult<f64> {
    let lane = network.lane(target_lane)?;
    let speed = vehicle.speed();
    let (long, lat) = lane.local_coordinates(vehicle.position());
    let future_heading = lane.heading_at(long + speed * TAU_PURSUIT);

    let lateral_speed = -lat / TAU_LATERAL;
    let heading_command = (lateral_speed / not_zero(speed)).clamp(-1.0, 1.0).asin();
    let heading_ref =
        future_heading + heading_command.clamp(-MAX_HEADING_OFFSET, MAX_HEADING_OFFSET);

    let heading_rate = wrap_to_pi(heading_ref - vehicle.heading()) / TAU_HEADING;
    let slip = (0.5 * VEHICLE_LENGTH / not_zero(speed) * heading_rate)
        .clamp(-1.0, 1.0)
        .asin();
    let steering = (2.0 * slip.tan()).atan();
    Ok(steering.clamp(-MAX_STEERING_ANGLE, MAX_STEERING_ANGLE))
}

/// The acceleration which tracks `target_speed`, in m/s<sup>2</sup>.
pub fn speed_control(speed: f64, target_speed: f64) -> f64 {
    (target_speed - speed) / TAU_ACC
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lane::{LineType, StraightLane};
    use crate::math::Point2d;
    use crate::vehicle::controlled::{ControlledState, SpeedLadder};
    use crate::vehicle::VehicleKind;
    use crate::VehicleId;
    use assert_approx_eq::assert_approx_eq;

    fn two_lanes() -> (RoadNetwork, LaneIndex) {
        let mut net = RoadNetwork::new();
        let lane = |y| {
            StraightLane::new(
                Point2d::new(0.0, y),
                Point2d::new(200.0, y),
                [LineType::Striped; 2],
                30.0,
            )
        };
        let idx = net.add_lane("a", "b", lane(0.0));
        net.add_lane("a", "b", lane(4.0));
        (net, idx)
    }

    fn vehicle(net: &RoadNetwork, lane: LaneIndex, y: f64, speed: f64) -> Vehicle {
        let ladder = SpeedLadder::default();
        let state = ControlledState::new(lane, speed, ladder);
        let kind = VehicleKind::Controlled(state);
        Vehicle::new(
            VehicleId::default(),
            net,
            Point2d::new(50.0, y),
            0.0,
            speed,
            kind,
        )
        .unwrap()
    }

    #[test]
    fn centred_vehicle_keeps_straight() {
        let (net, lane) = two_lanes();
        let v = vehicle(&net, lane, 0.0, 20.0);
        assert_approx_eq!(steering_control(&v, &net, lane).unwrap(), 0.0);
    }

    #[test]
    fn steers_towards_target_lane() {
        let (net, lane) = two_lanes();
        let v = vehicle(&net, lane, 0.0, 20.0);
        let steering = steering_control(&v, &net, lane.with_slot(1)).unwrap();
        assert!(steering > 0.0);
        assert!(steering <= MAX_STEERING_ANGLE);

        let v = vehicle(&net, lane, 4.0, 20.0);
        assert!(steering_control(&v, &net, lane).unwrap() < 0.0);
    }

    #[test]
    fn proportional_speed() {
        assert_approx_eq!(speed_control(20.0, 26.0), 10.0);
        assert_approx_eq!(speed_control(25.0, 25.0), 0.0);
    }

    #[test]
    fn follows_road_at_lane_end() {
        let mut net = RoadNetwork::new();
        let idx = net.add_lane(
            "a",
            "b",
            StraightLane::new(
                Point2d::new(0.0, 0.0),
                Point2d::new(52.0, 0.0),
                [LineType::None; 2],
                30.0,
            ),
        );
        let next = net.add_lane(
            "b",
            "c",
            StraightLane::new(
                Point2d::new(52.0, 0.0),
                Point2d::new(100.0, 0.0),
                [LineType::None; 2],
                30.0,
            ),
        );
        let v = vehicle(&net, idx, 0.0, 20.0);
        let target = follow_road(&v, &net, idx, &mut Route::new()).unwrap();
        assert_eq!(target, next);
        assert_eq!(follow_road(&v, &net, next, &mut Route::new()).unwrap(), next);
    }
}
