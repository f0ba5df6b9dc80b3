//! Keeps controlled vehicles in the reserved fast lane until they reach the
//! exit corridor.

use crate::action::Action;
use crate::error::{SimError, SimResult};
use crate::road::Road;
use crate::scenario::{ExitCorridor, ScenarioLanes};
use crate::vehicle::Vehicle;
use crate::VehicleId;

/// Replaces a lane-right request from a vehicle on a reserved lane with idle,
/// unless the vehicle is inside the exit corridor.
pub fn constrain_action(
    vehicle: &Vehicle,
    action: Action,
    lanes: &ScenarioLanes,
    corridor: &ExitCorridor,
) -> Action {
    let blocked = action == Action::LaneRight
        && lanes.is_reserved(vehicle.lane_index())
        && !corridor.contains(vehicle.position().x);
    if blocked {
        Action::Idle
    } else {
        action
    }
}

/// Constrains one action per controlled vehicle against the current state of
/// the road, before any vehicle moves. Returns the constrained actions and
/// whether each one was overridden.
pub fn enforce(
    road: &Road,
    controlled: &[VehicleId],
    actions: &[Action],
    corridor: &ExitCorridor,
) -> SimResult<(Vec<Action>, Vec<bool>)> {
    if controlled.len() != actions.len() {
        return Err(SimError::ActionCountMismatch {
            expected: controlled.len(),
            got: actions.len(),
        });
    }
    let mut constrained = Vec::with_capacity(actions.len());
    let mut overridden = Vec::with_capacity(actions.len());
    for (id, action) in controlled.iter().zip(actions) {
        let vehicle = road.vehicle(*id)?;
        let new_action = constrain_action(vehicle, *action, road.scenario(), corridor);
        if new_action != *action {
            log::debug!(
                "vehicle {:?} at x = {:.1} may not leave {} yet, {} becomes {}",
                id,
                vehicle.position().x,
                road.network().describe(vehicle.lane_index()),
                action,
                new_action
            );
        }
        overridden.push(new_action != *action);
        constrained.push(new_action);
    }
    Ok((constrained, overridden))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::network::LaneIndex;
    use crate::scenario::ScenarioGeometry;
    use crate::vehicle::controlled::{ControlledState, SpeedLadder};
    use crate::vehicle::VehicleKind;

    fn road_with(lane: impl Fn(&ScenarioLanes) -> LaneIndex, xs: &[f64]) -> (Road, Vec<VehicleId>) {
        let (network, scenario) = ScenarioGeometry::default().build().unwrap();
        let lane = lane(&scenario);
        let mut road = Road::new(network, scenario);
        let ids = xs
            .iter()
            .map(|x| {
                let start = road.network().lane(lane).unwrap().start().x;
                let position = road.network().lane(lane).unwrap().position(x - start, 0.0);
                let state = ControlledState::new(lane, 25.0, SpeedLadder::default());
                road.add_vehicle(position, 0.0, 25.0, VehicleKind::Controlled(state))
                    .unwrap()
            })
            .collect();
        (road, ids)
    }

    #[test]
    fn lane_right_outside_corridor_becomes_idle() {
        let corridor = ExitCorridor::new(300.0, 100.0);
        let (road, ids) = road_with(|s| s.reserved()[0], &[299.0, 300.0, 350.0, 399.5]);
        let actions = [Action::LaneRight; 4];
        let (constrained, overridden) = enforce(&road, &ids, &actions, &corridor).unwrap();
        assert_eq!(
            constrained,
            [Action::Idle, Action::LaneRight, Action::LaneRight, Action::LaneRight]
        );
        assert_eq!(overridden, [true, false, false, false]);

        let (road, ids) = road_with(|s| s.reserved()[1], &[400.5, 450.0]);
        let (constrained, _) = enforce(&road, &ids, &actions[..2], &corridor).unwrap();
        assert_eq!(constrained, [Action::Idle, Action::Idle]);
    }

    #[test]
    fn other_actions_and_lanes_pass() {
        let corridor = ExitCorridor::new(300.0, 100.0);
        let (road, ids) = road_with(|s| s.reserved()[0], &[100.0, 150.0, 200.0]);
        let actions = [Action::LaneLeft, Action::Faster, Action::Idle];
        let (constrained, overridden) = enforce(&road, &ids, &actions, &corridor).unwrap();
        assert_eq!(constrained, actions);
        assert!(overridden.iter().all(|o| !o));

        let (road, ids) = road_with(|s| s.reserved()[0].with_slot(1), &[100.0]);
        let (constrained, _) = enforce(&road, &ids, &[Action::LaneRight], &corridor).unwrap();
        assert_eq!(constrained, [Action::LaneRight]);
    }

    #[test]
    fn action_count_must_match() {
        let corridor = ExitCorridor::new(300.0, 100.0);
        let (road, ids) = road_with(|s| s.reserved()[0], &[100.0, 150.0]);
        assert!(matches!(
            enforce(&road, &ids, &[Action::Idle], &corridor),
            Err(SimError::ActionCountMismatch {
                expected: 2,
                got: 1
            })
        ));
    }
}
