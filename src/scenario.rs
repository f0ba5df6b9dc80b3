//! The fixed diverge template: a multi-lane main road with an exit ramp.
//!
//! ```text
//!  upstream ───── mid ───── downstream ───── end      slot 0 (reserved fast lane)
//!  upstream ───── mid ───── downstream ───── end      slot 1
//!  upstream ───── mid ───── downstream ───── end      slot 2
//!                 mid ───── downstream                slot 3 (ramp)
//!                                    ╲
//!                                     incline ────── end
//! ```
//!
//! Everything the behavior code needs to know about this layout is carried
//! in [ScenarioLanes], built alongside the network.

use crate::error::{SimError, SimResult};
use crate::lane::{LineType, StraightLane};
use crate::math::Point2d;
use crate::network::{Edge, LaneIndex, RoadNetwork, Route};
use crate::NodeId;
use smallvec::SmallVec;

/// The geometry of the diverge template.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScenarioGeometry {
    /// The main road nodes, in driving order.
    pub nodes: [String; 4],
    /// The node where the ramp finishes climbing.
    pub ramp_node: String,
    /// The length of each main road segment in m.
    pub segment_lengths: [f64; 3],
    /// The lateral distance between adjacent lane centres in m.
    pub lane_spacing: f64,
    /// The number of through lanes on each main road segment.
    pub through_lanes: usize,
    /// The slot reserved as the fast lane feeding the ramp.
    pub reserved_slot: usize,
    /// The speed limit of the through lanes in m/s.
    pub main_speed_limit: f64,
    /// The speed limit of the ramp in m/s.
    pub ramp_speed_limit: f64,
    /// The longitudinal length over which the ramp climbs away from the main road, in m.
    pub ramp_rise_length: f64,
}

impl Default for ScenarioGeometry {
    fn default() -> Self {
        Self {
            nodes: ["upstream", "mid", "downstream", "end"].map(String::from),
            ramp_node: "incline".to_string(),
            segment_lengths: [400.0, 200.0, 200.0],
            lane_spacing: 3.5,
            through_lanes: 3,
            reserved_slot: 0,
            main_speed_limit: 22.22,
            ramp_speed_limit: 11.11,
            ramp_rise_length: 100.0,
        }
    }
}

/// The longitudinal window in which a controlled vehicle may leave the reserved lane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExitCorridor {
    pub start: f64,
    pub length: f64,
}

impl ExitCorridor {
    pub fn new(start: f64, length: f64) -> Self {
        Self { start, length }
    }

    /// The end of the corridor.
    pub fn end(&self) -> f64 {
        self.start + self.length
    }

    /// Whether the longitudinal coordinate `x` lies within the corridor, inclusive.
    pub fn contains(&self, x: f64) -> bool {
        (self.start..=self.end()).contains(&x)
    }
}

/// The lanes of a built scenario which carry special meaning.
#[derive(Clone, Debug)]
pub struct ScenarioLanes {
    entry: NodeId,
    reserved: SmallVec<[LaneIndex; 4]>,
    ramp_lane: LaneIndex,
    diverted_edges: SmallVec<[Edge; 2]>,
    spawn_lanes: Vec<LaneIndex>,
    exit_route: Route,
}

impl ScenarioLanes {
    /// The first node of the main road.
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// The reserved fast lanes, one per main road segment.
    pub fn reserved(&self) -> &[LaneIndex] {
        &self.reserved
    }

    /// Whether the lane is a reserved fast lane.
    pub fn is_reserved(&self, index: LaneIndex) -> bool {
        self.reserved.contains(&index)
    }

    /// The ramp slot that runs alongside the main road.
    pub fn ramp_lane(&self) -> LaneIndex {
        self.ramp_lane
    }

    /// Whether the lane is part of the diverted road: the ramp slot or the incline edges.
    pub fn is_diverted(&self, index: LaneIndex) -> bool {
        index == self.ramp_lane || self.diverted_edges.contains(&index.edge())
    }

    /// The lanes background vehicles may be spawned on.
    pub fn spawn_lanes(&self) -> &[LaneIndex] {
        &self.spawn_lanes
    }

    /// The route from the entry node to the end of the road via the ramp.
    pub fn exit_route(&self) -> &Route {
        &self.exit_route
    }
}

impl ScenarioGeometry {
    /// Checks the geometry is buildable.
    pub fn validate(&self) -> SimResult<()> {
        if self.through_lanes < 2 {
            return Err(SimError::Config(format!(
                "need at least two through lanes, got {}",
                self.through_lanes
            )));
        }
        if self.reserved_slot >= self.through_lanes {
            return Err(SimError::Config(format!(
                "reserved slot {} is not a through lane",
                self.reserved_slot
            )));
        }
        if self.segment_lengths.iter().any(|l| *l <= 0.0) || self.ramp_rise_length <= 0.0 {
            return Err(SimError::Config("segment lengths must be positive".into()));
        }
        if self.ramp_rise_length >= self.segment_lengths[2] {
            return Err(SimError::Config(
                "the ramp must finish climbing before the end of the road".into(),
            ));
        }
        if self.lane_spacing <= 0.0 || self.main_speed_limit <= 0.0 || self.ramp_speed_limit <= 0.0 {
            return Err(SimError::Config(
                "lane spacing and speed limits must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Builds the road network, returning it with the description of its special lanes.
    pub fn build(&self) -> SimResult<(RoadNetwork, ScenarioLanes)> {
        self.validate()?;

        let mut net = RoadNetwork::new();
        let n = self.through_lanes;
        let w = self.lane_spacing;
        let xs = [
            0.0,
            self.segment_lengths[0],
            self.segment_lengths[0] + self.segment_lengths[1],
            self.segment_lengths.iter().sum(),
        ];

        // Through lanes, slot by slot so slots are numbered outwards from the fast lane
        let mut reserved = SmallVec::new();
        for slot in 0..n {
            for seg in 0..3 {
                let y = slot as f64 * w;
                let left = if slot == 0 {
                    LineType::Continuous
                } else {
                    LineType::None
                };
                let right = match (slot + 1 == n, seg) {
                    // The outer lane opens onto the ramp alongside mid -> downstream
                    (true, 1) => LineType::None,
                    (true, _) => LineType::Continuous,
                    (false, _) => LineType::Striped,
                };
                let lane = StraightLane::new(
                    Point2d::new(xs[seg], y),
                    Point2d::new(xs[seg + 1], y),
                    [left, right],
                    self.main_speed_limit,
                );
                let index = net.add_lane(&self.nodes[seg], &self.nodes[seg + 1], lane);
                if slot == self.reserved_slot {
                    reserved.push(index);
                }
            }
        }

        // The ramp: alongside the main road, then climbing away, then level to the end
        let y_ramp = n as f64 * w;
        let x_top = xs[2] + self.ramp_rise_length;
        let ramp_lane = net.add_lane(
            &self.nodes[1],
            &self.nodes[2],
            StraightLane::new(
                Point2d::new(xs[1], y_ramp),
                Point2d::new(xs[2], y_ramp),
                [LineType::Striped, LineType::Continuous],
                self.ramp_speed_limit,
            ),
        );
        let climb = net.add_lane(
            &self.nodes[2],
            &self.ramp_node,
            StraightLane::new(
                Point2d::new(xs[2], y_ramp),
                Point2d::new(x_top, y_ramp + w),
                [LineType::Continuous; 2],
                self.ramp_speed_limit,
            ),
        );
        let level = net.add_lane(
            &self.ramp_node,
            &self.nodes[3],
            StraightLane::new(
                Point2d::new(x_top, y_ramp + w),
                Point2d::new(xs[3], y_ramp + w),
                [LineType::Continuous; 2],
                self.ramp_speed_limit,
            ),
        );

        let mut spawn_lanes = vec![];
        for seg in 0..3 {
            let from = net.require_node(&self.nodes[seg])?;
            let to = net.require_node(&self.nodes[seg + 1])?;
            spawn_lanes.extend(
                (0..n)
                    .filter(|slot| *slot != self.reserved_slot)
                    .map(|slot| LaneIndex::new(from, to, slot)),
            );
        }
        spawn_lanes.extend([climb, level]);

        let entry = net.require_node(&self.nodes[0])?;
        let ramp_node = net.require_node(&self.ramp_node)?;
        let mut exit_route = net
            .shortest_path(entry, ramp_node)
            .map(|path| RoadNetwork::path_edges(&path))
            .ok_or_else(|| SimError::UnknownNode(self.ramp_node.clone()))?;
        exit_route.push_back(level.edge());

        let lanes = ScenarioLanes {
            entry,
            reserved,
            ramp_lane,
            diverted_edges: SmallVec::from_slice(&[climb.edge(), level.edge()]),
            spawn_lanes,
            exit_route,
        };
        Ok((net, lanes))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn default_layout() {
        let geometry = ScenarioGeometry::default();
        let (net, lanes) = geometry.build().unwrap();
        let names: Vec<_> = lanes.reserved().iter().map(|i| net.describe(*i)).collect();
        assert_eq!(
            names,
            ["upstream->mid[0]", "mid->downstream[0]", "downstream->end[0]"]
        );
        assert_eq!(net.describe(lanes.ramp_lane()), "mid->downstream[3]");
        assert_eq!(lanes.spawn_lanes().len(), 8);
        assert!(lanes.spawn_lanes().iter().all(|i| !lanes.is_reserved(*i)));

        let ramp = net.lane(lanes.ramp_lane()).unwrap();
        assert_approx_eq!(ramp.start().x, 400.0);
        assert_approx_eq!(ramp.start().y, 10.5);
        assert_approx_eq!(ramp.speed_limit(), 11.11);
    }

    #[test]
    fn exit_route_goes_via_incline() {
        let (net, lanes) = ScenarioGeometry::default().build().unwrap();
        let route: Vec<_> = lanes
            .exit_route()
            .iter()
            .map(|(a, b)| format!("{}->{}", net.node_name(*a), net.node_name(*b)))
            .collect();
        assert_eq!(
            route,
            ["upstream->mid", "mid->downstream", "downstream->incline", "incline->end"]
        );
    }

    #[test]
    fn diverted_lanes() {
        let (net, lanes) = ScenarioGeometry::default().build().unwrap();
        let [up, mid, down, end] =
            ["upstream", "mid", "downstream", "end"].map(|n| net.node(n).unwrap());
        let incline = net.node("incline").unwrap();
        assert!(lanes.is_diverted(LaneIndex::new(mid, down, 3)));
        assert!(lanes.is_diverted(LaneIndex::new(incline, end, 0)));
        assert!(!lanes.is_diverted(LaneIndex::new(mid, down, 2)));
        assert!(!lanes.is_diverted(LaneIndex::new(up, mid, 0)));
    }

    #[test]
    fn corridor_is_inclusive() {
        let corridor = ExitCorridor::new(300.0, 100.0);
        assert!(corridor.contains(300.0));
        assert!(corridor.contains(400.0));
        assert!(!corridor.contains(299.9));
        assert!(!corridor.contains(400.1));
    }

    #[test]
    fn rejects_bad_geometry() {
        let geometry = ScenarioGeometry {
            reserved_slot: 3,
            ..Default::default()
        };
        assert!(matches!(geometry.build(), Err(SimError::Config(_))));
    }
}
