use crate::error::{SimError, SimResult};
use crate::lane::StraightLane;
use crate::math::Point2d;
use crate::NodeId;
use slotmap::SlotMap;
use smallvec::SmallVec;
use std::collections::VecDeque;

/// Relative weight of heading mismatch (in rad) against distance (in m)
/// when finding the closest lane to a vehicle.
const HEADING_WEIGHT: f64 = 1.0;

/// An edge of the network, as `(from, to)`.
pub type Edge = (NodeId, NodeId);

/// A planned sequence of edges for a vehicle to follow.
pub type Route = VecDeque<Edge>;

/// Identifies a single lane: an edge of the network plus a slot on that edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LaneIndex {
    pub from: NodeId,
    pub to: NodeId,
    pub slot: usize,
}

impl LaneIndex {
    pub fn new(from: NodeId, to: NodeId, slot: usize) -> Self {
        Self { from, to, slot }
    }

    /// The edge this lane belongs to.
    pub fn edge(&self) -> Edge {
        (self.from, self.to)
    }

    /// The lane in another slot of the same edge.
    pub fn with_slot(self, slot: usize) -> Self {
        Self { slot, ..self }
    }
}

#[derive(Clone)]
struct Node {
    name: String,
    edges: Vec<EdgeLanes>,
}

#[derive(Clone)]
struct EdgeLanes {
    to: NodeId,
    lanes: Vec<StraightLane>,
}

/// A directed graph of named nodes, where each edge holds one or more
/// parallel lanes.
#[derive(Clone, Default)]
pub struct RoadNetwork {
    nodes: SlotMap<NodeId, Node>,
}

impl RoadNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Default::default()
    }

    /// Gets the ID of the node with the given name, adding it if it doesn't exist.
    pub fn add_node(&mut self, name: &str) -> NodeId {
        match self.node(name) {
            Some(id) => id,
            None => self.nodes.insert(Node {
                name: name.to_string(),
                edges: vec![],
            }),
        }
    }

    /// Appends a lane to the edge `from -> to`, returning its index.
    pub fn add_lane(&mut self, from: &str, to: &str, lane: StraightLane) -> LaneIndex {
        let from = self.add_node(from);
        let to = self.add_node(to);
        let edges = &mut self.nodes[from].edges;
        let idx = match edges.iter().position(|e| e.to == to) {
            Some(idx) => idx,
            None => {
                edges.push(EdgeLanes { to, lanes: vec![] });
                edges.len() - 1
            }
        };
        let lanes = &mut edges[idx].lanes;
        lanes.push(lane);
        LaneIndex::new(from, to, lanes.len() - 1)
    }

    /// Finds a node by name.
    pub fn node(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.name == name)
            .map(|(id, _)| id)
    }

    /// Finds a node by name, failing if it does not exist.
    pub fn require_node(&self, name: &str) -> SimResult<NodeId> {
        self.node(name)
            .ok_or_else(|| SimError::UnknownNode(name.to_string()))
    }

    /// The name of a node.
    pub fn node_name(&self, id: NodeId) -> &str {
        self.nodes.get(id).map(|n| n.name.as_str()).unwrap_or("?")
    }

    /// A human readable name for a lane, such as `upstream->mid[0]`.
    pub fn describe(&self, index: LaneIndex) -> String {
        format!(
            "{}->{}[{}]",
            self.node_name(index.from),
            self.node_name(index.to),
            index.slot
        )
    }

    /// The lanes of the edge `from -> to`, or an empty slice if there is no such edge.
    pub fn edge_lanes(&self, from: NodeId, to: NodeId) -> &[StraightLane] {
        self.nodes
            .get(from)
            .and_then(|node| node.edges.iter().find(|e| e.to == to))
            .map(|e| e.lanes.as_slice())
            .unwrap_or(&[])
    }

    /// The nodes reachable from `from` by a single edge, in insertion order.
    pub fn successors(&self, from: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .get(from)
            .into_iter()
            .flat_map(|node| node.edges.iter().map(|e| e.to))
    }

    /// Gets the lane at the given index.
    pub fn lane(&self, index: LaneIndex) -> SimResult<&StraightLane> {
        self.edge_lanes(index.from, index.to)
            .get(index.slot)
            .ok_or_else(|| SimError::UnknownLane(self.describe(index)))
    }

    /// Returns true if the lane exists.
    pub fn contains(&self, index: LaneIndex) -> bool {
        self.lane(index).is_ok()
    }

    /// Iterates over every lane in the network, in insertion order.
    pub fn iter_lanes(&self) -> impl Iterator<Item = (LaneIndex, &StraightLane)> + '_ {
        self.nodes.iter().flat_map(|(from, node)| {
            node.edges.iter().flat_map(move |e| {
                e.lanes
                    .iter()
                    .enumerate()
                    .map(move |(slot, lane)| (LaneIndex::new(from, e.to, slot), lane))
            })
        })
    }

    /// The lanes adjacent to `index` on the same edge, as `[left, right]`,
    /// where left is the lower slot.
    pub fn neighbour_lanes(&self, index: LaneIndex) -> [Option<LaneIndex>; 2] {
        let count = self.edge_lanes(index.from, index.to).len();
        let left = index.slot.checked_sub(1).map(|slot| index.with_slot(slot));
        let right = Some(index.slot + 1)
            .filter(|slot| *slot < count)
            .map(|slot| index.with_slot(slot));
        [left, right]
    }

    /// The lanes adjacent to `index` which exist.
    pub fn side_lanes(&self, index: LaneIndex) -> SmallVec<[LaneIndex; 2]> {
        self.neighbour_lanes(index).into_iter().flatten().collect()
    }

    /// Every lane on the same edge as `index`, including itself.
    pub fn all_side_lanes(&self, index: LaneIndex) -> impl Iterator<Item = LaneIndex> {
        let count = self.edge_lanes(index.from, index.to).len();
        (0..count).map(move |slot| index.with_slot(slot))
    }

    /// Whether `position` lies within any lane of the edge `index` belongs to.
    pub fn is_on_edge(&self, index: LaneIndex, position: Point2d) -> bool {
        self.edge_lanes(index.from, index.to)
            .iter()
            .any(|lane| lane.on_lane(position, 0.0))
    }

    /// Finds the lane closest to a position, optionally taking heading into account.
    /// Ties go to the lane added first.
    pub fn closest_lane_index(&self, position: Point2d, heading: Option<f64>) -> SimResult<LaneIndex> {
        let distance = |lane: &StraightLane| match heading {
            Some(heading) => lane.distance_with_heading(position, heading, HEADING_WEIGHT),
            None => lane.distance(position),
        };
        self.iter_lanes()
            .map(|(index, lane)| (index, distance(lane)))
            .fold(None, |best: Option<(LaneIndex, f64)>, (index, dist)| match best {
                Some((_, best_dist)) if best_dist <= dist => best,
                _ => Some((index, dist)),
            })
            .map(|(index, _)| index)
            .ok_or(SimError::EmptyNetwork)
    }

    /// Picks the lane to continue on once a vehicle reaches the end of `current`.
    ///
    /// The route is consumed up to and including the current edge. The next
    /// routed edge is taken if its lane is within reach of the vehicle,
    /// otherwise the lane closest to the vehicle on any outgoing edge is
    /// chosen. At a dead end the current lane is kept.
    pub fn next_lane(
        &self,
        current: LaneIndex,
        route: &mut Route,
        position: Point2d,
    ) -> SimResult<LaneIndex> {
        if let Some(done) = route.iter().position(|edge| *edge == current.edge()) {
            route.drain(..=done);
        }

        let routed = route
            .front()
            .filter(|(from, _)| *from == current.to)
            .map(|(_, to)| *to);
        if let Some(next_to) = routed {
            let (next, dist) = self.next_lane_on_edge(current, next_to, position)?;
            let lane = self.lane(next)?;
            if dist <= 2.0 * lane.width() {
                return Ok(next);
            }
            log::trace!(
                "routed lane {} out of reach, falling back to closest lane",
                self.describe(next)
            );
        }

        let mut best: Option<(LaneIndex, f64)> = None;
        for next_to in self.successors(current.to) {
            let (next, dist) = self.next_lane_on_edge(current, next_to, position)?;
            if best.map_or(true, |(_, best_dist)| dist < best_dist) {
                best = Some((next, dist));
            }
        }
        Ok(best.map(|(next, _)| next).unwrap_or(current))
    }

    /// The lane a vehicle would take onto the edge `current.to -> next_to`, and its
    /// distance from `position`. Keeps the slot when both edges have the same
    /// number of lanes, otherwise takes the closest lane.
    fn next_lane_on_edge(
        &self,
        current: LaneIndex,
        next_to: NodeId,
        position: Point2d,
    ) -> SimResult<(LaneIndex, f64)> {
        let current_count = self.edge_lanes(current.from, current.to).len();
        let next_lanes = self.edge_lanes(current.to, next_to);
        let slot = if current_count == next_lanes.len() {
            Some(current.slot)
        } else {
            next_lanes
                .iter()
                .enumerate()
                .map(|(slot, lane)| (slot, lane.distance(position)))
                .fold(None, |best: Option<(usize, f64)>, (slot, dist)| match best {
                    Some((_, best_dist)) if best_dist <= dist => best,
                    _ => Some((slot, dist)),
                })
                .map(|(slot, _)| slot)
        };
        let next = LaneIndex::new(current.to, next_to, slot.unwrap_or(0));
        let dist = self.lane(next)?.distance(position);
        Ok((next, dist))
    }

    /// Finds the shortest sequence of nodes from `from` to `to`, measured by lane length.
    pub fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        let cost = |a: NodeId, b: NodeId| {
            let length = self.edge_lanes(a, b).first().map_or(0.0, |l| l.length());
            (length * 1000.0).round() as u64
        };
        pathfinding::directed::dijkstra::dijkstra(
            &from,
            |node| {
                let node = *node;
                self.successors(node)
                    .map(|next| (next, cost(node, next)))
                    .collect::<Vec<_>>()
            },
            |node| *node == to,
        )
        .map(|(path, _)| path)
    }

    /// Converts a sequence of nodes into the edges between them.
    pub fn path_edges(path: &[NodeId]) -> Route {
        path.windows(2).map(|pair| (pair[0], pair[1])).collect()
    }
}
