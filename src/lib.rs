pub use action::Action;
pub use cgmath;
pub use config::{Config, RenderConfig};
pub use constraint::{constrain_action, enforce};
pub use error::{OutputError, OutputResult, SimError, SimResult};
pub use lane::{LineType, StraightLane};
pub use logger::{EpisodeLogger, EpisodeSummary};
pub use network::{LaneIndex, RoadNetwork, Route};
pub use observation::{Kinematics, ObservationBuilder};
pub use reward::{RewardTerms, RewardWeights};
pub use road::Road;
pub use scenario::{ExitCorridor, ScenarioGeometry, ScenarioLanes};
pub use simulation::{Info, Simulation, Step};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use util::Interval;
pub use vehicle::{Command, Vehicle, VehicleKind};

mod action;
mod config;
mod constraint;
#[cfg(feature = "debug")]
mod debug;
mod error;
mod lane;
mod logger;
pub mod math;
mod network;
mod observation;
mod reward;
mod road;
mod scenario;
mod simulation;
mod termination;
mod util;
pub mod vehicle;

new_key_type! {
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
    /// Unique ID of a node in the [RoadNetwork].
    pub struct NodeId;
}

type VehicleSet = SlotMap<VehicleId, Vehicle>;
