//! Per-episode speed logs and exit statistics.

use crate::error::OutputResult;
use crate::network::LaneIndex;
use crate::road::Road;
use crate::VehicleId;
use cgmath::prelude::*;
use csv::Writer;
use slotmap::SecondaryMap;
use std::fmt;
use std::io;

/// The speeds of every vehicle at one tick.
#[derive(Clone, Debug, PartialEq)]
pub struct TickRecord {
    /// The frame number, starting at 1.
    pub frame: usize,
    /// Speed magnitude of each vehicle in m/s, in road order.
    pub speeds: Vec<f64>,
}

/// Records vehicle speeds each tick, and which vehicles ever drove on a
/// tracked lane.
#[derive(Clone, Debug)]
pub struct EpisodeLogger {
    tracked: LaneIndex,
    /// The vehicles being logged, in road order.
    columns: Vec<VehicleId>,
    /// Whether each vehicle has been seen on the tracked lane.
    visited: SecondaryMap<VehicleId, bool>,
    records: Vec<TickRecord>,
    /// The next frame number.
    frame: usize,
}

/// How many vehicles of each kind took the main road or the diverted road.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EpisodeSummary {
    pub controlled_main: usize,
    pub controlled_diverted: usize,
    pub background_main: usize,
    pub background_diverted: usize,
    /// The number of controlled vehicles that never crashed.
    pub controlled_crash_free: usize,
}

impl EpisodeLogger {
    /// Starts logging the vehicles currently on the road, tracking the ramp lane
    /// (`mid->downstream[3]`) rather than slot 0 of that edge.
    pub fn new(road: &Road) -> Self {
        let columns = road.iter().map(|v| v.id()).collect::<Vec<_>>();
        let visited = columns.iter().map(|id| (*id, false)).collect();
        Self {
            tracked: road.scenario().ramp_lane(),
            columns,
            visited,
            records: vec![],
            frame: 1,
        }
    }

    /// Tracks a different lane.
    pub fn with_tracked_lane(mut self, lane: LaneIndex) -> Self {
        self.tracked = lane;
        self
    }

    pub fn tracked_lane(&self) -> LaneIndex {
        self.tracked
    }

    pub fn records(&self) -> &[TickRecord] {
        &self.records
    }

    /// Whether the vehicle has ever been seen on the tracked lane.
    pub fn visited(&self, id: VehicleId) -> bool {
        self.visited.get(id).copied().unwrap_or(false)
    }

    /// Records the state of the road for one tick.
    pub fn record_tick(&mut self, road: &Road) {
        let speeds = self
            .columns
            .iter()
            .map(|id| road.vehicle(*id).map_or(0.0, |v| v.velocity().magnitude()))
            .collect();
        self.records.push(TickRecord {
            frame: self.frame,
            speeds,
        });
        self.frame += 1;

        for vehicle in road.iter() {
            if vehicle.lane_index() == self.tracked {
                if let Some(seen) = self.visited.get_mut(vehicle.id()) {
                    *seen = true;
                }
            }
        }
    }

    /// Counts the vehicles which took each road, and the controlled vehicles which never crashed.
    pub fn summary(&self, road: &Road, controlled: &[VehicleId]) -> EpisodeSummary {
        let mut summary = EpisodeSummary::default();
        for id in &self.columns {
            let is_controlled = controlled.contains(id);
            match (is_controlled, self.visited(*id)) {
                (true, true) => summary.controlled_diverted += 1,
                (true, false) => summary.controlled_main += 1,
                (false, true) => summary.background_diverted += 1,
                (false, false) => summary.background_main += 1,
            }
        }
        summary.controlled_crash_free = controlled
            .iter()
            .filter_map(|id| road.vehicle(*id).ok())
            .filter(|v| !v.crashed())
            .count();
        summary
    }

    /// The mean speed of each vehicle over every recorded tick.
    pub fn average_speeds(&self) -> Vec<f64> {
        let n = self.records.len();
        (0..self.columns.len())
            .map(|i| match n {
                0 => 0.0,
                _ => self.records.iter().map(|r| r.speeds[i]).sum::<f64>() / n as f64,
            })
            .collect()
    }

    /// Writes one row per tick, then a row of average speeds.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> OutputResult<()> {
        let mut csv = Writer::from_writer(writer);

        let mut header = vec!["frame".to_string()];
        header.extend((0..self.columns.len()).map(|i| format!("vehicle_{}_velocity", i)));
        csv.write_record(&header)?;

        for record in &self.records {
            let mut row = vec![record.frame.to_string()];
            row.extend(record.speeds.iter().map(|s| s.to_string()));
            csv.write_record(&row)?;
        }

        let mut row = vec!["average".to_string()];
        row.extend(self.average_speeds().iter().map(|s| s.to_string()));
        csv.write_record(&row)?;

        csv.flush()?;
        Ok(())
    }
}

impl EpisodeSummary {
    /// Logs the summary at info level.
    pub fn log(&self) {
        for line in self.to_string().lines() {
            log::info!("{}", line);
        }
    }
}

impl fmt::Display for EpisodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "controlled vehicles through the main road: {}", self.controlled_main)?;
        writeln!(f, "background vehicles through the main road: {}", self.background_main)?;
        writeln!(f, "controlled vehicles through the diverted road: {}", self.controlled_diverted)?;
        writeln!(f, "background vehicles through the diverted road: {}", self.background_diverted)?;
        write!(f, "controlled vehicles that have not crashed: {}", self.controlled_crash_free)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scenario::ScenarioGeometry;
    use crate::vehicle::behavior::BackgroundState;
    use crate::vehicle::controlled::{ControlledState, SpeedLadder};
    use crate::vehicle::VehicleKind;

    fn road() -> (Road, VehicleId, VehicleId) {
        let (network, scenario) = ScenarioGeometry::default().build().unwrap();
        let ramp = scenario.ramp_lane();
        let main = scenario.reserved()[0];
        let mut road = Road::new(network, scenario);

        let position = road.network().lane(main).unwrap().position(100.0, 0.0);
        let state = ControlledState::new(main, 20.0, SpeedLadder::default());
        let ego = road
            .add_vehicle(position, 0.0, 20.0, VehicleKind::Controlled(state))
            .unwrap();

        let position = road.network().lane(ramp).unwrap().position(50.0, 0.0);
        let state = BackgroundState::new(ramp, 10.0, position);
        let other = road
            .add_vehicle(position, 0.0, 10.0, VehicleKind::Background(state))
            .unwrap();
        (road, ego, other)
    }

    #[test]
    fn frames_advance_once_per_tick() {
        let (road, _, _) = road();
        let mut logger = EpisodeLogger::new(&road);
        logger.record_tick(&road);
        logger.record_tick(&road);
        let frames: Vec<_> = logger.records().iter().map(|r| r.frame).collect();
        assert_eq!(frames, [1, 2]);
        assert_eq!(logger.records()[0].speeds, [20.0, 10.0]);
    }

    #[test]
    fn summary_counts_tracked_lane_visits() {
        let (road, ego, other) = road();
        let mut logger = EpisodeLogger::new(&road);
        logger.record_tick(&road);
        assert!(!logger.visited(ego));
        assert!(logger.visited(other));

        let summary = logger.summary(&road, &[ego]);
        assert_eq!(
            summary,
            EpisodeSummary {
                controlled_main: 1,
                controlled_diverted: 0,
                background_main: 0,
                background_diverted: 1,
                controlled_crash_free: 1,
            }
        );
        assert!(summary.to_string().contains("diverted road: 1"));

        let main = road.vehicle(ego).unwrap().lane_index();
        let mut logger = EpisodeLogger::new(&road).with_tracked_lane(main);
        assert_eq!(logger.tracked_lane(), main);
        logger.record_tick(&road);
        assert!(logger.visited(ego));
        assert!(!logger.visited(other));
    }

    #[test]
    fn csv_has_average_row() {
        let (road, _, _) = road();
        let mut logger = EpisodeLogger::new(&road);
        logger.record_tick(&road);
        logger.record_tick(&road);

        let mut out = vec![];
        logger.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "frame,vehicle_0_velocity,vehicle_1_velocity");
        assert_eq!(lines[1], "1,20,10");
        assert_eq!(lines[3], "average,20,10");
    }
}
