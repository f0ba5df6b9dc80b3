use crate::error::SimResult;
use crate::road::Road;
use crate::VehicleId;

/// Builds what the agent sees after a reset or a step.
pub trait ObservationBuilder {
    type Observation;

    /// Observes the road from the point of view of each controlled vehicle.
    fn observe(&self, road: &Road, controlled: &[VehicleId]) -> SimResult<Self::Observation>;
}

/// The kinematic features of a vehicle: `[presence, x, y, vx, vy]`.
pub type KinematicsRow = [f64; 5];

/// A kinematics table per controlled vehicle. The first row is the observing
/// vehicle in world coordinates; the following rows are the nearest other
/// vehicles relative to it, closest first, padded with zero rows.
#[derive(Clone, Debug)]
pub struct Kinematics {
    /// The number of rows per controlled vehicle, the observing vehicle included.
    pub vehicles_count: usize,
}

impl Default for Kinematics {
    fn default() -> Self {
        Self { vehicles_count: 5 }
    }
}

impl ObservationBuilder for Kinematics {
    type Observation = Vec<Vec<KinematicsRow>>;

    fn observe(&self, road: &Road, controlled: &[VehicleId]) -> SimResult<Self::Observation> {
        controlled
            .iter()
            .map(|id| {
                let ego = road.vehicle(*id)?;
                let (p, v) = (ego.position(), ego.velocity());
                let mut rows = Vec::with_capacity(self.vehicles_count);
                rows.push([1.0, p.x, p.y, v.x, v.y]);

                let mut others = road
                    .iter()
                    .filter(|other| other.id() != ego.id())
                    .map(|other| (ego.distance_to(other), other))
                    .collect::<Vec<_>>();
                others.sort_by(|a, b| a.0.total_cmp(&b.0));
                rows.extend(
                    others
                        .iter()
                        .take(self.vehicles_count.saturating_sub(1))
                        .map(|(_, other)| {
                            let dp = other.position() - p;
                            let dv = other.velocity() - v;
                            [1.0, dp.x, dp.y, dv.x, dv.y]
                        }),
                );
                rows.resize(self.vehicles_count.max(1), [0.0; 5]);
                Ok(rows)
            })
            .collect()
    }
}
