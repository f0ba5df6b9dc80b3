use crate::math::{project_local, rot90, wrap_to_pi, Point2d, Vector2d};
use crate::util::Interval;
use crate::vehicle::VEHICLE_LENGTH;
use cgmath::prelude::*;

/// The default lane width in m.
pub const DEFAULT_LANE_WIDTH: f64 = 4.0;

/// The style of a lane's boundary line, as drawn by a renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LineType {
    None,
    Striped,
    Continuous,
}

/// A straight lane of traffic.
#[derive(Clone, Debug)]
pub struct StraightLane {
    start: Point2d,
    end: Point2d,
    width: f64,
    /// The left and right boundary lines.
    line_types: [LineType; 2],
    /// Speed limit in m/s.
    speed_limit: f64,
    length: f64,
    /// Unit vector along the lane.
    dir: Vector2d,
    /// Unit vector pointing to the lane's lateral positive side.
    dir_lat: Vector2d,
    heading: f64,
}

impl StraightLane {
    /// Creates a new lane of the default width.
    pub fn new(start: Point2d, end: Point2d, line_types: [LineType; 2], speed_limit: f64) -> Self {
        let delta = end - start;
        let length = delta.magnitude();
        let dir = delta / length;
        Self {
            start,
            end,
            width: DEFAULT_LANE_WIDTH,
            line_types,
            speed_limit,
            length,
            dir,
            dir_lat: rot90(dir),
            heading: dir.y.atan2(dir.x),
        }
    }

    /// The start point of the centre line.
    pub fn start(&self) -> Point2d {
        self.start
    }

    /// The end point of the centre line.
    pub fn end(&self) -> Point2d {
        self.end
    }

    /// The length of the lane in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The width of the lane in m.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// The speed limit in m/s.
    pub fn speed_limit(&self) -> f64 {
        self.speed_limit
    }

    /// The left and right boundary line styles.
    pub fn line_types(&self) -> [LineType; 2] {
        self.line_types
    }

    /// Converts local lane coordinates into a world position.
    pub fn position(&self, longitudinal: f64, lateral: f64) -> Point2d {
        self.start + self.dir * longitudinal + self.dir_lat * lateral
    }

    /// Converts a world position into `(longitudinal, lateral)` lane coordinates.
    pub fn local_coordinates(&self, position: Point2d) -> (f64, f64) {
        let local = project_local(position, self.start, self.dir, self.dir_lat);
        (local.x, local.y)
    }

    /// The heading of the lane at the given longitudinal position, in radians.
    pub fn heading_at(&self, _longitudinal: f64) -> f64 {
        self.heading
    }

    /// Whether the local coordinates lie on the lane, with lateral slack `margin`.
    pub fn on_lane_at(&self, longitudinal: f64, lateral: f64, margin: f64) -> bool {
        let lat = Interval::disc(0.0, 0.5 * self.width + margin);
        let long = -VEHICLE_LENGTH..self.length + VEHICLE_LENGTH;
        lat.contains(lateral) && long.contains(&longitudinal)
    }

    /// Whether a world position lies on the lane.
    pub fn on_lane(&self, position: Point2d, margin: f64) -> bool {
        let (long, lat) = self.local_coordinates(position);
        self.on_lane_at(long, lat, margin)
    }

    /// Whether a vehicle at `position` is close enough to steer onto this lane.
    pub fn is_reachable_from(&self, position: Point2d) -> bool {
        let (long, lat) = self.local_coordinates(position);
        lat.abs() <= 2.0 * self.width && (0.0..self.length + VEHICLE_LENGTH).contains(&long)
    }

    /// Whether a vehicle at `position` has reached the end of the lane.
    pub fn after_end(&self, position: Point2d) -> bool {
        let (long, _) = self.local_coordinates(position);
        long > self.length - 0.5 * VEHICLE_LENGTH
    }

    /// The distance from `position` to the lane, counting lateral offset and
    /// longitudinal overshoot past either end.
    pub fn distance(&self, position: Point2d) -> f64 {
        let (long, lat) = self.local_coordinates(position);
        lat.abs() + f64::max(long - self.length, 0.0) + f64::max(-long, 0.0)
    }

    /// Like [distance](Self::distance), plus the heading mismatch weighted by `heading_weight`.
    pub fn distance_with_heading(&self, position: Point2d, heading: f64, heading_weight: f64) -> f64 {
        let (long, _) = self.local_coordinates(position);
        let angle = self.local_angle(heading, long).abs();
        self.distance(position) + heading_weight * angle
    }

    /// The difference between `heading` and the lane heading, wrapped to `[-pi, pi)`.
    pub fn local_angle(&self, heading: f64, longitudinal: f64) -> f64 {
        wrap_to_pi(heading - self.heading_at(longitudinal))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn lane() -> StraightLane {
        StraightLane::new(
            Point2d::new(100.0, 0.0),
            Point2d::new(200.0, 0.0),
            [LineType::Continuous, LineType::Striped],
            20.0,
        )
    }

    #[test]
    fn coordinates_round_trip_through_position() {
        let lane = lane();
        let p = lane.position(30.0, 1.5);
        assert_approx_eq!(p.x, 130.0);
        assert_approx_eq!(p.y, 1.5);
        let (long, lat) = lane.local_coordinates(p);
        assert_approx_eq!(long, 30.0);
        assert_approx_eq!(lat, 1.5);
    }

    #[test]
    fn sloped_lane_heading() {
        let lane = StraightLane::new(
            Point2d::new(0.0, 0.0),
            Point2d::new(100.0, 100.0),
            [LineType::None; 2],
            10.0,
        );
        assert_approx_eq!(lane.heading_at(0.0), std::f64::consts::FRAC_PI_4);
        assert_approx_eq!(lane.length(), 100.0 * 2f64.sqrt());
    }

    #[test]
    fn on_lane_bounds() {
        let lane = lane();
        assert!(lane.on_lane(Point2d::new(150.0, 1.9), 0.0));
        assert!(!lane.on_lane(Point2d::new(150.0, 2.1), 0.0));
        assert!(lane.on_lane(Point2d::new(150.0, 2.1), 1.0));
        assert!(lane.on_lane(Point2d::new(204.0, 0.0), 0.0));
        assert!(!lane.on_lane(Point2d::new(206.0, 0.0), 0.0));
    }

    #[test]
    fn reachability() {
        let lane = lane();
        assert!(lane.is_reachable_from(Point2d::new(120.0, 7.0)));
        assert!(!lane.is_reachable_from(Point2d::new(120.0, 9.0)));
        assert!(!lane.is_reachable_from(Point2d::new(99.0, 0.0)));
    }

    #[test]
    fn after_end_and_distance() {
        let lane = lane();
        assert!(!lane.after_end(Point2d::new(197.0, 0.0)));
        assert!(lane.after_end(Point2d::new(198.0, 0.0)));
        assert_approx_eq!(lane.distance(Point2d::new(90.0, -3.0)), 13.0);
        assert_approx_eq!(lane.distance(Point2d::new(150.0, 1.0)), 1.0);
        assert_approx_eq!(
            lane.distance_with_heading(Point2d::new(150.0, 1.0), 0.5, 1.0),
            1.5
        );
    }
}
