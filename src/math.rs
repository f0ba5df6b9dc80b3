//! Mathematical structs and functions.

use cgmath::prelude::*;
use cgmath::{Point2, Vector2};
use std::f64::consts::PI;

/// A 2D point
pub type Point2d = Point2<f64>;

/// A 2D vector
pub type Vector2d = Vector2<f64>;

/// Projects a point onto a local coordinate system.
///
/// # Parameters
/// * `point` - The point to project
/// * `origin` - The origin of the coordinate system
/// * `x_axis` - The basis vector pointing in the positive x-axis.
/// * `y_axis` - The basis vector pointing in the positive y-axis.
pub fn project_local(point: Point2d, origin: Point2d, x_axis: Vector2d, y_axis: Vector2d) -> Point2d {
    let point = point - origin;
    Point2d::new(point.dot(x_axis), point.dot(y_axis))
}

/// Rotates a vector 90 degrees counter-clockwise.
pub fn rot90(vec: Vector2d) -> Vector2d {
    Vector2d::new(-vec.y, vec.x)
}

/// The unit vector pointing along `heading`, in radians.
pub fn heading_vector(heading: f64) -> Vector2d {
    Vector2d::new(heading.cos(), heading.sin())
}

/// Wraps an angle into the interval `[-pi, pi)`.
pub fn wrap_to_pi(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// Pushes `value` away from zero so it can be used as a divisor.
pub fn not_zero(value: f64) -> f64 {
    const EPS: f64 = 1e-2;
    if value.abs() > EPS {
        value
    } else if value >= 0.0 {
        EPS
    } else {
        -EPS
    }
}

/// The corners of a rectangle centred on `centre`, rotated to `heading`.
pub fn rect_corners(centre: Point2d, heading: f64, length: f64, width: f64) -> [Point2d; 4] {
    let tan = heading_vector(heading);
    let perp = rot90(tan);
    let (hl, hw) = (0.5 * length, 0.5 * width);
    [
        centre + tan * hl + perp * hw,
        centre + tan * hl - perp * hw,
        centre - tan * hl - perp * hw,
        centre - tan * hl + perp * hw,
    ]
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn wraps_angles() {
        assert_approx_eq!(wrap_to_pi(0.5), 0.5);
        assert_approx_eq!(wrap_to_pi(2.0 * PI + 0.25), 0.25);
        assert_approx_eq!(wrap_to_pi(-PI - 0.25), PI - 0.25);
    }

    #[test]
    fn not_zero_keeps_sign() {
        assert_eq!(not_zero(3.0), 3.0);
        assert_eq!(not_zero(0.0), 1e-2);
        assert_eq!(not_zero(-0.001), -1e-2);
    }

    #[test]
    fn local_projection() {
        let p = project_local(
            Point2d::new(3.0, 4.0),
            Point2d::new(1.0, 1.0),
            Vector2d::new(1.0, 0.0),
            Vector2d::new(0.0, 1.0),
        );
        assert_approx_eq!(p.x, 2.0);
        assert_approx_eq!(p.y, 3.0);
    }
}
