//! Per-vehicle termination and episode truncation.

use crate::vehicle::Vehicle;

/// Whether a controlled vehicle is done: it crashed, or it left the road
/// while leaving the road is terminal.
pub fn is_terminated(vehicle: &Vehicle, offroad_terminal: bool) -> bool {
    vehicle.crashed() || (offroad_terminal && !vehicle.on_road())
}

/// Whether the episode is over: every controlled vehicle is done, or the
/// elapsed time reached the episode duration.
pub fn is_truncated(terminated: &[bool], time: f64, duration: f64) -> bool {
    terminated.iter().all(|t| *t) || time >= duration
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn truncation() {
        assert!(!is_truncated(&[true, false], 39.0, 40.0));
        assert!(is_truncated(&[true, true], 1.0, 40.0));
        assert!(is_truncated(&[false, false], 40.0, 40.0));
        assert!(is_truncated(&[], 0.0, 40.0));
    }
}
