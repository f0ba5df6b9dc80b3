//! Miscellaneous utility structs and functions.

use std::fmt::Debug;

/// An interval on the real number line.
#[derive(Copy, Clone, Default, PartialEq)]
pub struct Interval<T> {
    pub min: T,
    pub max: T,
}

impl<T> Interval<T> {
    /// Creates a new interval.
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl<T: PartialOrd> Interval<T> {
    /// Returns true if this interval overlaps with the other.
    /// Intervals which merely touch do not overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.max > other.min && other.max > self.min
    }

    /// Returns true if this interval contains the value.
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Interval<f64> {
    /// Creates an interval with the given centre and radius.
    pub fn disc(centre: f64, radius: f64) -> Self {
        Self {
            min: centre - radius,
            max: centre + radius,
        }
    }

    /// The smallest interval containing every value, or `None` if there are none.
    pub fn hull(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values.into_iter().fold(None, |acc, v| match acc {
            None => Some(Self::new(v, v)),
            Some(i) => Some(Self::new(f64::min(i.min, v), f64::max(i.max, v))),
        })
    }
}

impl<T: Debug> Debug for Interval<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interval({:?}, {:?})", &self.min, &self.max)
    }
}

/// Splits `total` into `bins` integers which differ by at most one,
/// with the larger parts first.
pub fn near_split(total: usize, bins: usize) -> Vec<usize> {
    if bins == 0 {
        return vec![];
    }
    let (quotient, remainder) = (total / bins, total % bins);
    (0..bins)
        .map(|i| quotient + usize::from(i < remainder))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn overlap_is_strict() {
        let a = Interval::new(0.0, 1.0);
        assert!(a.overlaps(&Interval::new(0.5, 2.0)));
        assert!(!a.overlaps(&Interval::new(1.0, 2.0)));
    }

    #[test]
    fn hull_of_points() {
        let i = Interval::hull([3.0, -1.0, 2.0]).unwrap();
        assert_eq!(i, Interval::new(-1.0, 3.0));
        assert!(Interval::hull(std::iter::empty()).is_none());
    }

    #[test]
    fn near_split_balances() {
        assert_eq!(near_split(10, 4), vec![3, 3, 2, 2]);
        assert_eq!(near_split(6, 4), vec![2, 2, 1, 1]);
        assert_eq!(near_split(0, 2), vec![0, 0]);
        assert!(near_split(5, 0).is_empty());
    }
}
