use crate::error::{SimError, SimResult};
use std::fmt;

/// A discrete meta-action issued to a controlled vehicle once per tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Action {
    LaneLeft = 0,
    #[default]
    Idle = 1,
    LaneRight = 2,
    Faster = 3,
    Slower = 4,
}

impl Action {
    /// Every action, ordered by index.
    pub const ALL: [Action; 5] = [
        Action::LaneLeft,
        Action::Idle,
        Action::LaneRight,
        Action::Faster,
        Action::Slower,
    ];

    /// Converts an agent's action index into an action.
    pub fn from_index(index: usize) -> SimResult<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(SimError::InvalidAction(index))
    }

    /// The index of the action in the action space.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether the action requests a change of lane.
    pub fn is_lane_change(self) -> bool {
        matches!(self, Action::LaneLeft | Action::LaneRight)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::LaneLeft => "LANE_LEFT",
            Action::Idle => "IDLE",
            Action::LaneRight => "LANE_RIGHT",
            Action::Faster => "FASTER",
            Action::Slower => "SLOWER",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn indices() {
        for (i, action) in Action::ALL.iter().enumerate() {
            assert_eq!(Action::from_index(i).unwrap(), *action);
            assert_eq!(action.index(), i);
        }
        assert!(matches!(
            Action::from_index(5),
            Err(SimError::InvalidAction(5))
        ));
    }

    #[test]
    fn lane_changes() {
        assert!(Action::LaneLeft.is_lane_change());
        assert!(Action::LaneRight.is_lane_change());
        assert!(!Action::Idle.is_lane_change());
        assert!(!Action::Faster.is_lane_change());
    }
}
