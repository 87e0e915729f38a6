//! Executed machine position.

use crate::config::Axis;
use crate::kinematics::Pose;
use crate::motion::Direction;

/// Position state shared by the step generator and the command side.
///
/// `steps` is authoritative: it is advanced by the step generator as pulses
/// go out. `requested` is the last pose a caller asked for and is only used
/// for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionState {
    /// Current actuator position in steps (X/A, Y/B, Z/C, E).
    steps: [i32; 4],
    /// Last requested pose.
    requested: Pose,
}

impl PositionState {
    /// Create a position state at the given step position.
    #[inline]
    pub fn at(steps: [i32; 4], requested: Pose) -> Self {
        Self { steps, requested }
    }

    /// Actuator step position.
    #[inline]
    pub fn steps(&self) -> [i32; 4] {
        self.steps
    }

    /// Step position of one actuator.
    #[inline]
    pub fn axis(&self, axis: Axis) -> i32 {
        self.steps[axis.index()]
    }

    /// Overwrite the step position.
    #[inline]
    pub fn set_steps(&mut self, steps: [i32; 4]) {
        self.steps = steps;
    }

    /// Record one step on an actuator.
    #[inline]
    pub fn step(&mut self, index: usize, direction: Direction) {
        self.steps[index] += direction.sign();
    }

    /// Last requested pose.
    #[inline]
    pub fn requested(&self) -> Pose {
        self.requested
    }

    /// Record the last requested pose.
    #[inline]
    pub fn set_requested(&mut self, pose: Pose) {
        self.requested = pose;
    }
}
