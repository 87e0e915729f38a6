//! Direction and phase vocabulary of the step generator.

use crate::planner::Block;

/// Direction of actuator travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Increasing step count.
    Forward,
    /// Decreasing step count.
    Reverse,
}

impl Direction {
    /// Get direction from a signed step count (zero counts as forward).
    #[inline]
    pub fn from_steps(steps: i32) -> Self {
        if steps >= 0 {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    /// Get the sign multiplier.
    #[inline]
    pub fn sign(self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }

    /// `true` for [`Direction::Forward`].
    #[inline]
    pub fn is_forward(self) -> bool {
        self == Direction::Forward
    }
}

/// Phase of the block being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionPhase {
    /// Step rate rising toward the nominal rate.
    Accelerating,
    /// Constant nominal rate.
    Cruising,
    /// Step rate falling toward the final rate.
    Decelerating,
    /// No block is executing.
    Complete,
}

impl MotionPhase {
    /// Phase a block is in after `completed` step events.
    ///
    /// Matches the step generator: the event that reaches `accelerate_until` is
    /// still an accelerating one, deceleration starts after `decelerate_after`.
    pub fn of_block(block: &Block, completed: u32) -> Self {
        Self::at(
            completed,
            block.accelerate_until,
            block.decelerate_after,
            block.step_event_count,
        )
    }

    /// Phase after `completed` of `total` step events.
    pub fn at(completed: u32, accelerate_until: u32, decelerate_after: u32, total: u32) -> Self {
        if completed >= total {
            MotionPhase::Complete
        } else if completed <= accelerate_until {
            MotionPhase::Accelerating
        } else if completed > decelerate_after {
            MotionPhase::Decelerating
        } else {
            MotionPhase::Cruising
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_steps() {
        assert_eq!(Direction::from_steps(100), Direction::Forward);
        assert_eq!(Direction::from_steps(-100), Direction::Reverse);
        assert_eq!(Direction::from_steps(0), Direction::Forward);
        assert_eq!(Direction::Reverse.sign(), -1);
    }

    #[test]
    fn test_phase_boundaries() {
        let mut block = Block::EMPTY;
        block.step_event_count = 100;
        block.accelerate_until = 30;
        block.decelerate_after = 70;

        assert_eq!(MotionPhase::of_block(&block, 0), MotionPhase::Accelerating);
        assert_eq!(MotionPhase::of_block(&block, 30), MotionPhase::Accelerating);
        assert_eq!(MotionPhase::of_block(&block, 31), MotionPhase::Cruising);
        assert_eq!(MotionPhase::of_block(&block, 70), MotionPhase::Cruising);
        assert_eq!(MotionPhase::of_block(&block, 71), MotionPhase::Decelerating);
        assert_eq!(MotionPhase::of_block(&block, 100), MotionPhase::Complete);
    }
}
