//! Babystepping: single extra steps injected while printing.
//!
//! Requests are queued per axis and drained one step per axis per interrupt.
//! They move the machine without touching the logical position, so the
//! planner never sees them; the accumulated offset is reported separately.

use crate::config::Axis;
use crate::error::{MotorError, PlannerError};
use crate::kinematics::{KinematicModel, Kinematics};
use crate::motor::{ChannelMask, StepOutputs, MAX_CHANNELS};

use super::profile::Direction;

/// Queue of babystep requests.
#[derive(Debug, Clone)]
pub struct Babystepper {
    queued: [i16; 3],
    offset: [i32; 3],
    patterns: [[i8; 3]; 3],
}

impl Babystepper {
    /// Create a queue using the actuator patterns of the kinematics.
    pub fn new(kinematics: &Kinematics) -> Self {
        Self {
            queued: [0; 3],
            offset: [0; 3],
            patterns: core::array::from_fn(|i| kinematics.babystep_pattern(Axis::MOTION[i])),
        }
    }

    /// Whether the kinematics can babystep `axis`.
    pub fn supports(&self, axis: Axis) -> bool {
        self.patterns
            .get(axis.index())
            .is_some_and(|p| p.iter().any(|&d| d != 0))
    }

    /// Queue one step on `axis`.
    ///
    /// # Errors
    ///
    /// Returns `PlannerError::BabystepUnsupported` for the extruder and for axes
    /// the kinematics cannot nudge on their own.
    pub fn queue(&mut self, axis: Axis, direction: Direction) -> Result<(), PlannerError> {
        if !self.supports(axis) {
            return Err(PlannerError::BabystepUnsupported(axis));
        }
        let slot = &mut self.queued[axis.index()];
        *slot = slot.saturating_add(direction.sign() as i16);
        Ok(())
    }

    /// Whether steps are waiting.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.queued.iter().any(|&q| q != 0)
    }

    /// Net babysteps emitted on an axis.
    #[inline]
    pub fn offset_steps(&self, axis: Axis) -> i32 {
        self.offset.get(axis.index()).copied().unwrap_or(0)
    }

    /// Drop queued requests.
    pub fn clear(&mut self) {
        self.queued = [0; 3];
    }

    /// Emit one step for each axis with queued requests, then put the DIR lines
    /// back to `restore`.
    ///
    /// Returns the number of axes stepped.
    pub fn run<O: StepOutputs>(
        &mut self,
        outputs: &mut O,
        restore: &[Option<Direction>; MAX_CHANNELS],
    ) -> Result<u8, MotorError> {
        let mut stepped = 0;
        for axis in 0..3 {
            let request = self.queued[axis];
            if request == 0 {
                continue;
            }
            let sign = request.signum();

            let mut mask: ChannelMask = 0;
            for (channel, &pattern) in self.patterns[axis].iter().enumerate() {
                if pattern == 0 {
                    continue;
                }
                let direction = if pattern as i16 * sign > 0 {
                    Direction::Forward
                } else {
                    Direction::Reverse
                };
                outputs.set_direction(channel, direction)?;
                mask |= 1 << channel;
            }
            outputs.pulse(mask)?;

            self.queued[axis] -= sign;
            self.offset[axis] += sign as i32;
            stepped += 1;
        }

        if stepped > 0 {
            for (channel, direction) in restore.iter().take(3).enumerate() {
                if let Some(direction) = direction {
                    outputs.set_direction(channel, *direction)?;
                }
            }
        }
        Ok(stepped)
    }
}
