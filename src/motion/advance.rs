//! Linear advance: extruder lead steps layered on top of the block.
//!
//! Filament pressure lags behind the commanded extrusion, so while a printing
//! block speeds up the extruder is pushed a few steps ahead of the plan and
//! pulled back as the block slows down. Lead steps never touch the Bresenham
//! counters or the logical position; once motion stops the lead is drained back
//! to zero so the net E displacement matches the plan.

use crate::error::MotorError;
use crate::motor::{StepOutputs, MAX_CHANNELS};
use crate::planner::AdvanceLead;

use super::profile::Direction;

/// Upper bound on lead steps issued in one interrupt.
pub const MAX_LEAD_STEPS_PER_TICK: u32 = 4;

/// Lead currently applied on one extruder channel.
#[derive(Debug, Clone, Default)]
pub struct AdvanceState {
    /// Extra forward steps issued and not yet taken back.
    applied: u32,
    target: u32,
    /// Ticks between lead steps, from the last block that planned a lead.
    interval: u32,
    /// Ticks banked toward the next lead step.
    credit: u32,
    channel: usize,
}

impl AdvanceState {
    /// Idle state with no lead applied.
    pub const fn new() -> Self {
        Self {
            applied: 0,
            target: 0,
            interval: 0,
            credit: 0,
            channel: 0,
        }
    }

    /// Lead steps currently applied.
    #[inline]
    pub fn applied(&self) -> u32 {
        self.applied
    }

    /// Whether lead steps are still owed in either direction.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.applied != self.target
    }

    /// Ticks between lead steps while draining.
    #[inline]
    pub fn interval(&self) -> u32 {
        self.interval.max(1)
    }

    /// Aim for the lead of a running block.
    ///
    /// `decelerating` selects between the block's cruise and exit leads. A
    /// block on another extruder channel cannot take over while lead is still
    /// applied on the old one, so the old lead drains first.
    pub fn follow(&mut self, lead: Option<&AdvanceLead>, channel: usize, decelerating: bool) {
        match lead {
            Some(lead) if self.applied == 0 || channel == self.channel => {
                self.channel = channel;
                self.interval = lead.interval;
                self.target = if decelerating { lead.final_steps } else { lead.max_steps };
            }
            _ => self.target = 0,
        }
    }

    /// Aim for zero lead.
    #[inline]
    pub fn release(&mut self) {
        self.target = 0;
    }

    /// Forget the lead without stepping, after a halt.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Issue the lead steps due after `elapsed` ticks, then put the DIR line
    /// back to `restore`.
    ///
    /// Returns the signed number of lead steps issued.
    pub fn run<O: StepOutputs>(
        &mut self,
        elapsed: u32,
        outputs: &mut O,
        restore: &[Option<Direction>; MAX_CHANNELS],
    ) -> Result<i32, MotorError> {
        if !self.is_pending() {
            self.credit = 0;
            return Ok(0);
        }

        let interval = self.interval();
        self.credit = self.credit.saturating_add(elapsed);
        let due = (self.credit / interval).min(MAX_LEAD_STEPS_PER_TICK);
        let owed = self.applied.abs_diff(self.target);
        let count = due.min(owed);
        if count == 0 {
            return Ok(0);
        }
        self.credit = if due == MAX_LEAD_STEPS_PER_TICK {
            0
        } else {
            self.credit - count * interval
        };

        let direction = if self.target > self.applied {
            Direction::Forward
        } else {
            Direction::Reverse
        };
        let channel = self.channel;
        let previous = restore.get(channel).copied().flatten();
        if previous != Some(direction) {
            outputs.set_direction(channel, direction)?;
        }
        for _ in 0..count {
            outputs.pulse(1 << channel)?;
        }
        if let Some(previous) = previous.filter(|&p| p != direction) {
            outputs.set_direction(channel, previous)?;
        }

        let signed = count as i32;
        match direction {
            Direction::Forward => {
                self.applied += count;
                Ok(signed)
            }
            Direction::Reverse => {
                self.applied -= count;
                Ok(-signed)
            }
        }
    }
}
