//! Stepper outputs, step timer and position state.
//!
//! The step generator only talks to hardware through [`StepOutputs`] and
//! [`StepTimer`]. [`PinBank`] implements the outputs on embedded-hal pins; the
//! timer is left to the board support code.

mod driver;
mod position;

pub use driver::{PinBank, StepperDriver};
pub use position::PositionState;

use crate::config::MAX_EXTRUDERS;
use crate::error::MotorError;
use crate::motion::Direction;

/// Number of step channels: three positioning actuators plus the extruders.
pub const MAX_CHANNELS: usize = 3 + MAX_EXTRUDERS as usize;

/// Bit set of step channels (bit `n` is channel `n`).
pub type ChannelMask = u8;

/// Step channel that drives extruder `extruder`.
#[inline]
pub const fn extruder_channel(extruder: u8) -> usize {
    3 + extruder as usize
}

/// Channel-indexed STEP/DIR outputs.
///
/// Channels 0..=2 are the positioning actuators, 3.. the extruders.
pub trait StepOutputs {
    /// Number of channels wired.
    fn channel_count(&self) -> usize;

    /// Drive the DIR line of a channel.
    ///
    /// # Errors
    ///
    /// Returns `MotorError::PinError` if the pin write fails.
    fn set_direction(&mut self, channel: usize, direction: Direction) -> Result<(), MotorError>;

    /// Emit one STEP pulse on every channel in `channels`.
    ///
    /// # Errors
    ///
    /// Returns `MotorError::PinError` if a pin write fails.
    fn pulse(&mut self, channels: ChannelMask) -> Result<(), MotorError>;
}

/// The periodic interrupt source driving the step generator.
pub trait StepTimer {
    /// Start firing after `ticks` timer ticks.
    fn start(&mut self, ticks: u32);

    /// Set the delay until the next interrupt.
    fn schedule_next_tick(&mut self, ticks: u32);

    /// Stop firing.
    fn stop(&mut self);

    /// Whether interrupts are being delivered.
    fn is_running(&self) -> bool;
}
