//! Endstop inputs and the homing monitor.
//!
//! The monitor is sampled by the step generator once per interrupt, before any
//! step of that interrupt is issued. An axis is only checked while it travels
//! toward its own switch, so a triggered switch never stops a move backing
//! away from it.

use embedded_hal::digital::InputPin;

use crate::config::{Axis, EndstopSide, EndstopsConfig, MachineConfig};
use crate::error::MotorError;

/// Source of endstop states.
pub trait EndstopInputs {
    /// Whether the switch of `axis` is triggered.
    ///
    /// # Errors
    ///
    /// Returns `MotorError::PinError` if the input cannot be read; the monitor
    /// treats an unreadable switch as triggered.
    fn is_triggered(&mut self, axis: Axis) -> Result<bool, MotorError>;
}

/// A machine without endstops.
impl EndstopInputs for () {
    fn is_triggered(&mut self, _axis: Axis) -> Result<bool, MotorError> {
        Ok(false)
    }
}

/// Endstop switches on embedded-hal input pins.
pub struct EndstopPins<P: InputPin> {
    pins: [Option<P>; 3],
    inverted: [bool; 3],
}

impl<P: InputPin> EndstopPins<P> {
    /// No switches wired yet.
    pub fn new() -> Self {
        Self {
            pins: [None, None, None],
            inverted: [false; 3],
        }
    }

    /// Attach the switch of a positioning axis. `inverted` switches read low when triggered.
    pub fn with(mut self, axis: Axis, pin: P, inverted: bool) -> Self {
        if let Some(slot) = self.pins.get_mut(axis.index()) {
            *slot = Some(pin);
            self.inverted[axis.index()] = inverted;
        }
        self
    }

    /// Give the pins back.
    pub fn release(self) -> [Option<P>; 3] {
        self.pins
    }
}

impl<P: InputPin> Default for EndstopPins<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: InputPin> EndstopInputs for EndstopPins<P> {
    fn is_triggered(&mut self, axis: Axis) -> Result<bool, MotorError> {
        let index = axis.index();
        match self.pins.get_mut(index) {
            Some(Some(pin)) => {
                let high = pin.is_high().map_err(|_| MotorError::PinError)?;
                Ok(high != self.inverted[index])
            }
            _ => Ok(false),
        }
    }
}

/// Debounced endstop sampling.
#[derive(Debug, Clone)]
pub struct EndstopMonitor {
    /// Travel sign toward each switch (0 = no switch).
    toward: [i8; 3],
    /// Consecutive triggered samples per axis.
    hits: [u8; 3],
    threshold: u8,
    check_during_moves: bool,
}

impl EndstopMonitor {
    /// Monitor for the switches configured on a machine.
    pub fn new(config: &MachineConfig) -> Self {
        let toward = core::array::from_fn(|i| match &config.axes.get(Axis::MOTION[i]).endstop {
            Some(endstop) => match endstop.side {
                EndstopSide::Min => -1,
                EndstopSide::Max => 1,
            },
            None => 0,
        });
        Self::with_sides(toward, &config.endstops)
    }

    /// Monitor from explicit switch sides (`-1` min, `1` max, `0` none).
    pub fn with_sides(toward: [i8; 3], config: &EndstopsConfig) -> Self {
        Self {
            toward,
            hits: [0; 3],
            threshold: config.noise_threshold.max(1),
            check_during_moves: config.check_during_moves,
        }
    }

    /// Whether ordinary moves are watched.
    #[inline]
    pub fn check_during_moves(&self) -> bool {
        self.check_during_moves
    }

    /// Whether an axis has a switch.
    #[inline]
    pub fn has_endstop(&self, axis: Axis) -> bool {
        self.toward.get(axis.index()).is_some_and(|&t| t != 0)
    }

    /// Forget partial hit counts.
    pub fn reset(&mut self) {
        self.hits = [0; 3];
    }

    /// Sample the switches of every axis moving toward its switch.
    ///
    /// `motion` is the travel sign of each axis in the running block. Returns
    /// the first axis whose switch has been triggered for `noise_threshold`
    /// consecutive samples.
    pub fn sample<E: EndstopInputs>(&mut self, inputs: &mut E, motion: [i8; 3]) -> Option<Axis> {
        let mut hit = None;
        for (i, axis) in Axis::MOTION.into_iter().enumerate() {
            if self.toward[i] == 0 || motion[i] != self.toward[i] {
                self.hits[i] = 0;
                continue;
            }

            let triggered = inputs.is_triggered(axis).unwrap_or(true);
            if triggered {
                self.hits[i] = self.hits[i].saturating_add(1);
                if self.hits[i] >= self.threshold && hit.is_none() {
                    hit = Some(axis);
                }
            } else {
                self.hits[i] = 0;
            }
        }
        hit
    }
}
