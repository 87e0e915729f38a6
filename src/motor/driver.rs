//! STEP/DIR outputs on embedded-hal 1.0 pins.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::error::{ConfigError, Error, MotorError, Result};
use crate::motion::Direction;

use super::{ChannelMask, StepOutputs, MAX_CHANNELS};

/// One stepper driver: a STEP and a DIR pin.
pub struct StepperDriver<STEP, DIR>
where
    STEP: OutputPin,
    DIR: OutputPin,
{
    /// STEP pin (pulse to move one step).
    step_pin: STEP,

    /// DIR pin (high = forward unless inverted).
    dir_pin: DIR,

    /// Whether direction pin logic is inverted.
    invert_direction: bool,

    /// Current direction (cached to avoid unnecessary pin writes).
    current_direction: Option<Direction>,
}

impl<STEP, DIR> StepperDriver<STEP, DIR>
where
    STEP: OutputPin,
    DIR: OutputPin,
{
    /// Create a driver.
    pub fn new(step_pin: STEP, dir_pin: DIR, invert_direction: bool) -> Self {
        Self {
            step_pin,
            dir_pin,
            invert_direction,
            current_direction: None,
        }
    }

    /// Last direction written.
    #[inline]
    pub fn direction(&self) -> Option<Direction> {
        self.current_direction
    }

    /// Drive the DIR pin; skipped if it already points that way.
    pub fn set_direction(&mut self, direction: Direction) -> core::result::Result<(), MotorError> {
        if self.current_direction == Some(direction) {
            return Ok(());
        }

        let pin_high = match direction {
            Direction::Forward => !self.invert_direction,
            Direction::Reverse => self.invert_direction,
        };

        if pin_high {
            self.dir_pin.set_high().map_err(|_| MotorError::PinError)?;
        } else {
            self.dir_pin.set_low().map_err(|_| MotorError::PinError)?;
        }

        self.current_direction = Some(direction);
        Ok(())
    }

    /// Raise the STEP pin.
    #[inline]
    pub fn step_high(&mut self) -> core::result::Result<(), MotorError> {
        self.step_pin.set_high().map_err(|_| MotorError::PinError)
    }

    /// Lower the STEP pin.
    #[inline]
    pub fn step_low(&mut self) -> core::result::Result<(), MotorError> {
        self.step_pin.set_low().map_err(|_| MotorError::PinError)
    }

    /// Give the pins back.
    pub fn release(self) -> (STEP, DIR) {
        (self.step_pin, self.dir_pin)
    }
}

/// A set of drivers sharing a pulse-width delay, indexed by channel.
pub struct PinBank<STEP, DIR, DELAY>
where
    STEP: OutputPin,
    DIR: OutputPin,
    DELAY: DelayNs,
{
    drivers: heapless::Vec<StepperDriver<STEP, DIR>, MAX_CHANNELS>,
    delay: DELAY,
    pulse_width_ns: u32,
}

impl<STEP, DIR, DELAY> PinBank<STEP, DIR, DELAY>
where
    STEP: OutputPin,
    DIR: OutputPin,
    DELAY: DelayNs,
{
    /// Create an empty bank.
    pub fn new(delay: DELAY, pulse_width_ns: u32) -> Self {
        Self {
            drivers: heapless::Vec::new(),
            delay,
            pulse_width_ns,
        }
    }

    /// Append a driver as the next channel and return its channel number.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ChannelCount` when all channels are taken.
    pub fn add(&mut self, driver: StepperDriver<STEP, DIR>) -> Result<usize> {
        let channel = self.drivers.len();
        self.drivers.push(driver).map_err(|_| {
            Error::Config(ConfigError::ChannelCount {
                required: channel + 1,
                available: MAX_CHANNELS,
            })
        })?;
        Ok(channel)
    }

    /// Builder-style [`add`](Self::add).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ChannelCount` when all channels are taken.
    pub fn with(mut self, step_pin: STEP, dir_pin: DIR, invert_direction: bool) -> Result<Self> {
        self.add(StepperDriver::new(step_pin, dir_pin, invert_direction))?;
        Ok(self)
    }

    /// Driver on a channel.
    pub fn driver(&self, channel: usize) -> Option<&StepperDriver<STEP, DIR>> {
        self.drivers.get(channel)
    }

    /// Give the drivers and the delay back.
    pub fn release(self) -> (heapless::Vec<StepperDriver<STEP, DIR>, MAX_CHANNELS>, DELAY) {
        (self.drivers, self.delay)
    }
}

impl<STEP, DIR, DELAY> StepOutputs for PinBank<STEP, DIR, DELAY>
where
    STEP: OutputPin,
    DIR: OutputPin,
    DELAY: DelayNs,
{
    fn channel_count(&self) -> usize {
        self.drivers.len()
    }

    fn set_direction(&mut self, channel: usize, direction: Direction) -> core::result::Result<(), MotorError> {
        self.drivers
            .get_mut(channel)
            .ok_or(MotorError::PinError)?
            .set_direction(direction)
    }

    fn pulse(&mut self, channels: ChannelMask) -> core::result::Result<(), MotorError> {
        if channels == 0 {
            return Ok(());
        }

        let selected = |i: &usize| channels & (1 << *i) != 0;

        for i in (0..self.drivers.len()).filter(selected) {
            self.drivers[i].step_high()?;
        }

        self.delay.delay_ns(self.pulse_width_ns);

        for i in (0..self.drivers.len()).filter(selected) {
            self.drivers[i].step_low()?;
        }
        Ok(())
    }
}
