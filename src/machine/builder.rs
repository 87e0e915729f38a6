//! Builder pattern for MotionContext.

use crate::config::{validate_config, MachineConfig};
use crate::endstop::EndstopInputs;
use crate::error::{ConfigError, Error, Result};
use crate::motor::{StepOutputs, StepTimer};

use super::context::MotionContext;

/// Builder for creating [`MotionContext`] instances.
///
/// ```rust,ignore
/// let ctx: MotionContext<_, _, _, 16> = MotionContextBuilder::new()
///     .config(printer_motion::load_config("printer.toml")?)
///     .outputs(pins)
///     .timer(timer)
///     .endstops(switches)
///     .build()?;
/// ```
pub struct MotionContextBuilder<OUT, TIM, END, const N: usize>
where
    OUT: StepOutputs,
    TIM: StepTimer,
    END: EndstopInputs,
{
    config: Option<MachineConfig>,
    outputs: Option<OUT>,
    timer: Option<TIM>,
    endstops: Option<END>,
}

impl<OUT, TIM, END, const N: usize> Default for MotionContextBuilder<OUT, TIM, END, N>
where
    OUT: StepOutputs,
    TIM: StepTimer,
    END: EndstopInputs,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<OUT, TIM, END, const N: usize> MotionContextBuilder<OUT, TIM, END, N>
where
    OUT: StepOutputs,
    TIM: StepTimer,
    END: EndstopInputs,
{
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: None,
            outputs: None,
            timer: None,
            endstops: None,
        }
    }

    /// Set the machine configuration.
    pub fn config(mut self, config: MachineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load the machine configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[cfg(feature = "std")]
    pub fn config_file<P: AsRef<std::path::Path>>(self, path: P) -> Result<Self> {
        Ok(self.config(crate::config::load_config(path)?))
    }

    /// Set the STEP/DIR outputs.
    pub fn outputs(mut self, outputs: OUT) -> Self {
        self.outputs = Some(outputs);
        self
    }

    /// Set the step timer.
    pub fn timer(mut self, timer: TIM) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Set the endstop inputs (`()` for a machine without switches).
    pub fn endstops(mut self, endstops: END) -> Self {
        self.endstops = Some(endstops);
        self
    }

    /// Build the MotionContext.
    ///
    /// # Errors
    ///
    /// Returns an error if a component is missing, the configuration is
    /// invalid or the outputs have fewer channels than the machine needs.
    pub fn build(self) -> Result<MotionContext<OUT, TIM, END, N>> {
        let config = self
            .config
            .ok_or_else(|| Error::Config(ConfigError::MissingComponent("config")))?;
        let outputs = self
            .outputs
            .ok_or_else(|| Error::Config(ConfigError::MissingComponent("outputs")))?;
        let timer = self
            .timer
            .ok_or_else(|| Error::Config(ConfigError::MissingComponent("timer")))?;
        let endstops = self
            .endstops
            .ok_or_else(|| Error::Config(ConfigError::MissingComponent("endstops")))?;

        validate_config(&config)?;

        let required = 3 + config.planner.extruders as usize;
        let available = outputs.channel_count();
        if available < required {
            return Err(Error::Config(ConfigError::ChannelCount { required, available }));
        }

        Ok(MotionContext::new(config, outputs, timer, endstops))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fixtures::machine;
    use crate::config::KinematicsConfig;
    use crate::error::MotorError;
    use crate::motion::Direction;
    use crate::motor::ChannelMask;

    struct Outputs(usize);

    impl StepOutputs for Outputs {
        fn channel_count(&self) -> usize {
            self.0
        }

        fn set_direction(&mut self, _channel: usize, _direction: Direction) -> core::result::Result<(), MotorError> {
            Ok(())
        }

        fn pulse(&mut self, _channels: ChannelMask) -> core::result::Result<(), MotorError> {
            Ok(())
        }
    }

    struct Timer;

    impl StepTimer for Timer {
        fn start(&mut self, _ticks: u32) {}
        fn schedule_next_tick(&mut self, _ticks: u32) {}
        fn stop(&mut self) {}
        fn is_running(&self) -> bool {
            false
        }
    }

    type Builder = MotionContextBuilder<Outputs, Timer, (), 16>;

    #[test]
    fn test_builder_missing_components() {
        let result = Builder::new().outputs(Outputs(4)).timer(Timer).endstops(()).build();
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::MissingComponent("config")))
        ));

        let result = Builder::new()
            .config(machine(KinematicsConfig::Cartesian))
            .outputs(Outputs(4))
            .endstops(())
            .build();
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::MissingComponent("timer")))
        ));
    }

    #[test]
    fn test_builder_checks_channels() {
        let mut config = machine(KinematicsConfig::Cartesian);
        config.planner.extruders = 2;

        let result = Builder::new()
            .config(config.clone())
            .outputs(Outputs(4))
            .timer(Timer)
            .endstops(())
            .build();
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::ChannelCount {
                required: 5,
                available: 4
            }))
        ));

        let ctx = Builder::new()
            .config(config)
            .outputs(Outputs(5))
            .timer(Timer)
            .endstops(())
            .build()
            .unwrap();
        assert!(ctx.is_idle());
    }
}
