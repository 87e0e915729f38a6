//! Configuration validation.

use crate::error::{ConfigError, Error, Result};
use crate::motion::timing::MAX_RATE;

use super::axis::{Axis, AxisConfig};
use super::kinematics::{DeltaGeometry, KinematicsConfig, ScaraGeometry};
use super::planner::{PlannerConfig, MAX_EXTRUDERS};
use super::stepper::StepperConfig;
use super::MachineConfig;

/// Validate a machine configuration.
///
/// Checks:
/// - Axis mechanics are positive and soft limits are ordered
/// - Geometry constants describe a buildable machine
/// - CoreXY belts share the same steps per mm
/// - Planner and stepper timing values are in range
pub fn validate_config(config: &MachineConfig) -> Result<()> {
    for (axis, cfg) in config.axes.iter() {
        validate_axis(axis, cfg).map_err(|e| {
            warn!("axis {} failed validation", axis);
            e
        })?;
    }

    validate_kinematics(config)?;
    validate_planner(&config.planner)?;
    validate_stepper(&config.stepper)?;

    Ok(())
}

fn validate_axis(axis: Axis, config: &AxisConfig) -> Result<()> {
    // Gear ratio must be positive
    if config.gear_ratio <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidGearRatio(config.gear_ratio)));
    }

    if config.rotation_distance <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidRotationDistance(
            config.rotation_distance,
        )));
    }

    if config.max_feedrate.0 <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidMaxFeedrate {
            axis,
            value: config.max_feedrate.0,
        }));
    }

    if config.max_acceleration.0 <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidMaxAcceleration {
            axis,
            value: config.max_acceleration.0,
        }));
    }

    // Soft limits: min must be < max
    if let Some(ref limits) = config.limits {
        if !limits.is_valid() {
            return Err(Error::Config(ConfigError::InvalidSoftLimits {
                min: limits.min.0,
                max: limits.max.0,
            }));
        }
    }

    if let Some(ref endstop) = config.endstop {
        if endstop.homing_feedrate.0 <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidMaxFeedrate {
                axis,
                value: endstop.homing_feedrate.0,
            }));
        }
        if endstop.max_travel.0 <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidGeometry(
                "endstop max_travel must be > 0",
            )));
        }
    }

    Ok(())
}

fn validate_kinematics(config: &MachineConfig) -> Result<()> {
    match &config.kinematics {
        KinematicsConfig::Cartesian => Ok(()),
        KinematicsConfig::CoreXy => {
            let a = config.axes.x.steps_per_unit();
            let b = config.axes.y.steps_per_unit();
            if libm::fabsf(a - b) > 1e-3 * a {
                return Err(Error::Config(ConfigError::CoreStepsMismatch { a, b }));
            }
            Ok(())
        }
        KinematicsConfig::Delta(geometry) => validate_delta(geometry),
        KinematicsConfig::Scara(geometry) => validate_scara(geometry),
    }
}

fn validate_delta(geometry: &DeltaGeometry) -> Result<()> {
    if geometry.diagonal_rod <= 0.0 || geometry.radius <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidGeometry(
            "delta diagonal_rod and radius must be > 0",
        )));
    }
    if geometry.printable_radius <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidGeometry(
            "delta printable_radius must be > 0",
        )));
    }
    // The rods must still reach the far tower from the edge of the bed.
    if geometry.radius + geometry.printable_radius >= geometry.diagonal_rod {
        return Err(Error::Config(ConfigError::InvalidGeometry(
            "delta diagonal_rod too short for printable_radius",
        )));
    }
    if geometry.segments_per_second <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidGeometry(
            "segments_per_second must be > 0",
        )));
    }
    Ok(())
}

fn validate_scara(geometry: &ScaraGeometry) -> Result<()> {
    if geometry.inner_arm <= 0.0 || geometry.outer_arm <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidGeometry(
            "scara arm lengths must be > 0",
        )));
    }
    if geometry.segments_per_second <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidGeometry(
            "segments_per_second must be > 0",
        )));
    }
    Ok(())
}

fn validate_planner(config: &PlannerConfig) -> Result<()> {
    if config.junction_deviation <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidJunctionDeviation(
            config.junction_deviation,
        )));
    }

    for accel in [
        config.acceleration.0,
        config.travel_acceleration.0,
        config.retract_acceleration.0,
    ] {
        if accel <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidAcceleration(accel)));
        }
    }

    if config.min_planner_speed.0 < 0.0 {
        return Err(Error::Config(ConfigError::InvalidTiming(
            "min_planner_speed must be >= 0",
        )));
    }

    if config.extruders == 0 || config.extruders > MAX_EXTRUDERS {
        return Err(Error::Config(ConfigError::InvalidExtruderCount(config.extruders)));
    }

    if let Some(&k) = config.advance_k.iter().find(|k| !k.is_finite() || **k < 0.0) {
        return Err(Error::Config(ConfigError::InvalidAdvanceK(k)));
    }

    Ok(())
}

fn validate_stepper(config: &StepperConfig) -> Result<()> {
    if config.timer_frequency == 0 {
        return Err(Error::Config(ConfigError::InvalidTiming(
            "timer_frequency must be > 0",
        )));
    }
    if config.max_step_frequency == 0 || config.max_step_frequency > config.timer_frequency / 2 {
        return Err(Error::Config(ConfigError::InvalidTiming(
            "max_step_frequency must be in 1..=timer_frequency/2",
        )));
    }
    if config.max_step_frequency > MAX_RATE {
        return Err(Error::Config(ConfigError::InvalidTiming(
            "max_step_frequency above the interval table range",
        )));
    }
    if config.max_multistep == 0 || !config.max_multistep.is_power_of_two() {
        return Err(Error::Config(ConfigError::InvalidTiming(
            "max_multistep must be a power of two",
        )));
    }
    if config.min_step_rate == 0 || config.min_step_rate >= config.max_step_frequency {
        return Err(Error::Config(ConfigError::InvalidTiming(
            "min_step_rate must be in 1..max_step_frequency",
        )));
    }
    // The slowest interval has to fit the 16-bit compare registers of small MCUs.
    if config.timer_frequency / config.min_step_rate > u16::MAX as u32 {
        return Err(Error::Config(ConfigError::InvalidTiming(
            "min_step_rate too low for timer_frequency",
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::units::{Microsteps, MmPerSec, MmPerSecSquared};

    fn axis() -> AxisConfig {
        AxisConfig {
            steps_per_rotation: 200,
            microsteps: Microsteps::SIXTEENTH,
            rotation_distance: 40.0,
            gear_ratio: 1.0,
            max_feedrate: MmPerSec(300.0),
            max_acceleration: MmPerSecSquared(3000.0),
            invert_direction: false,
            limits: None,
            endstop: None,
        }
    }

    #[test]
    fn test_invalid_gear_ratio() {
        let mut config = axis();
        config.gear_ratio = -1.0;

        let result = validate_axis(Axis::X, &config);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidGearRatio(_)))
        ));
    }

    #[test]
    fn test_zero_feedrate_names_axis() {
        let mut config = axis();
        config.max_feedrate = MmPerSec(0.0);

        let result = validate_axis(Axis::Z, &config);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidMaxFeedrate { axis: Axis::Z, .. }))
        ));
    }

    #[test]
    fn test_short_delta_rods_rejected() {
        let geometry = DeltaGeometry {
            diagonal_rod: 150.0,
            radius: 100.0,
            printable_radius: 90.0,
            segments_per_second: 200.0,
        };
        assert!(validate_delta(&geometry).is_err());
    }

    #[test]
    fn test_stepper_timing_bounds() {
        assert!(validate_stepper(&StepperConfig::default()).is_ok());

        let config = StepperConfig {
            max_multistep: 3,
            ..StepperConfig::default()
        };
        assert!(validate_stepper(&config).is_err());

        let config = StepperConfig {
            min_step_rate: 10,
            ..StepperConfig::default()
        };
        assert!(validate_stepper(&config).is_err());
    }

    #[test]
    fn test_step_frequency_within_table() {
        let config = StepperConfig {
            max_step_frequency: MAX_RATE,
            ..StepperConfig::default()
        };
        assert!(validate_stepper(&config).is_ok());

        // Half a 2 MHz timer is allowed by the timer, not by the tables.
        let config = StepperConfig {
            max_step_frequency: 100_000,
            ..StepperConfig::default()
        };
        assert!(matches!(
            validate_stepper(&config),
            Err(Error::Config(ConfigError::InvalidTiming(_)))
        ));
    }
}
