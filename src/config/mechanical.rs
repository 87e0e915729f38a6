//! Per-axis constraints derived from the axis configuration.

use super::axis::AxisConfig;
use super::limits::SoftLimits;
use super::units::{MmPerSec, MmPerSecSquared};

/// Derived actuator parameters computed from an axis configuration.
///
/// These are computed once when the motion context is built and never change
/// while it runs; a new configuration needs a new context.
#[derive(Debug, Clone)]
pub struct AxisConstraints {
    /// Steps per axis unit.
    pub steps_per_unit: f32,

    /// Maximum speed in steps per second.
    pub max_rate_steps_per_sec: f32,

    /// Maximum acceleration in steps per second squared.
    pub max_acceleration_steps_per_sec2: u32,

    /// Maximum speed in units per second.
    pub max_feedrate: MmPerSec,

    /// Maximum acceleration in units per second squared.
    pub max_acceleration: MmPerSecSquared,

    /// Soft limits in machine units (if configured).
    pub limits: Option<SoftLimits>,

    /// Direction pin is inverted.
    pub invert_direction: bool,
}

impl AxisConstraints {
    /// Compute constraints from an axis configuration.
    pub fn from_config(config: &AxisConfig) -> Self {
        let steps_per_unit = config.steps_per_unit();

        Self {
            steps_per_unit,
            max_rate_steps_per_sec: config.max_feedrate.0 * steps_per_unit,
            max_acceleration_steps_per_sec2: (config.max_acceleration.0 * steps_per_unit) as u32,
            max_feedrate: config.max_feedrate,
            max_acceleration: config.max_acceleration,
            limits: config.limits,
            invert_direction: config.invert_direction,
        }
    }

    /// Convert a distance in units to (fractional) steps.
    #[inline]
    pub fn units_to_steps(&self, units: f32) -> f32 {
        units * self.steps_per_unit
    }

    /// Convert steps to units.
    #[inline]
    pub fn steps_to_units(&self, steps: i32) -> f32 {
        steps as f32 / self.steps_per_unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::units::Microsteps;

    fn make_test_config() -> AxisConfig {
        AxisConfig {
            steps_per_rotation: 200,
            microsteps: Microsteps::SIXTEENTH,
            rotation_distance: 8.0,
            gear_ratio: 1.0,
            max_feedrate: MmPerSec(5.0),
            max_acceleration: MmPerSecSquared(100.0),
            invert_direction: true,
            limits: None,
            endstop: None,
        }
    }

    #[test]
    fn test_lead_screw_steps_per_unit() {
        let constraints = AxisConstraints::from_config(&make_test_config());

        // 3200 / 8 = 400 steps/mm
        assert!((constraints.steps_per_unit - 400.0).abs() < 1e-4);
        assert!(constraints.invert_direction);
    }

    #[test]
    fn test_rate_conversion() {
        let constraints = AxisConstraints::from_config(&make_test_config());

        // 5 mm/s * 400 = 2000 steps/s, 100 mm/s^2 * 400 = 40000 steps/s^2
        assert!((constraints.max_rate_steps_per_sec - 2000.0).abs() < 0.1);
        assert_eq!(constraints.max_acceleration_steps_per_sec2, 40000);
        assert!((constraints.steps_to_units(800) - 2.0).abs() < 1e-6);
    }
}
