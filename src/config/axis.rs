//! Per-axis configuration from TOML.

use core::fmt;

use serde::Deserialize;

use super::limits::SoftLimits;
use super::units::{Microsteps, Millimeters, MmPerSec, MmPerSecSquared};

/// Logical machine axis.
///
/// For Cartesian machines the X/Y/Z axes are also the actuators. For the other
/// kinematics X/Y/Z name the first three actuator channels (A/B/C towers, arms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    /// X axis (actuator A)
    X,
    /// Y axis (actuator B)
    Y,
    /// Z axis (actuator C)
    Z,
    /// Extruder
    E,
}

impl Axis {
    /// All axes in actuator-channel order.
    pub const ALL: [Axis; 4] = [Axis::X, Axis::Y, Axis::Z, Axis::E];

    /// The three positioning axes.
    pub const MOTION: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Array index of this axis.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Axis for an array index, if in range.
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Axis::X),
            1 => Some(Axis::Y),
            2 => Some(Axis::Z),
            3 => Some(Axis::E),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
            Axis::E => "E",
        };
        f.write_str(name)
    }
}

/// Which end of travel an endstop sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndstopSide {
    /// Endstop at the minimum end; homing moves in the negative direction.
    #[default]
    Min,
    /// Endstop at the maximum end; homing moves in the positive direction.
    Max,
}

/// Endstop and homing parameters for one axis.
#[derive(Debug, Clone, Deserialize)]
pub struct EndstopConfig {
    /// End of travel the switch is mounted on.
    #[serde(default)]
    pub side: EndstopSide,

    /// Switch reads low when triggered.
    #[serde(default)]
    pub inverted: bool,

    /// Axis coordinate assigned when the switch triggers.
    #[serde(default)]
    pub home_position: Millimeters,

    /// Feedrate of the homing move.
    pub homing_feedrate: MmPerSec,

    /// Longest distance the axis can travel; the homing move covers 1.5x this.
    pub max_travel: Millimeters,
}

impl EndstopConfig {
    /// Sign of the homing direction (-1 toward min, +1 toward max).
    #[inline]
    pub fn direction_sign(&self) -> f32 {
        match self.side {
            EndstopSide::Min => -1.0,
            EndstopSide::Max => 1.0,
        }
    }
}

/// Complete axis configuration from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct AxisConfig {
    /// Full steps per motor rotation (200 for 1.8 degree motors).
    #[serde(default = "default_steps_per_rotation")]
    pub steps_per_rotation: u16,

    /// Microstep setting (1, 2, 4, 8, 16, 32, etc.).
    #[serde(default)]
    pub microsteps: Microsteps,

    /// Travel per motor rotation in axis units (belt pitch x pulley teeth, lead).
    pub rotation_distance: f32,

    /// Gear ratio (output:input, e.g. 3.0 means 3:1 reduction).
    #[serde(default = "default_gear_ratio")]
    pub gear_ratio: f32,

    /// Maximum speed in units per second.
    pub max_feedrate: MmPerSec,

    /// Maximum acceleration in units per second squared.
    pub max_acceleration: MmPerSecSquared,

    /// Invert direction pin logic.
    #[serde(default)]
    pub invert_direction: bool,

    /// Optional soft limits.
    #[serde(default)]
    pub limits: Option<SoftLimits>,

    /// Optional endstop.
    #[serde(default)]
    pub endstop: Option<EndstopConfig>,
}

fn default_steps_per_rotation() -> u16 {
    200
}

fn default_gear_ratio() -> f32 {
    1.0
}

impl AxisConfig {
    /// Microsteps per motor rotation, including gearing.
    pub fn steps_per_rotation_total(&self) -> f32 {
        self.steps_per_rotation as f32 * self.microsteps.value() as f32 * self.gear_ratio
    }

    /// Steps per axis unit (steps/mm, or steps/degree for rotary arms).
    pub fn steps_per_unit(&self) -> f32 {
        self.steps_per_rotation_total() / self.rotation_distance
    }
}

/// The four axis tables of a machine.
#[derive(Debug, Clone, Deserialize)]
pub struct AxesConfig {
    /// X axis / actuator A.
    pub x: AxisConfig,
    /// Y axis / actuator B.
    pub y: AxisConfig,
    /// Z axis / actuator C.
    pub z: AxisConfig,
    /// Extruder axis, shared by every configured extruder.
    pub e: AxisConfig,
}

impl AxesConfig {
    /// Configuration of one axis.
    pub fn get(&self, axis: Axis) -> &AxisConfig {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
            Axis::E => &self.e,
        }
    }

    /// Iterate `(axis, config)` pairs in channel order.
    pub fn iter(&self) -> impl Iterator<Item = (Axis, &AxisConfig)> {
        Axis::ALL.into_iter().map(move |axis| (axis, self.get(axis)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn belt_axis() -> AxisConfig {
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
    fn test_steps_per_unit() {
        // 200 * 16 / 40 = 80 steps/mm
        assert!((belt_axis().steps_per_unit() - 80.0).abs() < 1e-6);
    }

    #[test]
    fn test_geared_extruder() {
        let mut e = belt_axis();
        e.rotation_distance = 33.5;
        e.gear_ratio = 3.0;
        // 200 * 16 * 3 / 33.5
        assert!((e.steps_per_unit() - 286.567).abs() < 0.01);
    }

    #[test]
    fn test_axis_index_roundtrip() {
        for axis in Axis::ALL {
            assert_eq!(Axis::from_index(axis.index()), Some(axis));
        }
        assert_eq!(Axis::from_index(4), None);
    }
}
