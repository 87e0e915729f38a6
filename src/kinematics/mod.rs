//! Kinematic transforms between machine space and actuator space.
//!
//! Machine space is the Cartesian pose the command layer talks about. Actuator
//! space is what the motors see: belt positions for CoreXY, carriage heights for
//! a delta, arm angles for a SCARA. [`StepMapper`] sits on top and turns poses
//! into integer step targets, which is the only form the planner accepts.

mod cartesian;
mod delta;
mod scara;

pub use cartesian::{Cartesian, CoreXY};
pub use delta::Delta;
pub use scara::Scara;

use libm::{roundf, sqrtf};

use crate::config::{Axis, AxisConstraints, KinematicsConfig};
use crate::error::KinematicsError;

/// A pose in machine space (mm; E in mm of filament).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
    /// Z coordinate.
    pub z: f32,
    /// Extruder position.
    pub e: f32,
}

impl Pose {
    /// Create a pose.
    pub const fn new(x: f32, y: f32, z: f32, e: f32) -> Self {
        Self { x, y, z, e }
    }

    /// Coordinate of one axis.
    pub fn get(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
            Axis::E => self.e,
        }
    }

    /// Set the coordinate of one axis.
    pub fn set(&mut self, axis: Axis, value: f32) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
            Axis::E => self.e = value,
        }
    }

    /// Straight-line XYZ distance to another pose.
    pub fn distance_xyz(&self, other: &Pose) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        sqrtf(dx * dx + dy * dy + dz * dz)
    }

    /// Linear interpolation toward `other` (`t` in 0..=1).
    pub fn lerp(&self, other: &Pose, t: f32) -> Pose {
        Pose {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
            e: self.e + (other.e - self.e) * t,
        }
    }
}

/// A machine geometry: pure functions of configuration constants.
pub trait KinematicModel {
    /// Actuator coordinates (actuator units) for a Cartesian pose.
    ///
    /// # Errors
    ///
    /// Returns `KinematicsError::Unreachable` outside the working envelope.
    fn inverse(&self, pose: &Pose) -> Result<[f32; 3], KinematicsError>;

    /// Cartesian XYZ for actuator coordinates.
    fn forward(&self, actuators: [f32; 3]) -> [f32; 3];

    /// Whether actuator coordinates are a linear map of X/Y/Z.
    fn is_linear(&self) -> bool;

    /// Actuator directions driven when homing `axis`.
    fn home_actuators(&self, axis: Axis) -> [i8; 3];

    /// Actuators pulsed, and their directions, for one babystep on `axis`.
    /// All zeros means the axis cannot be babystepped.
    fn babystep_pattern(&self, axis: Axis) -> [i8; 3];

    /// Direction each endstop axis travels for an actuator step delta.
    fn endstop_motion(&self, delta_steps: [i32; 3]) -> [i8; 3] {
        delta_steps.map(cartesian::sign)
    }
}

/// Kinematics selected from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Kinematics {
    /// Cartesian machine.
    Cartesian(Cartesian),
    /// CoreXY machine.
    CoreXY(CoreXY),
    /// Linear delta.
    Delta(Delta),
    /// SCARA arm.
    Scara(Scara),
}

impl Kinematics {
    /// Build from the `[kinematics]` table.
    pub fn from_config(config: &KinematicsConfig) -> Self {
        match config {
            KinematicsConfig::Cartesian => Kinematics::Cartesian(Cartesian),
            KinematicsConfig::CoreXy => Kinematics::CoreXY(CoreXY),
            KinematicsConfig::Delta(geometry) => Kinematics::Delta(Delta::new(geometry)),
            KinematicsConfig::Scara(geometry) => Kinematics::Scara(Scara::new(geometry)),
        }
    }

    fn model(&self) -> &dyn KinematicModel {
        match self {
            Kinematics::Cartesian(k) => k,
            Kinematics::CoreXY(k) => k,
            Kinematics::Delta(k) => k,
            Kinematics::Scara(k) => k,
        }
    }
}

impl KinematicModel for Kinematics {
    fn inverse(&self, pose: &Pose) -> Result<[f32; 3], KinematicsError> {
        self.model().inverse(pose)
    }

    fn forward(&self, actuators: [f32; 3]) -> [f32; 3] {
        self.model().forward(actuators)
    }

    fn is_linear(&self) -> bool {
        self.model().is_linear()
    }

    fn home_actuators(&self, axis: Axis) -> [i8; 3] {
        self.model().home_actuators(axis)
    }

    fn babystep_pattern(&self, axis: Axis) -> [i8; 3] {
        self.model().babystep_pattern(axis)
    }

    fn endstop_motion(&self, delta_steps: [i32; 3]) -> [i8; 3] {
        self.model().endstop_motion(delta_steps)
    }
}

/// Turns poses into integer actuator step targets.
///
/// Linear machines quantise each Cartesian axis first and then mix in integer
/// space, so CoreXY targets are exact. Nonlinear machines run the float inverse
/// and round against the previous target, keeping the fractional remainder per
/// actuator so it is folded into the next segment instead of being lost.
#[derive(Debug, Clone)]
pub struct StepMapper {
    kinematics: Kinematics,
    steps_per_unit: [f32; 4],
    residual: [f32; 3],
}

impl StepMapper {
    /// Create a mapper for the given geometry and per-axis step ratios.
    pub fn new(kinematics: Kinematics, constraints: &[AxisConstraints; 4]) -> Self {
        Self {
            kinematics,
            steps_per_unit: core::array::from_fn(|i| constraints[i].steps_per_unit),
            residual: [0.0; 3],
        }
    }

    /// The kinematics in use.
    #[inline]
    pub fn kinematics(&self) -> &Kinematics {
        &self.kinematics
    }

    /// Steps per unit of an axis.
    #[inline]
    pub fn steps_per_unit(&self, axis: Axis) -> f32 {
        self.steps_per_unit[axis.index()]
    }

    /// Fractional steps carried by each actuator (always within +-0.5).
    #[inline]
    pub fn residual(&self) -> [f32; 3] {
        self.residual
    }

    /// Step targets for `pose`, given the previously planned targets.
    ///
    /// # Errors
    ///
    /// Returns `KinematicsError::Unreachable` outside the working envelope.
    pub fn map(&mut self, pose: &Pose, previous: &[i32; 4]) -> Result<[i32; 4], KinematicsError> {
        let mut target = [0i32; 4];
        let spu = self.steps_per_unit;

        match self.kinematics {
            Kinematics::Cartesian(_) => {
                target[0] = roundf(pose.x * spu[0]) as i32;
                target[1] = roundf(pose.y * spu[1]) as i32;
                target[2] = roundf(pose.z * spu[2]) as i32;
            }
            Kinematics::CoreXY(_) => {
                let sx = roundf(pose.x * spu[0]) as i32;
                let sy = roundf(pose.y * spu[1]) as i32;
                let sz = roundf(pose.z * spu[2]) as i32;
                target[..3].copy_from_slice(&CoreXY::combine(sx, sy, sz));
            }
            Kinematics::Delta(_) | Kinematics::Scara(_) => {
                let actuators = self.kinematics.inverse(pose)?;
                for i in 0..3 {
                    // The previous target already absorbed earlier rounding, so the
                    // wanted delta carries the old residual with it.
                    let wanted = actuators[i] * spu[i] - previous[i] as f32;
                    let whole = roundf(wanted) as i32;
                    self.residual[i] = wanted - whole as f32;
                    target[i] = previous[i].saturating_add(whole);
                }
            }
        }

        target[3] = roundf(pose.e * spu[3]) as i32;
        Ok(target)
    }

    /// Cartesian pose of an actuator step position.
    pub fn pose_of(&self, steps: &[i32; 4]) -> Pose {
        let [x, y, z] = self.kinematics.forward(self.actuator_units(steps));
        Pose::new(x, y, z, steps[3] as f32 / self.steps_per_unit[3])
    }

    /// Actuator coordinates (actuator units) of a step position.
    pub fn actuator_units(&self, steps: &[i32; 4]) -> [f32; 3] {
        core::array::from_fn(|i| steps[i] as f32 / self.steps_per_unit[i])
    }

    /// Step position for actuator coordinates, rounding to the nearest step.
    pub fn steps_of_actuators(&self, actuators: [f32; 3]) -> [i32; 3] {
        core::array::from_fn(|i| roundf(actuators[i] * self.steps_per_unit[i]) as i32)
    }

    /// Forget carried residuals after the position was rewritten.
    pub fn reset_residual(&mut self) {
        self.residual = [0.0; 3];
    }

    /// Number of sub-segments for a straight move of `duration_s` seconds.
    ///
    /// Always 1 for linear machines.
    pub fn segments_for(&self, config: &KinematicsConfig, duration_s: f32) -> u32 {
        let per_second = match config {
            KinematicsConfig::Delta(g) => g.segments_per_second,
            KinematicsConfig::Scara(g) => g.segments_per_second,
            KinematicsConfig::Cartesian | KinematicsConfig::CoreXy => return 1,
        };
        let segments = libm::ceilf(duration_s * per_second);
        if segments < 1.0 {
            1
        } else {
            segments as u32
        }
    }
}
