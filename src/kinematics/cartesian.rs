//! Cartesian and CoreXY machines.

use crate::config::Axis;
use crate::error::KinematicsError;

use super::{KinematicModel, Pose};

/// Independent X/Y/Z actuators.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cartesian;

impl KinematicModel for Cartesian {
    fn inverse(&self, pose: &Pose) -> Result<[f32; 3], KinematicsError> {
        Ok([pose.x, pose.y, pose.z])
    }

    fn forward(&self, actuators: [f32; 3]) -> [f32; 3] {
        actuators
    }

    fn is_linear(&self) -> bool {
        true
    }

    fn home_actuators(&self, axis: Axis) -> [i8; 3] {
        unit(axis)
    }

    fn babystep_pattern(&self, axis: Axis) -> [i8; 3] {
        unit(axis)
    }
}

/// CoreXY: motor A drives X + Y, motor B drives X - Y.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoreXY;

impl CoreXY {
    /// Integer A/B/C step targets from quantised X/Y/Z steps.
    #[inline]
    pub fn combine(x: i32, y: i32, z: i32) -> [i32; 3] {
        [x.saturating_add(y), x.saturating_sub(y), z]
    }
}

impl KinematicModel for CoreXY {
    fn inverse(&self, pose: &Pose) -> Result<[f32; 3], KinematicsError> {
        Ok([pose.x + pose.y, pose.x - pose.y, pose.z])
    }

    fn forward(&self, actuators: [f32; 3]) -> [f32; 3] {
        let [a, b, c] = actuators;
        [(a + b) * 0.5, (a - b) * 0.5, c]
    }

    fn is_linear(&self) -> bool {
        true
    }

    fn home_actuators(&self, axis: Axis) -> [i8; 3] {
        match axis {
            Axis::X => [1, 1, 0],
            Axis::Y => [1, -1, 0],
            Axis::Z => [0, 0, 1],
            Axis::E => [0, 0, 0],
        }
    }

    fn babystep_pattern(&self, axis: Axis) -> [i8; 3] {
        self.home_actuators(axis)
    }

    fn endstop_motion(&self, delta_steps: [i32; 3]) -> [i8; 3] {
        let [a, b, c] = delta_steps;
        [sign(a + b), sign(a - b), sign(c)]
    }
}

pub(super) fn unit(axis: Axis) -> [i8; 3] {
    match axis {
        Axis::X => [1, 0, 0],
        Axis::Y => [0, 1, 0],
        Axis::Z => [0, 0, 1],
        Axis::E => [0, 0, 0],
    }
}

#[inline]
pub(super) fn sign(v: i32) -> i8 {
    v.signum() as i8
}
