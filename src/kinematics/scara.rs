//! Two-arm SCARA kinematics.
//!
//! Actuator A is the absolute shoulder angle, actuator B the absolute angle of
//! the outer arm (shoulder plus elbow), both in degrees. Z is a plain linear axis.

use libm::{atan2f, cosf, sinf, sqrtf};

use crate::config::{Axis, ScaraGeometry};
use crate::error::KinematicsError;

use super::{KinematicModel, Pose};

/// SCARA arm geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scara {
    inner: f32,
    outer: f32,
    offset_x: f32,
    offset_y: f32,
}

impl Scara {
    /// Build from configured arm lengths and shoulder offset.
    pub fn new(geometry: &ScaraGeometry) -> Self {
        Self {
            inner: geometry.inner_arm,
            outer: geometry.outer_arm,
            offset_x: geometry.offset_x,
            offset_y: geometry.offset_y,
        }
    }
}

impl KinematicModel for Scara {
    fn inverse(&self, pose: &Pose) -> Result<[f32; 3], KinematicsError> {
        let sx = pose.x - self.offset_x;
        let sy = pose.y - self.offset_y;
        let (l1, l2) = (self.inner, self.outer);

        let c2 = (sx * sx + sy * sy - l1 * l1 - l2 * l2) / (2.0 * l1 * l2);
        if !(-1.0..=1.0).contains(&c2) {
            return Err(KinematicsError::Unreachable {
                x: pose.x,
                y: pose.y,
                z: pose.z,
            });
        }
        let s2 = sqrtf(1.0 - c2 * c2);

        let sk1 = l1 + l2 * c2;
        let sk2 = l2 * s2;

        let theta = atan2f(sk1 * sy - sk2 * sx, sk1 * sx + sk2 * sy);
        let psi = atan2f(s2, c2);

        Ok([theta.to_degrees(), (theta + psi).to_degrees(), pose.z])
    }

    fn forward(&self, actuators: [f32; 3]) -> [f32; 3] {
        let a = actuators[0].to_radians();
        let b = actuators[1].to_radians();
        [
            self.inner * cosf(a) + self.outer * cosf(b) + self.offset_x,
            self.inner * sinf(a) + self.outer * sinf(b) + self.offset_y,
            actuators[2],
        ]
    }

    fn is_linear(&self) -> bool {
        false
    }

    fn home_actuators(&self, axis: Axis) -> [i8; 3] {
        super::cartesian::unit(axis)
    }

    fn babystep_pattern(&self, axis: Axis) -> [i8; 3] {
        match axis {
            Axis::Z => [0, 0, 1],
            _ => [0, 0, 0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scara() -> Scara {
        Scara::new(&ScaraGeometry {
            inner_arm: 150.0,
            outer_arm: 150.0,
            offset_x: -50.0,
            offset_y: -50.0,
            segments_per_second: 200.0,
        })
    }

    #[test]
    fn test_straight_arm_angles() {
        let k = scara();
        // Arm fully stretched along +X from the shoulder.
        let act = k.inverse(&Pose::new(250.0, -50.0, 0.0, 0.0)).unwrap();
        assert!(act[0].abs() < 0.05);
        assert!(act[1].abs() < 0.05);
    }

    #[test]
    fn test_forward_inverts_inverse() {
        let k = scara();
        for &(x, y) in &[(50.0, 50.0), (100.0, 20.0), (-20.0, 150.0), (0.0, 0.0)] {
            let act = k.inverse(&Pose::new(x, y, 3.0, 0.0)).unwrap();
            let [fx, fy, fz] = k.forward(act);
            assert!((fx - x).abs() < 0.01);
            assert!((fy - y).abs() < 0.01);
            assert_eq!(fz, 3.0);
        }
    }

    #[test]
    fn test_out_of_reach() {
        let result = scara().inverse(&Pose::new(400.0, 400.0, 0.0, 0.0));
        assert!(matches!(result, Err(KinematicsError::Unreachable { .. })));
    }
}
