//! Linear delta kinematics.
//!
//! Three carriages ride vertical towers placed at 210, 330 and 90 degrees on a
//! circle of `radius` around the effector origin. Each carriage is joined to the
//! effector by a pair of diagonal rods of length `diagonal_rod`.

use libm::{cosf, sinf, sqrtf};

use crate::config::{Axis, DeltaGeometry};
use crate::error::KinematicsError;

use super::{KinematicModel, Pose};

const TOWER_ANGLES_DEG: [f32; 3] = [210.0, 330.0, 90.0];

/// Delta geometry with precomputed tower positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delta {
    rod_sq: f32,
    printable_radius_sq: f32,
    tower_x: [f32; 3],
    tower_y: [f32; 3],
}

impl Delta {
    /// Precompute tower positions from the configured geometry.
    pub fn new(geometry: &DeltaGeometry) -> Self {
        let mut tower_x = [0.0; 3];
        let mut tower_y = [0.0; 3];
        for (i, angle) in TOWER_ANGLES_DEG.iter().enumerate() {
            let rad = angle.to_radians();
            tower_x[i] = geometry.radius * cosf(rad);
            tower_y[i] = geometry.radius * sinf(rad);
        }

        Self {
            rod_sq: geometry.diagonal_rod * geometry.diagonal_rod,
            printable_radius_sq: geometry.printable_radius * geometry.printable_radius,
            tower_x,
            tower_y,
        }
    }

    /// Carriage height above the effector when it sits at the origin.
    pub fn carriage_offset_at_center(&self) -> f32 {
        let r_sq = self.tower_x[0] * self.tower_x[0] + self.tower_y[0] * self.tower_y[0];
        sqrtf(self.rod_sq - r_sq)
    }
}

impl KinematicModel for Delta {
    fn inverse(&self, pose: &Pose) -> Result<[f32; 3], KinematicsError> {
        let unreachable = KinematicsError::Unreachable {
            x: pose.x,
            y: pose.y,
            z: pose.z,
        };

        if pose.x * pose.x + pose.y * pose.y > self.printable_radius_sq {
            return Err(unreachable);
        }

        let mut carriages = [0.0; 3];
        for (i, carriage) in carriages.iter_mut().enumerate() {
            let dx = self.tower_x[i] - pose.x;
            let dy = self.tower_y[i] - pose.y;
            let h = self.rod_sq - dx * dx - dy * dy;
            if h < 0.0 {
                return Err(unreachable);
            }
            *carriage = pose.z + sqrtf(h);
        }
        Ok(carriages)
    }

    /// Trilateration of the three rod spheres; picks the solution below the carriages.
    fn forward(&self, actuators: [f32; 3]) -> [f32; 3] {
        let p1 = [self.tower_x[0], self.tower_y[0], actuators[0]];
        let p2 = [self.tower_x[1], self.tower_y[1], actuators[1]];
        let p3 = [self.tower_x[2], self.tower_y[2], actuators[2]];

        let p12 = sub(p2, p1);
        let d = norm(p12);
        let ex = scale(p12, 1.0 / d);

        let p13 = sub(p3, p1);
        let i = dot(ex, p13);
        let ey_raw = sub(p13, scale(ex, i));
        let j = norm(ey_raw);
        let ey = scale(ey_raw, 1.0 / j);

        let ez = cross(ex, ey);

        // Equal rod lengths make the sphere equations collapse.
        let x_new = d * 0.5;
        let y_new = ((i * i + j * j) * 0.5 - i * x_new) / j;
        let z_sq = self.rod_sq - x_new * x_new - y_new * y_new;
        let z_new = sqrtf(z_sq.max(0.0));

        core::array::from_fn(|k| p1[k] + ex[k] * x_new + ey[k] * y_new - ez[k] * z_new)
    }

    fn is_linear(&self) -> bool {
        false
    }

    fn home_actuators(&self, axis: Axis) -> [i8; 3] {
        super::cartesian::unit(axis)
    }

    fn babystep_pattern(&self, axis: Axis) -> [i8; 3] {
        match axis {
            Axis::Z => [1, 1, 1],
            _ => [0, 0, 0],
        }
    }
}

#[inline]
fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn scale(a: [f32; 3], s: f32) -> [f32; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

#[inline]
fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
fn norm(a: [f32; 3]) -> f32 {
    sqrtf(dot(a, a))
}

#[inline]
fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}
