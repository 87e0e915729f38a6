//! Machine geometry from TOML.

use serde::Deserialize;

/// Kinematic family and geometry constants, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KinematicsConfig {
    /// Independent X/Y/Z actuators.
    #[default]
    Cartesian,
    /// Two belts driving X and Y together (A = X + Y, B = X - Y).
    CoreXy,
    /// Linear delta with three vertical towers.
    Delta(DeltaGeometry),
    /// Two-arm SCARA with angular actuators.
    Scara(ScaraGeometry),
}

impl KinematicsConfig {
    /// Whether the inverse transform is a linear map of the Cartesian axes.
    pub fn is_linear(&self) -> bool {
        matches!(self, KinematicsConfig::Cartesian | KinematicsConfig::CoreXy)
    }
}

/// Linear delta geometry.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DeltaGeometry {
    /// Length of the diagonal rods, pivot to pivot.
    pub diagonal_rod: f32,

    /// Horizontal distance from the effector centre to each tower with the
    /// effector at the origin.
    pub radius: f32,

    /// Largest XY radius that may be commanded.
    pub printable_radius: f32,

    /// Sub-segments per second of motion for straight-line interpolation.
    #[serde(default = "default_segments_per_second")]
    pub segments_per_second: f32,
}

/// SCARA arm geometry.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScaraGeometry {
    /// Shoulder to elbow length.
    pub inner_arm: f32,

    /// Elbow to nozzle length.
    pub outer_arm: f32,

    /// X position of the shoulder in machine coordinates.
    #[serde(default)]
    pub offset_x: f32,

    /// Y position of the shoulder in machine coordinates.
    #[serde(default)]
    pub offset_y: f32,

    /// Sub-segments per second of motion for straight-line interpolation.
    #[serde(default = "default_segments_per_second")]
    pub segments_per_second: f32,
}

fn default_segments_per_second() -> f32 {
    200.0
}
