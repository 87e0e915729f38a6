//! Per-axis soft limits.
//!
//! Limits are checked on the Cartesian target before kinematics run, so they
//! are expressed in machine units (mm, or degrees for SCARA arms).

use serde::Deserialize;

use super::axis::Axis;
use super::units::Millimeters;
use crate::error::KinematicsError;

/// What happens to a target outside the travel range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitPolicy {
    /// Refuse the move.
    #[default]
    Reject,
    /// Move to the nearest edge instead.
    Clamp,
}

/// Travel range of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SoftLimits {
    /// Lowest reachable coordinate.
    pub min: Millimeters,
    /// Highest reachable coordinate.
    pub max: Millimeters,
    /// Defaults to rejecting.
    #[serde(default)]
    pub policy: LimitPolicy,
}

impl SoftLimits {
    /// Range from `min` to `max`.
    pub fn new(min: Millimeters, max: Millimeters, policy: LimitPolicy) -> Self {
        Self { min, max, policy }
    }

    /// `false` for an empty or inverted range.
    pub fn is_valid(&self) -> bool {
        self.max.0 > self.min.0
    }

    /// Whether `position` lies inside the range, edges included.
    pub fn contains(&self, position: Millimeters) -> bool {
        (self.min.0..=self.max.0).contains(&position.0)
    }

    /// Target after the policy is applied; `None` means the move is refused.
    pub fn apply(&self, target: Millimeters) -> Option<Millimeters> {
        match self.policy {
            _ if self.contains(target) => Some(target),
            LimitPolicy::Clamp => Some(Millimeters(target.0.clamp(self.min.0, self.max.0))),
            LimitPolicy::Reject => None,
        }
    }

    /// Like [`apply`](Self::apply), reporting a refusal against `axis`.
    ///
    /// # Errors
    ///
    /// `KinematicsError::OutsideSoftLimits` when a reject policy is violated.
    pub fn enforce(&self, axis: Axis, value: f32) -> Result<f32, KinematicsError> {
        self.apply(Millimeters(value))
            .map(|limited| limited.0)
            .ok_or(KinematicsError::OutsideSoftLimits {
                axis,
                value,
                min: self.min.0,
                max: self.max.0,
            })
    }
}
