//! Machine configuration - root configuration structure.

use serde::Deserialize;

use super::axis::{AxesConfig, Axis, AxisConfig};
use super::kinematics::KinematicsConfig;
use super::planner::PlannerConfig;
use super::stepper::{EndstopsConfig, StepperConfig};

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct MachineConfig {
    /// Kinematic family and geometry.
    #[serde(default)]
    pub kinematics: KinematicsConfig,

    /// Per-axis mechanics and limits.
    pub axes: AxesConfig,

    /// Lookahead planner tuning.
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Stepper interrupt timing.
    #[serde(default)]
    pub stepper: StepperConfig,

    /// Endstop sampling.
    #[serde(default)]
    pub endstops: EndstopsConfig,
}

impl MachineConfig {
    /// Get an axis configuration.
    pub fn axis(&self, axis: Axis) -> &AxisConfig {
        self.axes.get(axis)
    }

    /// Axes with an endstop configured.
    pub fn homeable_axes(&self) -> impl Iterator<Item = Axis> + '_ {
        self.axes
            .iter()
            .filter(|(_, cfg)| cfg.endstop.is_some())
            .map(|(axis, _)| axis)
    }
}
