//! Configuration module for printer-motion.
//!
//! Provides types for loading and validating machine configurations (axes,
//! kinematics, planner and stepper timing) from TOML files (with `std`
//! feature) or pre-built data.

mod axis;
#[cfg(test)]
pub(crate) mod fixtures;
mod kinematics;
mod limits;
mod mechanical;
mod planner;
mod stepper;
mod system;
pub mod units;
#[cfg(feature = "std")]
mod loader;
mod validation;

pub use axis::{AxesConfig, Axis, AxisConfig, EndstopConfig, EndstopSide};
pub use kinematics::{DeltaGeometry, KinematicsConfig, ScaraGeometry};
pub use limits::{LimitPolicy, SoftLimits};
pub use mechanical::AxisConstraints;
pub use planner::{PlannerConfig, MAX_EXTRUDERS};
pub use stepper::{EndstopsConfig, StepperConfig};
pub use system::MachineConfig;
pub use validation::validate_config;

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};

// Re-export unit types at config level
pub use units::{Microsteps, Millimeters, MmPerSec, MmPerSecSquared, Steps, UnitExt};
