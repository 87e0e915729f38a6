//! # printer-motion
//!
//! Lookahead motion planning and interrupt-driven step generation for 3D
//! printer firmware, with embedded-hal 1.0 support.
//!
//! ## Features
//!
//! - **Configuration-driven**: Define axes, kinematics and timing in TOML files
//! - **Kinematics**: Cartesian, CoreXY, linear delta and SCARA
//! - **Lookahead planner**: Junction-deviation cornering with reverse/forward passes
//! - **Tick-driven stepper engine**: Bresenham stepping, trapezoid ramps, multi-stepping
//! - **Homing, babystepping, quick stop and emergency stop**
//! - **no_std compatible**: Core library works without standard library
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use printer_motion::{Axis, MotionContextBuilder, MmPerSec, Pose};
//!
//! let config = printer_motion::load_config("printer.toml")?;
//!
//! let mut motion = MotionContextBuilder::<_, _, _, 16>::new()
//!     .config(config)
//!     .outputs(pins)
//!     .timer(step_timer)
//!     .endstops(switches)
//!     .build()?;
//!
//! motion.home(Axis::X)?;
//! motion.plan_move(Pose::new(100.0, 50.0, 0.2, 0.0), MmPerSec(120.0), |_| {})?;
//!
//! // From the timer interrupt:
//! motion.on_timer_interrupt();
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O and TOML parsing
//! - `alloc`: Enables heap allocation for no_std with allocator
//! - `defmt`: Enables defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

#[cfg(feature = "alloc")]
extern crate alloc;

// Logging macros; must come before the modules that use them.
#[macro_use]
mod fmt;

// Core modules
pub mod config;
pub mod endstop;
pub mod error;
pub mod kinematics;
pub mod machine;
pub mod motion;
pub mod motor;
pub mod planner;

// Re-exports for ergonomic API
pub use config::{validate_config, Axis, KinematicsConfig, MachineConfig};
pub use endstop::{EndstopInputs, EndstopPins};
pub use error::{Error, Fault, Result};
pub use kinematics::{KinematicModel, Kinematics, Pose};
pub use machine::{HomingStatus, MotionContext, MotionContextBuilder, MotionStatus, SharedMotion};
pub use motion::{Direction, MotionPhase, StepperEngine, TickEvent, TickOutcome};
pub use motor::{PinBank, StepOutputs, StepTimer, StepperDriver};
pub use planner::{Block, Planner, SegmentBuffer};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};

// Unit types
pub use config::units::{Microsteps, Millimeters, MmPerSec, MmPerSecSquared, Steps};
