//! Error types for printer-motion.
//!
//! Provides unified error handling across configuration, kinematics, planning and
//! the stepper outputs. Physical-safety faults are not errors: they halt motion
//! and are reported through [`Fault`].

use core::fmt;

use crate::config::Axis;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all printer-motion operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Target pose rejected by the kinematics layer
    Kinematics(KinematicsError),
    /// Move could not be admitted to the planner
    Planner(PlannerError),
    /// Stepper output error
    Motor(MotorError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// Invalid microstep value (must be power of 2: 1, 2, 4, 8, 16, 32, 64, 128, 256)
    InvalidMicrosteps(u16),
    /// Invalid gear ratio (must be > 0)
    InvalidGearRatio(f32),
    /// Invalid rotation distance (must be > 0)
    InvalidRotationDistance(f32),
    /// Invalid max feedrate (must be > 0)
    InvalidMaxFeedrate {
        /// Offending axis
        axis: Axis,
        /// Configured value
        value: f32,
    },
    /// Invalid max acceleration (must be > 0)
    InvalidMaxAcceleration {
        /// Offending axis
        axis: Axis,
        /// Configured value
        value: f32,
    },
    /// Invalid soft limits (min must be < max)
    InvalidSoftLimits {
        /// Minimum limit value
        min: f32,
        /// Maximum limit value
        max: f32,
    },
    /// Kinematic geometry constant is out of range
    InvalidGeometry(&'static str),
    /// CoreXY needs identical steps per unit on the A and B motors
    CoreStepsMismatch {
        /// Steps per unit of the A motor
        a: f32,
        /// Steps per unit of the B motor
        b: f32,
    },
    /// Junction deviation must be > 0
    InvalidJunctionDeviation(f32),
    /// Planner acceleration must be > 0
    InvalidAcceleration(f32),
    /// Timer or step frequency settings are inconsistent
    InvalidTiming(&'static str),
    /// Extruder count outside 1..=MAX_EXTRUDERS
    InvalidExtruderCount(u8),
    /// Linear advance factor must be finite and >= 0
    InvalidAdvanceK(f32),
    /// A required component was not supplied to the builder
    MissingComponent(&'static str),
    /// The step outputs provide fewer channels than the machine needs
    ChannelCount {
        /// Channels needed (three actuators plus one per extruder)
        required: usize,
        /// Channels provided
        available: usize,
    },
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Kinematics errors: the requested pose cannot be turned into actuator steps.
#[derive(Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// Pose lies outside the machine's reachable envelope
    Unreachable {
        /// Requested X
        x: f32,
        /// Requested Y
        y: f32,
        /// Requested Z
        z: f32,
    },
    /// Pose violates a soft limit configured with the reject policy
    OutsideSoftLimits {
        /// Axis whose limit was violated
        axis: Axis,
        /// Requested coordinate
        value: f32,
        /// Lower limit
        min: f32,
        /// Upper limit
        max: f32,
    },
}

/// Planner admission errors.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerError {
    /// The segment buffer has no free slot; retry once the stepper has drained a block
    BufferFull,
    /// Motion is halted by a fault and must be acknowledged first
    Halted,
    /// A homing move is queued or running
    HomingInProgress,
    /// Operation requires an idle motion system
    NotIdle,
    /// Extruder index is not configured
    InvalidExtruder(u8),
    /// Feedrate must be finite and > 0
    InvalidFeedrate(f32),
    /// The axis has no endstop configured
    NoEndstop(Axis),
    /// The kinematics cannot babystep this axis
    BabystepUnsupported(Axis),
    /// A homing move ended without reaching its endstop
    HomingFailed(Axis),
}

/// Stepper output errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorError {
    /// Pin operation failed
    PinError,
}

/// Latched reason for a halted motion system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// `emergency_stop()` was called (thermal fault, operator, host)
    EmergencyStop,
    /// An endstop triggered outside of a homing move
    EndstopHit(Axis),
    /// A STEP/DIR pin write failed inside the interrupt
    OutputFault,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Kinematics(e) => write!(f, "Kinematics error: {}", e),
            Error::Planner(e) => write!(f, "Planner error: {}", e),
            Error::Motor(e) => write!(f, "Motor error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::InvalidMicrosteps(v) => {
                write!(f, "Invalid microsteps: {}. Valid values: 1, 2, 4, 8, 16, 32, 64, 128, 256", v)
            }
            ConfigError::InvalidGearRatio(v) => write!(f, "Invalid gear ratio: {}. Must be > 0", v),
            ConfigError::InvalidRotationDistance(v) => {
                write!(f, "Invalid rotation distance: {}. Must be > 0", v)
            }
            ConfigError::InvalidMaxFeedrate { axis, value } => {
                write!(f, "Invalid max feedrate on {}: {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidMaxAcceleration { axis, value } => {
                write!(f, "Invalid max acceleration on {}: {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidSoftLimits { min, max } => {
                write!(f, "Invalid soft limits: min ({}) must be < max ({})", min, max)
            }
            ConfigError::InvalidGeometry(what) => write!(f, "Invalid kinematic geometry: {}", what),
            ConfigError::CoreStepsMismatch { a, b } => {
                write!(f, "CoreXY motors need equal steps per unit (A = {}, B = {})", a, b)
            }
            ConfigError::InvalidJunctionDeviation(v) => {
                write!(f, "Invalid junction deviation: {}. Must be > 0", v)
            }
            ConfigError::InvalidAcceleration(v) => {
                write!(f, "Invalid planner acceleration: {}. Must be > 0", v)
            }
            ConfigError::InvalidTiming(what) => write!(f, "Invalid stepper timing: {}", what),
            ConfigError::InvalidExtruderCount(n) => {
                write!(f, "Invalid extruder count: {}. Must be 1-{}", n, crate::config::MAX_EXTRUDERS)
            }
            ConfigError::InvalidAdvanceK(k) => write!(f, "Invalid advance_k: {}. Must be >= 0", k),
            ConfigError::MissingComponent(what) => write!(f, "Missing component: {}", what),
            ConfigError::ChannelCount { required, available } => {
                write!(f, "Need {} step channels, outputs provide {}", required, available)
            }
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KinematicsError::Unreachable { x, y, z } => {
                write!(f, "Pose ({}, {}, {}) is outside the reachable envelope", x, y, z)
            }
            KinematicsError::OutsideSoftLimits { axis, value, min, max } => {
                write!(f, "{} = {} exceeds soft limits [{}, {}]", axis, value, min, max)
            }
        }
    }
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::BufferFull => write!(f, "Segment buffer is full"),
            PlannerError::Halted => write!(f, "Motion halted by a fault; acknowledge before moving"),
            PlannerError::HomingInProgress => write!(f, "Homing move in progress"),
            PlannerError::NotIdle => write!(f, "Motion system is not idle"),
            PlannerError::InvalidExtruder(e) => write!(f, "Extruder {} is not configured", e),
            PlannerError::InvalidFeedrate(v) => write!(f, "Invalid feedrate: {}", v),
            PlannerError::NoEndstop(axis) => write!(f, "No endstop configured on {}", axis),
            PlannerError::BabystepUnsupported(axis) => {
                write!(f, "Babystepping {} is not supported by these kinematics", axis)
            }
            PlannerError::HomingFailed(axis) => write!(f, "Homing {} failed: endstop not reached", axis),
        }
    }
}

impl fmt::Display for MotorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorError::PinError => write!(f, "GPIO pin operation failed"),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::EmergencyStop => write!(f, "emergency stop"),
            Fault::EndstopHit(axis) => write!(f, "unexpected endstop hit on {}", axis),
            Fault::OutputFault => write!(f, "stepper output failure"),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<KinematicsError> for Error {
    fn from(e: KinematicsError) -> Self {
        Error::Kinematics(e)
    }
}

impl From<PlannerError> for Error {
    fn from(e: PlannerError) -> Self {
        Error::Planner(e)
    }
}

impl From<MotorError> for Error {
    fn from(e: MotorError) -> Self {
        Error::Motor(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for KinematicsError {}

#[cfg(feature = "std")]
impl std::error::Error for PlannerError {}

#[cfg(feature = "std")]
impl std::error::Error for MotorError {}
