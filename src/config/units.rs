//! Unit types for physical quantities.
//!
//! Machine-space lengths, speeds and accelerations are kept apart from actuator
//! steps so that configuration values cannot be mixed up at call sites. The
//! planner works on raw `f32`/`i32` internally; these types live at the
//! configuration and API boundary.

use serde::Deserialize;

use crate::error::ConfigError;

macro_rules! float_unit {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub f32);

        impl $name {
            /// Wrap a raw value.
            #[inline]
            pub const fn new(value: f32) -> Self {
                Self(value)
            }

            /// Get the raw value.
            #[inline]
            pub const fn value(self) -> f32 {
                self.0
            }
        }
    };
}

float_unit!(
    /// Linear distance in millimetres (degrees for SCARA arm actuators).
    Millimeters
);

float_unit!(
    /// Linear speed in millimetres per second.
    MmPerSec
);

float_unit!(
    /// Linear acceleration in millimetres per second squared.
    MmPerSecSquared
);

impl MmPerSec {
    /// Convert a G-code style feedrate (mm/min).
    #[inline]
    pub fn from_mm_per_min(value: f32) -> Self {
        Self(value / 60.0)
    }
}

/// Actuator position in steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Steps(pub i32);

impl Steps {
    /// Convert to millimetres using a steps-per-unit ratio.
    #[inline]
    pub fn to_millimeters(self, steps_per_unit: f32) -> Millimeters {
        Millimeters(self.0 as f32 / steps_per_unit)
    }

    /// Create from millimetres, rounding to the nearest step.
    #[inline]
    pub fn from_millimeters(mm: Millimeters, steps_per_unit: f32) -> Self {
        Self(libm::roundf(mm.0 * steps_per_unit) as i32)
    }
}

/// Microstep divisor, a power of two from 1 to 256.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Microsteps(u16);

impl Microsteps {
    /// Sixteenth step, the usual default on printer boards.
    pub const SIXTEENTH: Self = Self(16);

    /// Create a validated divisor.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidMicrosteps` if the value is not a power of
    /// two in `1..=256`.
    pub fn new(value: u16) -> Result<Self, ConfigError> {
        if value.is_power_of_two() && value <= 256 {
            Ok(Self(value))
        } else {
            Err(ConfigError::InvalidMicrosteps(value))
        }
    }

    /// Get the raw divisor value.
    #[inline]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl Default for Microsteps {
    fn default() -> Self {
        Self::SIXTEENTH
    }
}

impl<'de> Deserialize<'de> for Microsteps {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use core::fmt::Write;
        let value = u16::deserialize(deserializer)?;
        Microsteps::new(value).map_err(|e| {
            let mut buf = heapless::String::<128>::new();
            let _ = write!(buf, "{}", e);
            serde::de::Error::custom(buf.as_str())
        })
    }
}

/// Shorthand constructors for unit types.
pub trait UnitExt {
    /// As millimetres.
    fn mm(self) -> Millimeters;
    /// As millimetres per second.
    fn mm_per_sec(self) -> MmPerSec;
    /// As millimetres per second squared.
    fn mm_per_sec_squared(self) -> MmPerSecSquared;
}

impl UnitExt for f32 {
    #[inline]
    fn mm(self) -> Millimeters {
        Millimeters(self)
    }

    #[inline]
    fn mm_per_sec(self) -> MmPerSec {
        MmPerSec(self)
    }

    #[inline]
    fn mm_per_sec_squared(self) -> MmPerSecSquared {
        MmPerSecSquared(self)
    }
}
