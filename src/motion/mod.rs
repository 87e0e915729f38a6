//! Motion module for printer-motion.
//!
//! Provides the interrupt-side step generator, its rate tables, S-curve ramps,
//! linear advance and babystepping.

mod advance;
mod babystep;
mod executor;
mod profile;
pub mod scurve;
pub mod timing;

pub use advance::{AdvanceState, MAX_LEAD_STEPS_PER_TICK};
pub use babystep::Babystepper;
pub use executor::{HomingEvent, StepperEngine, TickEvent, TickOutcome};
pub use profile::{Direction, MotionPhase};
pub use timing::IntervalTable;
