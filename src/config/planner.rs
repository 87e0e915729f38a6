//! Planner tuning from TOML.

use serde::Deserialize;

use super::units::{MmPerSec, MmPerSecSquared};

/// Highest number of extruders the step channels are sized for.
pub const MAX_EXTRUDERS: u8 = 4;

/// Lookahead planner settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlannerConfig {
    /// Junction deviation in mm; larger values corner faster.
    #[serde(default = "default_junction_deviation")]
    pub junction_deviation: f32,

    /// Acceleration of printing moves (moves that extrude).
    #[serde(default = "default_acceleration")]
    pub acceleration: MmPerSecSquared,

    /// Acceleration of moves without extrusion.
    #[serde(default = "default_travel_acceleration")]
    pub travel_acceleration: MmPerSecSquared,

    /// Acceleration of extruder-only moves.
    #[serde(default = "default_retract_acceleration")]
    pub retract_acceleration: MmPerSecSquared,

    /// Lowest junction speed the planner will use, and the exit speed of the
    /// newest block.
    #[serde(default = "default_min_planner_speed")]
    pub min_planner_speed: MmPerSec,

    /// Floor applied to the requested feedrate of printing moves.
    #[serde(default)]
    pub min_feedrate: MmPerSec,

    /// Floor applied to the requested feedrate of travel moves.
    #[serde(default)]
    pub min_travel_feedrate: MmPerSec,

    /// Moves whose dominant axis has fewer steps are deferred into the next move.
    #[serde(default = "default_min_segment_steps")]
    pub min_segment_steps: u32,

    /// Number of extruders sharing the E axis settings.
    #[serde(default = "default_extruders")]
    pub extruders: u8,

    /// Linear advance factor per extruder, in mm of filament per mm/s of
    /// extrusion speed. Missing entries and zero disable the lead.
    #[serde(default)]
    pub advance_k: heapless::Vec<f32, { MAX_EXTRUDERS as usize }>,
}

fn default_junction_deviation() -> f32 {
    0.013
}

fn default_acceleration() -> MmPerSecSquared {
    MmPerSecSquared(1000.0)
}

fn default_travel_acceleration() -> MmPerSecSquared {
    MmPerSecSquared(1500.0)
}

fn default_retract_acceleration() -> MmPerSecSquared {
    MmPerSecSquared(3000.0)
}

fn default_min_planner_speed() -> MmPerSec {
    MmPerSec(0.05)
}

fn default_min_segment_steps() -> u32 {
    1
}

fn default_extruders() -> u8 {
    1
}

impl PlannerConfig {
    /// Linear advance factor of `extruder`, zero when not configured.
    pub fn advance_k(&self, extruder: u8) -> f32 {
        self.advance_k.get(extruder as usize).copied().unwrap_or(0.0)
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            junction_deviation: default_junction_deviation(),
            acceleration: default_acceleration(),
            travel_acceleration: default_travel_acceleration(),
            retract_acceleration: default_retract_acceleration(),
            min_planner_speed: default_min_planner_speed(),
            min_feedrate: MmPerSec(0.0),
            min_travel_feedrate: MmPerSec(0.0),
            min_segment_steps: default_min_segment_steps(),
            extruders: default_extruders(),
            advance_k: heapless::Vec::new(),
        }
    }
}
