//! Stepper interrupt timing and endstop sampling from TOML.

use serde::Deserialize;

/// Timer and pulse settings of the stepper interrupt.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StepperConfig {
    /// Step timer frequency in ticks per second.
    #[serde(default = "default_timer_frequency")]
    pub timer_frequency: u32,

    /// Highest interrupt rate; above it several steps are issued per interrupt.
    #[serde(default = "default_max_step_frequency")]
    pub max_step_frequency: u32,

    /// Upper bound on steps issued per interrupt.
    #[serde(default = "default_max_multistep")]
    pub max_multistep: u8,

    /// Lowest step rate in steps/s; keeps the timer interval in range.
    #[serde(default = "default_min_step_rate")]
    pub min_step_rate: u32,

    /// Timer ticks to wait after a DIR change before the first STEP.
    #[serde(default)]
    pub direction_delay_ticks: u32,

    /// STEP pulse high time in nanoseconds.
    #[serde(default = "default_pulse_width_ns")]
    pub pulse_width_ns: u32,

    /// Shape the acceleration ramps as S-curves instead of straight lines.
    #[serde(default)]
    pub s_curve: bool,
}

fn default_timer_frequency() -> u32 {
    2_000_000
}

fn default_max_step_frequency() -> u32 {
    40_000
}

fn default_max_multistep() -> u8 {
    128
}

fn default_min_step_rate() -> u32 {
    120
}

fn default_pulse_width_ns() -> u32 {
    2000
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            timer_frequency: default_timer_frequency(),
            max_step_frequency: default_max_step_frequency(),
            max_multistep: default_max_multistep(),
            min_step_rate: default_min_step_rate(),
            direction_delay_ticks: 0,
            pulse_width_ns: default_pulse_width_ns(),
            s_curve: false,
        }
    }
}

/// Endstop sampling policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EndstopsConfig {
    /// Watch endstops during ordinary moves and halt on an unexpected hit.
    #[serde(default = "default_check_during_moves")]
    pub check_during_moves: bool,

    /// Consecutive triggered samples required before a hit is accepted.
    #[serde(default = "default_noise_threshold")]
    pub noise_threshold: u8,
}

fn default_check_during_moves() -> bool {
    true
}

fn default_noise_threshold() -> u8 {
    1
}

impl Default for EndstopsConfig {
    fn default() -> Self {
        Self {
            check_during_moves: default_check_during_moves(),
            noise_threshold: default_noise_threshold(),
        }
    }
}
