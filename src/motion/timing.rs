//! Step rate to timer interval conversion.
//!
//! The interrupt must not divide, so `timer_frequency / rate` is read from two
//! precomputed tables and linearly interpolated. Below 2048 steps/s the slow
//! table has an entry every 8 steps/s; above it the fast table has one every
//! 256 steps/s.

use crate::config::StepperConfig;

const TABLE_LEN: usize = 257;
const SLOW_SHIFT: u32 = 3;
const FAST_SHIFT: u32 = 8;
const SLOW_LIMIT: u32 = 2048;
/// Highest step rate the tables cover.
pub const MAX_RATE: u32 = 65_535;

/// Precomputed rate-to-interval lookup with multi-stepping.
#[derive(Debug, Clone)]
pub struct IntervalTable {
    slow: [u32; TABLE_LEN],
    fast: [u32; TABLE_LEN],
    max_step_frequency: u32,
    max_multistep: u8,
    min_step_rate: u32,
}

impl IntervalTable {
    /// Build the tables for a timer frequency.
    pub fn new(config: &StepperConfig) -> Self {
        let timer = config.timer_frequency;
        let slow = core::array::from_fn(|i| timer / ((i as u32) << SLOW_SHIFT).max(1));
        let fast = core::array::from_fn(|i| timer / ((i as u32) << FAST_SHIFT).max(1));
        Self {
            slow,
            fast,
            max_step_frequency: config.max_step_frequency,
            max_multistep: config.max_multistep.max(1),
            min_step_rate: config.min_step_rate.max(1),
        }
    }

    /// Timer ticks between steps at `rate` steps/s, with no multi-stepping.
    pub fn lookup(&self, rate: u32) -> u32 {
        let rate = rate.clamp(self.min_step_rate, MAX_RATE);
        let (table, shift) = if rate < SLOW_LIMIT {
            (&self.slow, SLOW_SHIFT)
        } else {
            (&self.fast, FAST_SHIFT)
        };

        let index = (rate >> shift) as usize;
        let fraction = rate & ((1 << shift) - 1);
        let base = table[index];
        let gain = base - table[index + 1];
        (base - ((gain * fraction) >> shift)).max(1)
    }

    /// Interval and steps per interrupt for `rate` steps/s.
    ///
    /// Rates above the maximum interrupt frequency are halved while the step
    /// count per interrupt doubles, up to the configured limit.
    pub fn interval(&self, rate: u32) -> (u32, u8) {
        let mut rate = rate;
        let mut loops = 1u8;
        while rate > self.max_step_frequency && loops < self.max_multistep {
            rate >>= 1;
            loops <<= 1;
        }
        (self.lookup(rate), loops)
    }

    /// Slowest interval the table produces.
    #[inline]
    pub fn slowest(&self) -> u32 {
        self.lookup(self.min_step_rate)
    }
}
