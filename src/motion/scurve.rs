//! Fifth-order Bezier speed ramps.
//!
//! With S-curve acceleration the rate follows
//! `v0 + (v1 - v0) * (6t^5 - 15t^4 + 10t^3)` over the ramp's duration instead
//! of a straight line. The curve starts and ends with zero acceleration and
//! covers the same distance as a linear ramp of the same duration, so the
//! trapezoid's step boundaries stay valid.
//!
//! Evaluation is integer only: the normalized time is a 32-bit fraction and
//! the polynomial terms are summed in 24-bit fixed point. Rates are capped at
//! 2^23 steps/s (65535 interrupts/s times at most 128 steps each), which keeps
//! every product inside an `i64`.

/// Fraction bits of the polynomial terms.
const TERM_SHIFT: u32 = 24;

/// Fastest rate a ramp can reach.
const MAX_RAMP_RATE: u32 = 1 << 23;

/// Precomputed coefficients of one ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BezierRamp {
    a: i64,
    b: i64,
    c: i64,
    f: i64,
    /// Normalized time per tick, `2^32 / duration`.
    av: u32,
    duration: u32,
    v0: u32,
    v1: u32,
}

impl BezierRamp {
    /// Ramp from `v0` to `v1` steps/s lasting `duration` timer ticks.
    pub fn new(v0: u32, v1: u32, duration: u32) -> Self {
        let (v0, v1) = (v0.min(MAX_RAMP_RATE), v1.min(MAX_RAMP_RATE));
        let delta = v1 as i64 - v0 as i64;
        let av = if duration <= 1 {
            u32::MAX
        } else {
            ((1u64 << 32) / duration as u64).min(u32::MAX as u64) as u32
        };
        Self {
            a: 6 * delta,
            b: -15 * delta,
            c: 10 * delta,
            f: (v0 as i64) << TERM_SHIFT,
            av,
            duration,
            v0,
            v1,
        }
    }

    /// Ramp between two rates at `acceleration` steps/s², timed for a
    /// `timer_frequency` tick clock.
    pub fn between(v0: u32, v1: u32, acceleration: u32, timer_frequency: u32) -> Self {
        let span = v0.abs_diff(v1) as u64 * timer_frequency as u64;
        let duration = (span / acceleration.max(1) as u64).min(u32::MAX as u64) as u32;
        Self::new(v0, v1, duration)
    }

    /// Rate after `elapsed` ticks; holds `v1` once the ramp is over.
    pub fn eval(&self, elapsed: u32) -> u32 {
        if elapsed >= self.duration {
            return self.v1;
        }
        let t = (self.av as u64 * elapsed as u64).min(u32::MAX as u64);

        // Powers of t as 32-bit fractions.
        let mut f = (t * t) >> 32;
        f = (f * t) >> 32;
        let mut acc = self.f + (f >> (32 - TERM_SHIFT)) as i64 * self.c;
        f = (f * t) >> 32;
        acc += (f >> (32 - TERM_SHIFT)) as i64 * self.b;
        f = (f * t) >> 32;
        acc += (f >> (32 - TERM_SHIFT)) as i64 * self.a;

        let rate = (acc >> TERM_SHIFT).max(0) as u32;
        rate.clamp(self.v0.min(self.v1), self.v0.max(self.v1))
    }

    /// Rate the ramp starts from.
    #[inline]
    pub fn start(&self) -> u32 {
        self.v0
    }
}
